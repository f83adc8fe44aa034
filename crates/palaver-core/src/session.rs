//! Session lifecycle states.

use std::fmt;

/// Lifecycle phase of one client session.
///
/// Every connection moves through these phases in order; there are no
/// backward transitions. The per-connection worker owns the phase; the
/// registry only ever holds sessions that are `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, username not yet accepted by the registry.
    Registering,

    /// Registered and exchanging messages.
    Active,

    /// Tearing down: read error, explicit quit, or forced shutdown.
    /// Sends racing with this phase may be silently dropped.
    Closing,

    /// Worker exited; transport closed and registry entry removed.
    Terminated,
}

impl SessionPhase {
    /// Whether the session may still be routed messages.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the session has begun (or finished) teardown.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        matches!(self, Self::Closing | Self::Terminated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Registering => "registering",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Terminated => "terminated",
        };
        write!(f, "{label}")
    }
}
