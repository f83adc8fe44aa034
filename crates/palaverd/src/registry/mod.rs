//! Member registry using the Actor pattern.
//!
//! The registry is the single source of truth for "who is online". It
//! receives commands via a tokio mpsc channel and is the only place
//! membership state lives; there is no shared lock and no global.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Worker (conn A) │────▶│  RegistryActor  │────▶│ per-member queues │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                        │
//!         │   RegistryCommand     │   members:             │  bounded mpsc,
//!         │   (mpsc + oneshot)    │   Username → Session   │  drop-on-full
//!         ▼                       ▼                        ▼
//!    register/broadcast      sequential command       each writer task
//!    private/list/quit       processing               flushes one socket
//! ```
//!
//! Sequential command processing is the serialization point: add,
//! remove, broadcast, private-send and list each observe a consistent
//! snapshot, and racing registrations of one name resolve to exactly
//! one winner.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{Outbound, RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every clone of the returned handle has been
/// dropped.
///
/// # Example
///
/// ```no_run
/// use palaverd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     let names = registry.list_names().await;
///     assert!(names.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
