//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the
//! `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//!
//! All types are designed for async message passing and follow the
//! panic-free policy.

use palaver_core::Username;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A member's outbound channel: rendered lines queued for its writer task.
///
/// The buffer is bounded and sends from the registry are non-blocking;
/// see [`RegistryActor`](super::RegistryActor) for the drop-on-full policy.
pub type Outbound = mpsc::Sender<String>;

/// Commands sent to the registry actor.
///
/// Each request-response command carries a oneshot channel for the reply,
/// so callers await the result without sharing any state with the actor.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a new member under a unique name.
    ///
    /// On success every *other* member is sent a join announcement.
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if the name is already registered
    Register {
        /// Name the connection is claiming
        name: Username,
        /// Outbound channel for routing messages to this member
        outbound: Outbound,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a member if present and announce the departure.
    ///
    /// Idempotent: unregistering an absent name is a no-op, so a quit
    /// followed by a transport error never double-announces.
    Unregister {
        /// Name to remove
        name: Username,
        /// Completion signal (no payload; removal cannot fail)
        respond_to: oneshot::Sender<()>,
    },

    /// Queue a rendered line to every member except `exclude`.
    Broadcast {
        /// Fully rendered line to deliver
        text: String,
        /// Member to skip (normally the sender); `None` includes everyone
        exclude: Option<Username>,
        /// Replies with the number of members the line was queued to
        respond_to: oneshot::Sender<usize>,
    },

    /// Deliver a private message and a confirmation to its sender.
    ///
    /// # Errors
    /// - `RegistryError::RecipientNotFound` if the target is absent
    SendPrivate {
        /// Registered sender
        from: Username,
        /// Target member
        to: Username,
        /// Raw message body (stamped and tagged by the actor)
        text: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Snapshot of the current member names, sorted.
    ListNames {
        /// Channel to send the snapshot
        respond_to: oneshot::Sender<Vec<Username>>,
    },

    /// Remove and close every member session.
    ///
    /// Idempotent: a second shutdown sees an empty registry.
    Shutdown {
        /// Replies with the number of sessions closed
        respond_to: oneshot::Sender<usize>,
    },
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The requested name is already registered.
    #[error("username already taken: {0}")]
    NameTaken(Username),

    /// The private-message target is not registered.
    #[error("user {0} not found or offline")]
    RecipientNotFound(Username),

    /// The actor stopped before responding.
    #[error("registry channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Username {
        Username::parse(n).expect("valid test name")
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NameTaken(name("alice"));
        assert_eq!(err.to_string(), "username already taken: alice");

        let err = RegistryError::RecipientNotFound(name("ghost"));
        assert_eq!(err.to_string(), "user ghost not found or offline");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "registry channel closed");
    }

    #[tokio::test]
    async fn test_command_oneshot_pattern() {
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();

        tokio::spawn(async move {
            tx.send(Ok(())).ok();
        });

        let result = rx.await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();
        drop(tx);

        assert!(rx.await.is_err());
    }
}
