//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is a cheap-to-clone handle for sending commands
//! to the registry actor. Every worker task holds a clone; the actor
//! stops when the last handle is dropped.

use palaver_core::Username;
use tokio::sync::{mpsc, oneshot};

use super::commands::{Outbound, RegistryCommand, RegistryError};

/// Handle for interacting with the registry actor.
///
/// All methods communicate with the actor via channels; none of them
/// touch member state directly.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Creates a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Registers a member under a unique name.
    ///
    /// On success all other members receive a join announcement.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if the name is already registered
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        name: Username,
        outbound: Outbound,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                name,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Removes a member if present and announces the departure.
    ///
    /// Idempotent, and resolves once the removal has been processed so
    /// callers can rely on the departure announcement having been queued.
    /// An actor that already stopped counts as unregistered.
    pub async fn unregister(&self, name: Username) {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Unregister {
                name,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return;
        }

        let _ = rx.await;
    }

    /// Queues a rendered line to every member except `exclude`.
    ///
    /// Returns the number of members the line was queued to; zero when
    /// the actor has shut down.
    pub async fn broadcast(&self, text: String, exclude: Option<Username>) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Broadcast {
                text,
                exclude,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Delivers a private message to `to` and a confirmation to `from`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RecipientNotFound` if the target is absent
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn send_private(
        &self,
        from: Username,
        to: Username,
        text: String,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::SendPrivate {
                from,
                to,
                text,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Snapshot of current member names, sorted.
    ///
    /// Returns an empty vector when the actor has shut down.
    pub async fn list_names(&self) -> Vec<Username> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::ListNames { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Removes and closes every member session. Idempotent.
    ///
    /// Returns the number of sessions closed.
    pub async fn shutdown(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Shutdown { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
