//! Registry actor - owns the member map and processes commands.
//!
//! The `RegistryActor` is the single owner of membership state. It
//! receives commands via an mpsc channel and processes them one at a
//! time, which makes it the serialization point required by the
//! uniqueness and snapshot-consistency guarantees: two connections
//! racing to claim the same name are ordered by the command queue, and
//! exactly one wins.
//!
//! # Delivery policy
//!
//! The actor never awaits a network write. Every send is a non-blocking
//! `try_send` into the member's bounded outbound buffer; when a member's
//! buffer is full the line is dropped for that member and counted. This
//! makes delivery lossy for a reader that has stalled under overload,
//! and in exchange no single slow peer can stall broadcasts to the rest.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use palaver_core::Username;
use palaver_protocol::render;

use super::commands::{Outbound, RegistryCommand, RegistryError};

/// One registered member as the registry sees it.
///
/// The worker owns the socket; the registry holds only the outbound
/// queue handle and bookkeeping.
struct Session {
    outbound: Outbound,
    joined_at: Instant,
}

/// The registry actor - single owner of the member map.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Current members, keyed by their unique display name
    members: HashMap<Username, Session>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            members: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    ///
    /// Handlers are synchronous: no command ever suspends the actor,
    /// so every operation observes a consistent member snapshot.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                name,
                outbound,
                respond_to,
            } => {
                let result = self.handle_register(name, outbound);
                // Ignore send error - the worker may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister { name, respond_to } => {
                self.handle_unregister(&name);
                let _ = respond_to.send(());
            }
            RegistryCommand::Broadcast {
                text,
                exclude,
                respond_to,
            } => {
                let queued = self.handle_broadcast(&text, exclude.as_ref());
                let _ = respond_to.send(queued);
            }
            RegistryCommand::SendPrivate {
                from,
                to,
                text,
                respond_to,
            } => {
                let result = self.handle_send_private(&from, &to, &text);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ListNames { respond_to } => {
                let _ = respond_to.send(self.handle_list_names());
            }
            RegistryCommand::Shutdown { respond_to } => {
                let closed = self.handle_shutdown();
                let _ = respond_to.send(closed);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Registers a member iff the name is free; announces the join to others.
    fn handle_register(
        &mut self,
        name: Username,
        outbound: Outbound,
    ) -> Result<(), RegistryError> {
        if self.members.contains_key(&name) {
            debug!(user = %name, "Name already taken, rejecting registration");
            return Err(RegistryError::NameTaken(name));
        }

        // Announce before inserting: every current member is an "other".
        let announcement = render::joined(&name);
        self.handle_broadcast(&announcement, None);

        self.members.insert(
            name.clone(),
            Session {
                outbound,
                joined_at: Instant::now(),
            },
        );

        info!(user = %name, members = self.members.len(), "User registered");
        Ok(())
    }

    /// Removes a member if present; announces the departure to the rest.
    ///
    /// Absent names are a no-op so teardown paths can all call this
    /// unconditionally.
    fn handle_unregister(&mut self, name: &Username) {
        match self.members.remove(name) {
            Some(session) => {
                let announcement = render::left(name);
                self.handle_broadcast(&announcement, None);

                info!(
                    user = %name,
                    session_secs = session.joined_at.elapsed().as_secs(),
                    members = self.members.len(),
                    "User disconnected"
                );
            }
            None => {
                debug!(user = %name, "Unregister for absent name, ignoring");
            }
        }
    }

    /// Queues `text` to every member except `exclude`.
    ///
    /// Returns the number of members the line was queued to.
    fn handle_broadcast(&self, text: &str, exclude: Option<&Username>) -> usize {
        let mut queued = 0;
        for (name, session) in &self.members {
            if exclude == Some(name) {
                continue;
            }
            if Self::deliver(name, session, text) {
                queued += 1;
            }
        }
        queued
    }

    /// Delivers a private message to `to` and a confirmation to `from`.
    fn handle_send_private(
        &self,
        from: &Username,
        to: &Username,
        text: &str,
    ) -> Result<(), RegistryError> {
        let Some(recipient) = self.members.get(to) else {
            debug!(from = %from, to = %to, "Private message target not found");
            return Err(RegistryError::RecipientNotFound(to.clone()));
        };

        let ts = render::timestamp();
        Self::deliver(to, recipient, &render::private(&ts, from, text));

        // The sender may already be tearing down; the confirmation is
        // best-effort like any other delivery.
        if let Some(sender) = self.members.get(from) {
            Self::deliver(from, sender, &render::private_sent(to));
        }

        info!(from = %from, to = %to, "Private message routed");
        Ok(())
    }

    /// Snapshot of member names in a deterministic (sorted) order.
    fn handle_list_names(&self) -> Vec<Username> {
        let mut names: Vec<Username> = self.members.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes and closes every session. Idempotent.
    ///
    /// Dropping a member's outbound sender closes its writer channel once
    /// the worker side drops too, so the farewell queued here is the last
    /// line each client can receive.
    fn handle_shutdown(&mut self) -> usize {
        let closed = self.members.len();
        if closed == 0 {
            return 0;
        }

        for (name, session) in self.members.drain() {
            Self::deliver(&name, &session, render::SERVER_SHUTDOWN);
        }

        info!(closed, "Registry shut down, all sessions closed");
        closed
    }

    /// Queues one line to one member without blocking.
    ///
    /// Returns whether the line was queued. A full buffer drops the line
    /// (lossy under overload); a closed channel means the worker is
    /// tearing down and the send is silently skipped.
    fn deliver(name: &Username, session: &Session, line: &str) -> bool {
        match session.outbound.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(user = %name, "Outbound buffer full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(user = %name, "Outbound channel closed, dropping message");
                false
            }
        }
    }
}
