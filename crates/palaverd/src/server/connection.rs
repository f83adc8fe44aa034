//! Connection handler for individual client connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` that:
//! - Runs the username registration handshake against the registry
//! - Reads one line at a time and routes it (broadcast, private, list, quit)
//! - Owns a dedicated writer task draining the session's outbound queue
//! - Guarantees `unregister` runs on every exit path
//!
//! The handler drives the session through
//! `Registering → Active → Closing → Terminated`. Any transport error is
//! treated identically to a client-initiated quit: no retry, no
//! reconnection, and never any effect on other sessions.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use palaver_core::{SessionPhase, Username};
use palaver_protocol::{render, ClientCommand};

use crate::registry::{RegistryError, RegistryHandle};

/// Capacity of each session's outbound line queue.
///
/// Registry sends into this queue are non-blocking; once it is full,
/// further lines are dropped for this member until its writer catches
/// up. Delivery is lossy for a stalled reader.
pub const OUTBOUND_BUFFER: usize = 64;

/// Maximum accepted inbound line length in bytes.
const MAX_LINE_LEN: usize = 8192;

/// How long teardown waits for the writer to flush queued lines.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How the Active read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Buffered reader for inbound lines
    reader: BufReader<OwnedReadHalf>,

    /// This session's outbound queue; the registry holds a clone
    outbound: mpsc::Sender<String>,

    /// Writer task draining the outbound queue into the socket
    writer_task: JoinHandle<()>,

    /// Handle to the member registry
    registry: RegistryHandle,

    /// Cancellation token for forced shutdown
    cancel_token: CancellationToken,

    /// Peer address, for operator logs
    peer: SocketAddr,

    /// Current lifecycle phase
    phase: SessionPhase,
}

impl ConnectionHandler {
    /// Creates a handler for an accepted connection and spawns its
    /// writer task.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

        let writer_task = tokio::spawn(write_lines(write_half, outbound_rx));

        Self {
            reader: BufReader::new(read_half),
            outbound: outbound_tx,
            writer_task,
            registry,
            cancel_token,
            peer,
            phase: SessionPhase::Registering,
        }
    }

    /// Runs the session to completion.
    ///
    /// This is the whole worker lifecycle: registration handshake, the
    /// Active read loop, then teardown. Teardown always attempts
    /// `unregister`, so an abrupt transport failure cleans up exactly
    /// like an explicit `/quit`.
    pub async fn run(mut self) {
        debug!(peer = %self.peer, phase = %self.phase, "New client connected");

        let name = match self.register().await {
            Ok(name) => name,
            Err(reason) => {
                debug!(peer = %self.peer, %reason, "Connection closed during registration");
                self.finish(None).await;
                return;
            }
        };

        self.phase = SessionPhase::Active;
        match self.process_lines(&name).await {
            Ok(()) => debug!(peer = %self.peer, user = %name, "Client quit"),
            Err(reason) => {
                debug!(peer = %self.peer, user = %name, %reason, "Connection closed")
            }
        }

        self.finish(Some(name)).await;
    }

    /// Registration handshake: prompt until the registry accepts a name.
    ///
    /// Invalid input (empty, whitespace-only, oversized) is rejected
    /// locally and re-prompted without contacting the registry; a name
    /// collision re-prompts without tearing down the connection.
    async fn register(&mut self) -> Result<Username, ConnectionError> {
        loop {
            self.send(render::USERNAME_PROMPT).await?;
            let line = self.read_line().await?;

            let name = match Username::parse(&line) {
                Ok(name) => name,
                Err(_) => {
                    self.send(render::INVALID_USERNAME).await?;
                    continue;
                }
            };

            match self
                .registry
                .register(name.clone(), self.outbound.clone())
                .await
            {
                Ok(()) => {
                    info!(peer = %self.peer, user = %name, "Registration complete");
                    // A send failure here means the socket already died;
                    // the read loop notices immediately and tears down.
                    let _ = self.send(&render::welcome(&name)).await;
                    return Ok(name);
                }
                Err(RegistryError::NameTaken(_)) => {
                    debug!(peer = %self.peer, user = %name, "Name collision, re-prompting");
                    self.send(render::USERNAME_TAKEN).await?;
                }
                Err(other) => return Err(ConnectionError::Registry(other)),
            }
        }
    }

    /// Active phase: read lines and route them until quit or disconnect.
    async fn process_lines(&mut self, name: &Username) -> Result<(), ConnectionError> {
        loop {
            let line = self.read_line().await?;
            if self.handle_line(name, &line).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Routes one inbound line.
    ///
    /// Malformed commands reply to the issuer only and keep the
    /// connection open.
    async fn handle_line(
        &mut self,
        name: &Username,
        line: &str,
    ) -> Result<Flow, ConnectionError> {
        let command = match ClientCommand::parse(line) {
            Ok(Some(command)) => command,
            // Empty lines are ignored: no echo, no error.
            Ok(None) => return Ok(Flow::Continue),
            Err(usage) => {
                self.send(&usage.to_string()).await?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            ClientCommand::Quit => {
                self.send(render::GOODBYE).await?;
                Ok(Flow::Quit)
            }
            ClientCommand::List => {
                let names = self.registry.list_names().await;
                self.send(&render::online_users(&names)).await?;
                Ok(Flow::Continue)
            }
            ClientCommand::Say(text) => {
                let ts = render::timestamp();
                self.registry
                    .broadcast(render::chat(&ts, name, &text), Some(name.clone()))
                    .await;
                Ok(Flow::Continue)
            }
            ClientCommand::Broadcast(text) => {
                let ts = render::timestamp();
                self.registry
                    .broadcast(render::broadcast(&ts, name, &text), Some(name.clone()))
                    .await;
                self.send(render::BROADCAST_CONFIRMATION).await?;
                Ok(Flow::Continue)
            }
            ClientCommand::Private { target, body } => {
                // A target that cannot be a valid name was never
                // registered, so it gets the same not-found reply.
                let Ok(to) = Username::parse(&target) else {
                    self.send(&render::user_not_found(&target)).await?;
                    return Ok(Flow::Continue);
                };

                match self.registry.send_private(name.clone(), to, body).await {
                    // The registry delivers the confirmation to the sender.
                    Ok(()) => {}
                    Err(RegistryError::RecipientNotFound(to)) => {
                        self.send(&render::user_not_found(to.as_str())).await?;
                    }
                    Err(other) => return Err(ConnectionError::Registry(other)),
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Closing → Terminated: unregister, then let the writer drain.
    async fn finish(mut self, name: Option<Username>) {
        self.phase = SessionPhase::Closing;

        if let Some(name) = name {
            // Idempotent: a racing server shutdown may already have
            // removed the entry.
            self.registry.unregister(name).await;
        }

        // Closing the last sender ends the writer loop once the queue
        // (farewells, departure announcements) has been flushed.
        drop(self.outbound);
        if timeout(DRAIN_TIMEOUT, &mut self.writer_task).await.is_err() {
            debug!(peer = %self.peer, "Writer drain timed out, aborting");
            self.writer_task.abort();
        }

        self.phase = SessionPhase::Terminated;
        debug!(peer = %self.peer, phase = %self.phase, "Session closed");
    }

    /// Reads one line, honoring forced shutdown.
    ///
    /// Forced cancellation is reported as an error so every caller
    /// treats it exactly like a disconnect.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();

        let bytes_read = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(ConnectionError::Cancelled),
            result = self.reader.read_line(&mut line) => {
                result.map_err(|e| ConnectionError::Io(e.to_string()))?
            }
        };

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }
        if line.len() > MAX_LINE_LEN {
            return Err(ConnectionError::LineTooLarge {
                size: line.len(),
                max: MAX_LINE_LEN,
            });
        }

        Ok(line)
    }

    /// Queues one line to this session's own writer.
    async fn send(&self, line: &str) -> Result<(), ConnectionError> {
        self.outbound
            .send(line.to_string())
            .await
            .map_err(|_| ConnectionError::OutboundClosed)
    }
}

/// Writer task: drains the outbound queue into the socket, one line at
/// a time, until the queue closes or a write fails.
async fn write_lines(write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    let mut writer = BufWriter::new(write_half);

    while let Some(line) = rx.recv().await {
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            debug!(error = %e, "Write failed, stopping writer");
            return;
        }
    }

    // Queue closed: orderly teardown, signal EOF to the client.
    let mut socket = writer.into_inner();
    let _ = socket.shutdown().await;
}

/// Errors that can occur during connection handling.
///
/// All of these are local to the affected session; none propagate past
/// the worker.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Transport read/write failure.
    #[error("i/o error: {0}")]
    Io(String),

    /// Client closed the connection.
    #[error("connection closed")]
    Eof,

    /// Forced shutdown; treated like a client disconnect.
    #[error("cancelled by shutdown")]
    Cancelled,

    /// Inbound line exceeded the protocol limit.
    #[error("line too large: {size} bytes (max: {max})")]
    LineTooLarge { size: usize, max: usize },

    /// This session's own writer is gone (socket died mid-send).
    #[error("outbound channel closed")]
    OutboundClosed,

    /// The registry stopped while the session was still running.
    #[error("registry error: {0}")]
    Registry(RegistryError),
}
