//! TCP server for the palaver daemon.
//!
//! The server:
//! - Listens on a TCP port for client connections
//! - Spawns a ConnectionHandler worker per connection, bounded by a
//!   counted semaphore (the maximum concurrent-session limit)
//! - Refuses connections beyond the limit with an explicit message
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept() ── Semaphore permit, or refuse
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, OUTBOUND_BUFFER};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use palaver_protocol::render;

use crate::config::ServerConfig;
use crate::registry::RegistryHandle;

/// How long a capacity refusal may spend writing its one line.
const REFUSAL_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP server: accept loop, capacity gate, and shutdown coordination.
pub struct RelayServer {
    /// Bound listener; accepting starts in [`RelayServer::run`]
    listener: TcpListener,

    /// Actual bound address (relevant when configured with port 0)
    local_addr: SocketAddr,

    /// Resolved server configuration
    config: ServerConfig,

    /// Handle to the member registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Worker wake-up for teardown, triggered only after the registry
    /// has been cleared so farewells precede forced closure
    worker_cancel: CancellationToken,

    /// Counted permits bounding concurrent sessions
    limiter: Arc<Semaphore>,

    /// Tracks worker tasks for the shutdown grace period
    tracker: TaskTracker,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// Binding is separate from [`RelayServer::run`] so callers can
    /// learn the actual port before any connection is accepted.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` when the address cannot be bound.
    pub async fn bind(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            limiter: Arc::new(Semaphore::new(config.max_connections)),
            tracker: TaskTracker::new(),
            worker_cancel: CancellationToken::new(),
            config,
            registry,
            cancel_token,
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the server until the cancellation token is triggered.
    ///
    /// On shutdown: stops accepting, closes every registered session,
    /// then waits up to the configured grace period for workers to
    /// finish. This method does not return until shutdown completes.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr,
            max_connections = self.config.max_connections,
            "Chat server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Admits or refuses a new connection.
    ///
    /// Refusal happens at accept time: nothing is registered and the
    /// client is told why, so a full server is never a silent drop.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let permit = match Arc::clone(&self.limiter).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    %peer,
                    max_connections = self.config.max_connections,
                    "Connection refused: server is at capacity"
                );
                self.tracker.spawn(refuse(stream, peer));
                return;
            }
        };

        info!(%peer, "New connection");

        let handler = ConnectionHandler::new(
            stream,
            peer,
            self.registry.clone(),
            self.worker_cancel.clone(),
        );

        self.tracker.spawn(async move {
            handler.run().await;
            // Terminated: the concurrency slot is freed
            drop(permit);
        });
    }

    /// Stops accepting, clears the registry, and waits for workers.
    ///
    /// The registry is cleared before workers are woken so the shutdown
    /// farewell is queued ahead of any teardown, and the unregisters
    /// that follow find an empty map.
    async fn shutdown(self) {
        // Dropping the listener closes the accept socket.
        drop(self.listener);

        let closed = self.registry.shutdown().await;
        info!(closed, "Registry cleared");

        self.worker_cancel.cancel();

        self.tracker.close();
        if timeout(self.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.config.shutdown_grace.as_secs(),
                remaining = self.tracker.len(),
                "Grace period elapsed with workers still running"
            );
        }

        info!("Server stopped");
    }
}

/// Writes the capacity refusal line and closes the socket.
async fn refuse(mut stream: TcpStream, peer: SocketAddr) {
    let result = timeout(REFUSAL_TIMEOUT, async {
        stream.write_all(render::SERVER_FULL.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%peer, error = %e, "Failed to deliver refusal"),
        Err(_) => debug!(%peer, "Refusal write timed out"),
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Listener I/O failure outside the accept loop.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let addr: SocketAddr = "127.0.0.1:8888".parse().expect("valid addr");
        let err = ServerError::Bind {
            addr,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:8888"));
    }
}
