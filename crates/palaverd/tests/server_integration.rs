//! Integration tests for the TCP relay server.
//!
//! These tests drive a real server over loopback TCP, end to end:
//! registration handshake, announcements, broadcast exclusion, private
//! messages, listing, capacity refusal, and graceful shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed. We test
//! the panic-free behavior of production code through assertions.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use palaverd::config::ServerConfig;
use palaverd::registry::spawn_registry;
use palaverd::server::RelayServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single server line.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period for server shutdown in tests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Settling time for cross-connection effects that have no line to
/// wait on (e.g. a freed concurrency slot).
const SETTLE: Duration = Duration::from_millis(200);

/// Final line of the welcome block.
const WELCOME_END: &str = "You can also just type a message to broadcast to everyone.";

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context: spawns a server on an OS-assigned port.
struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server with the default test capacity.
    async fn spawn() -> Self {
        Self::spawn_with_max(16).await
    }

    /// Spawns a server bounded to `max_connections` sessions.
    async fn spawn_with_max(max_connections: usize) -> Self {
        let config = ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_connections,
            shutdown_grace: SHUTDOWN_GRACE,
        };

        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = RelayServer::bind(config, registry, cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self { addr, cancel_token }
    }

    /// Opens a raw client connection.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Opens a connection and completes registration as `name`.
    async fn register(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.expect_prompt().await;
        client.send(name).await;
        client.read_welcome().await;
        client
    }

    /// Shuts down the server gracefully.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SETTLE).await;
    }
}

/// Test client connection with line-protocol helpers.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends one line to the server.
    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one line, without the trailing newline.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let bytes = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("line within timeout")
            .expect("read from server");
        assert!(bytes > 0, "unexpected EOF from server");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Receives one line and asserts it contains `needle`.
    async fn expect_contains(&mut self, needle: &str) -> String {
        let line = self.recv().await;
        assert!(line.contains(needle), "expected {needle:?} in {line:?}");
        line
    }

    /// Receives one line and asserts it is exactly `expected`.
    async fn expect_line(&mut self, expected: &str) {
        let line = self.recv().await;
        assert_eq!(line, expected);
    }

    /// Asserts the next line is the username prompt.
    async fn expect_prompt(&mut self) {
        let line = self.recv().await;
        assert!(
            line.starts_with("Enter username:"),
            "expected prompt, got {line:?}"
        );
    }

    /// Consumes the welcome block after a successful registration.
    async fn read_welcome(&mut self) {
        let first = self.recv().await;
        assert!(first.starts_with("Welcome "), "expected welcome, got {first:?}");
        loop {
            if self.recv().await == WELCOME_END {
                return;
            }
        }
    }

    /// Asserts the server closes the connection.
    async fn expect_eof(&mut self) {
        let mut line = String::new();
        let bytes = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("EOF within timeout")
            .expect("read from server");
        assert_eq!(bytes, 0, "expected EOF, got {line:?}");
    }
}

/// Asserts a line carries a `[HH:MM:SS]` stamp.
fn assert_timestamped(line: &str) {
    assert!(line.starts_with('['), "missing stamp: {line:?}");
    assert_eq!(line.chars().nth(9), Some(']'), "malformed stamp: {line:?}");
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_and_welcome() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.expect_prompt().await;
    client.send("alice").await;
    client.read_welcome().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_username_reprompts_locally() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.expect_prompt().await;
    client.send("   ").await;
    client.expect_line("Invalid username. Please try again.").await;

    client.expect_prompt().await;
    client.send("alice").await;
    client.read_welcome().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_name_rejected_then_retry() {
    let server = TestServer::spawn().await;

    let mut alice = server.register("alice").await;

    let mut second = server.connect().await;
    second.expect_prompt().await;
    second.send("alice").await;
    second
        .expect_line("Username already taken. Please try again.")
        .await;

    second.expect_prompt().await;
    second.send("bob").await;
    second.read_welcome().await;

    alice.expect_line("bob joined the chat!").await;

    server.shutdown().await;
}

// ============================================================================
// Message Routing Tests
// ============================================================================

#[tokio::test]
async fn test_plain_message_excludes_sender() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    alice.send("hi").await;
    let line = bob.expect_contains("alice: hi").await;
    assert_timestamped(&line);

    // Alice's next inbound line is bob's reply, not her own echo.
    bob.send("pong").await;
    alice.expect_contains("bob: pong").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_broadcast_command_and_confirmation() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    bob.send("/broadcast bye").await;

    let line = alice.expect_contains("bob (broadcast): bye").await;
    assert_timestamped(&line);
    bob.expect_line("Message broadcasted to all users.").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_message_round_trip() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    alice.send("/msg bob hello there").await;

    let line = bob.expect_contains("alice (private): hello there").await;
    assert_timestamped(&line);
    alice.expect_line("Private message sent to bob").await;

    // Bob never sees the sender's confirmation: his next line is a
    // regular broadcast.
    alice.send("marker").await;
    bob.expect_contains("alice: marker").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_message_to_unknown_user() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    alice.send("/msg ghost hi").await;
    alice.expect_line("User ghost not found or offline").await;

    // Nothing leaked to bob.
    alice.send("marker").await;
    bob.expect_contains("alice: marker").await;

    server.shutdown().await;
}

// ============================================================================
// Command Error Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_commands_reply_to_issuer_only() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    alice.send("/msg bob").await;
    alice.expect_line("Usage: /msg <username> <message>").await;

    alice.send("/broadcast").await;
    alice.expect_line("Usage: /broadcast <message>").await;

    alice.send("/frobnicate").await;
    alice
        .expect_line("Invalid command. Available commands: /list, /msg, /broadcast, /quit")
        .await;

    // The connection stayed open and bob saw none of it.
    alice.send("marker").await;
    bob.expect_contains("alice: marker").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_lines_are_ignored() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;

    alice.send("").await;
    alice.send("   ").await;
    alice.send("/list").await;
    alice.expect_line("Online users (1): alice").await;

    server.shutdown().await;
}

// ============================================================================
// Listing Tests
// ============================================================================

#[tokio::test]
async fn test_list_reflects_disconnects() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    let mut carol = server.register("carol").await;
    alice.expect_line("bob joined the chat!").await;
    alice.expect_line("carol joined the chat!").await;
    bob.expect_line("carol joined the chat!").await;

    // Abrupt disconnect, no /quit.
    drop(bob);

    alice.expect_line("bob left the chat!").await;
    carol.expect_line("bob left the chat!").await;

    alice.send("/list").await;
    alice.expect_line("Online users (2): alice, carol").await;

    server.shutdown().await;
}

// ============================================================================
// Quit / Teardown Tests
// ============================================================================

#[tokio::test]
async fn test_quit_farewell_and_single_departure_announcement() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    bob.send("/quit").await;
    bob.expect_line("Goodbye!").await;
    bob.expect_eof().await;

    // Exactly one departure announcement, even though the transport
    // also closed right after the explicit quit.
    alice.expect_line("bob left the chat!").await;
    alice.send("/list").await;
    alice.expect_line("Online users (1): alice").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_quit_is_case_insensitive() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;

    alice.send("/QUIT").await;
    alice.expect_line("Goodbye!").await;
    alice.expect_eof().await;

    server.shutdown().await;
}

// ============================================================================
// Capacity Tests
// ============================================================================

#[tokio::test]
async fn test_capacity_refusal_is_explicit() {
    let server = TestServer::spawn_with_max(1).await;

    let mut alice = server.register("alice").await;

    let mut refused = server.connect().await;
    refused.expect_line("Server is full. Try again later.").await;
    refused.expect_eof().await;

    // The slot frees once the session terminates.
    alice.send("/quit").await;
    alice.expect_line("Goodbye!").await;
    alice.expect_eof().await;
    sleep(SETTLE).await;

    let mut admitted = server.connect().await;
    admitted.expect_prompt().await;

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_graceful_shutdown_notifies_members() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    alice.expect_line("bob joined the chat!").await;

    server.cancel_token.cancel();

    alice.expect_line("Server is shutting down. Goodbye!").await;
    bob.expect_line("Server is shutting down. Goodbye!").await;
    alice.expect_eof().await;
    bob.expect_eof().await;
}

// ============================================================================
// End-to-End Scenario
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scenario() {
    let server = TestServer::spawn().await;

    // Client A registers as alice.
    let mut alice = server.register("alice").await;

    // Client B races for the same name, loses, retries as bob.
    let mut bob = server.connect().await;
    bob.expect_prompt().await;
    bob.send("alice").await;
    bob.expect_line("Username already taken. Please try again.")
        .await;
    bob.expect_prompt().await;
    bob.send("bob").await;
    bob.read_welcome().await;
    alice.expect_line("bob joined the chat!").await;

    // Plain chat reaches bob, not alice.
    alice.send("hi").await;
    bob.expect_contains("alice: hi").await;

    // Explicit broadcast with confirmation.
    bob.send("/broadcast bye").await;
    alice.expect_contains("bob (broadcast): bye").await;
    bob.expect_line("Message broadcasted to all users.").await;

    // Alice disconnects; bob is told and the listing shrinks.
    drop(alice);
    bob.expect_line("alice left the chat!").await;
    bob.send("/list").await;
    bob.expect_line("Online users (1): bob").await;

    server.shutdown().await;
}
