//! Server-to-client line rendering.
//!
//! Every line the server sends is produced here, so the wording of the
//! protocol lives in exactly one place. Chat traffic is prefixed with a
//! local-time `[HH:MM:SS]` stamp; service replies (prompts, usage errors,
//! confirmations) are unstamped.

use chrono::{DateTime, Local};
use palaver_core::Username;

/// Registration prompt, re-sent until a valid unique name is supplied.
pub const USERNAME_PROMPT: &str = "Enter username: ";

/// Reply to empty, whitespace-only, or otherwise invalid name input.
pub const INVALID_USERNAME: &str = "Invalid username. Please try again.";

/// Reply to a name collision during registration.
pub const USERNAME_TAKEN: &str = "Username already taken. Please try again.";

/// Farewell sent to the issuer of `/quit`.
pub const GOODBYE: &str = "Goodbye!";

/// Confirmation sent to the issuer of `/broadcast`.
pub const BROADCAST_CONFIRMATION: &str = "Message broadcasted to all users.";

/// Sent to a connection refused at accept time for capacity.
pub const SERVER_FULL: &str = "Server is full. Try again later.";

/// Final line delivered to every member at server shutdown.
pub const SERVER_SHUTDOWN: &str = "Server is shutting down. Goodbye!";

/// Current wall-clock time rendered for message stamps.
pub fn timestamp() -> String {
    format_timestamp(Local::now())
}

/// Renders a message stamp as `HH:MM:SS`.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Plain chat line: `[HH:MM:SS] <name>: <text>`.
pub fn chat(ts: &str, from: &Username, text: &str) -> String {
    format!("[{ts}] {from}: {text}")
}

/// Explicit broadcast line: `[HH:MM:SS] <name> (broadcast): <text>`.
pub fn broadcast(ts: &str, from: &Username, text: &str) -> String {
    format!("[{ts}] {from} (broadcast): {text}")
}

/// Private message line: `[HH:MM:SS] <name> (private): <text>`.
pub fn private(ts: &str, from: &Username, text: &str) -> String {
    format!("[{ts}] {from} (private): {text}")
}

/// Delivery confirmation to the sender of a private message.
pub fn private_sent(to: &Username) -> String {
    format!("Private message sent to {to}")
}

/// Reply to the sender when a private-message target is absent.
///
/// Takes the raw target token: a target that never parsed as a valid
/// name gets the same reply as one that is simply offline.
pub fn user_not_found(target: &str) -> String {
    format!("User {target} not found or offline")
}

/// Join announcement delivered to the other members.
pub fn joined(name: &Username) -> String {
    format!("{name} joined the chat!")
}

/// Departure announcement delivered to the remaining members.
pub fn left(name: &Username) -> String {
    format!("{name} left the chat!")
}

/// Member listing: `Online users (<n>): <comma-joined names>`.
pub fn online_users(names: &[Username]) -> String {
    let joined = names
        .iter()
        .map(Username::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Online users ({}): {}", names.len(), joined)
}

/// Welcome block sent once after successful registration.
///
/// Rendered as one outbound message containing embedded newlines; the
/// client sees it as consecutive lines.
pub fn welcome(name: &Username) -> String {
    format!(
        "Welcome {name}! You are now connected to the chat server.\n\
         Commands:\n\
         \x20 /list - Show online users\n\
         \x20 /msg <username> <message> - Send private message\n\
         \x20 /broadcast <message> - Send message to all users\n\
         \x20 /quit - Disconnect from server\n\
         You can also just type a message to broadcast to everyone."
    )
}
