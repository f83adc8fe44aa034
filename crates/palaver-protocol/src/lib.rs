//! Palaver Protocol - The newline-delimited text protocol
//!
//! This crate defines both directions of the wire protocol:
//! - `command` - parsing one inbound client line into a [`ClientCommand`]
//! - `render` - the exact line shapes the server sends back to clients
//!
//! The wire format is newline-delimited UTF-8 text over a TCP stream.
//! There are no length prefixes and no binary framing; one line is one
//! message in either direction.

pub mod command;
pub mod render;

pub use command::{ClientCommand, CommandError};
