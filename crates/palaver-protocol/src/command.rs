//! Client command grammar.
//!
//! One inbound line parses to at most one [`ClientCommand`]. Command
//! matching is on the first whitespace-delimited token and is
//! case-insensitive, so `/QUIT` and `/quit` are the same command.
//! Anything that does not start with `/` is a plain chat message.

use thiserror::Error;

/// One parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `/quit` - disconnect from the server.
    Quit,

    /// `/list` - request the current member listing.
    List,

    /// `/broadcast <text>` - explicit broadcast to all other members.
    Broadcast(String),

    /// `/msg <target> <text>` - private message to one member.
    ///
    /// The target is kept as the raw token; resolution against the
    /// registry happens at routing time so an unknown or malformed
    /// target yields the same "not found" reply.
    Private { target: String, body: String },

    /// Any other non-empty line - plain chat, broadcast to everyone else.
    Say(String),
}

/// Parse failures. The `Display` text of each variant is the exact
/// reply line sent back to the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `/msg` without both a target and a message body.
    #[error("Usage: /msg <username> <message>")]
    MsgUsage,

    /// `/broadcast` with an empty remainder.
    #[error("Usage: /broadcast <message>")]
    BroadcastUsage,

    /// A `/`-prefixed line matching no known command.
    #[error("Invalid command. Available commands: /list, /msg, /broadcast, /quit")]
    UnknownCommand,
}

impl ClientCommand {
    /// Parses one raw inbound line.
    ///
    /// Returns `Ok(None)` for empty (or whitespace-only) lines, which
    /// are ignored: no echo, no error.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for malformed commands; the connection
    /// stays open and the error text is relayed to the issuer only.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if !line.starts_with('/') {
            return Ok(Some(Self::Say(line.to_string())));
        }

        // First whitespace-delimited token selects the command.
        let (token, rest) = match line.find(char::is_whitespace) {
            Some(idx) => {
                let (token, rest) = line.split_at(idx);
                (token, rest.trim_start())
            }
            None => (line, ""),
        };

        match token.to_ascii_lowercase().as_str() {
            "/quit" => Ok(Some(Self::Quit)),
            "/list" => Ok(Some(Self::List)),
            "/broadcast" => {
                if rest.is_empty() {
                    return Err(CommandError::BroadcastUsage);
                }
                Ok(Some(Self::Broadcast(rest.to_string())))
            }
            "/msg" => {
                // Split into at most three parts (command, target, body)
                // so the body may itself contain spaces.
                let (target, body) = match rest.find(char::is_whitespace) {
                    Some(idx) => {
                        let (target, body) = rest.split_at(idx);
                        (target, body.trim_start())
                    }
                    None => return Err(CommandError::MsgUsage),
                };
                if target.is_empty() || body.is_empty() {
                    return Err(CommandError::MsgUsage);
                }
                Ok(Some(Self::Private {
                    target: target.to_string(),
                    body: body.to_string(),
                }))
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}
