//! Display name value object.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Maximum accepted username length in bytes.
pub const MAX_USERNAME_LEN: usize = 64;

/// A registered display name.
///
/// Names are case-sensitive and compared exactly: `Alice` and `alice`
/// are two different users. Construction goes through [`Username::parse`],
/// which applies the same trimming the server applies to raw client input,
/// so a `Username` value is always non-empty, free of whitespace and
/// control characters, and at most [`MAX_USERNAME_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    /// Parses raw client input into a username.
    ///
    /// Leading/trailing whitespace is stripped before validation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUsername` when the trimmed input is
    /// empty, too long, or contains whitespace or control characters.
    /// Whitespace is rejected because `/msg` targets are a single
    /// whitespace-delimited token; a name containing spaces could never
    /// be addressed.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(DomainError::invalid_username("must not be empty"));
        }
        if trimmed.len() > MAX_USERNAME_LEN {
            return Err(DomainError::invalid_username(format!(
                "must be at most {MAX_USERNAME_LEN} bytes"
            )));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_username("must not contain whitespace"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(DomainError::invalid_username(
                "must not contain control characters",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
