//! Validated usernames used as snapshot keys
//!
//! A username is both the store key and a single file name segment, so it is
//! checked once at the edge and carried as a `Username` from then on.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters accepted in a username
pub const MAX_USERNAME_LEN: usize = 64;

/// Errors produced when a string cannot be used as a username
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    /// The username was empty
    #[error("username must not be empty")]
    Empty,

    /// The username exceeded `MAX_USERNAME_LEN`
    #[error("username is longer than {MAX_USERNAME_LEN} characters")]
    TooLong,

    /// The username started with a dot
    #[error("username must not start with '.'")]
    LeadingDot,

    /// The username contained a character outside the allowed set
    #[error("username contains invalid character {0:?}")]
    InvalidChar(char),
}

/// A case-sensitive username that is safe to use as a file name
///
/// Allowed characters are ASCII letters, ASCII digits, `_`, `-` and `.`.
/// No normalization is performed: `Alice` and `alice` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validates `raw` and wraps it verbatim
    pub fn parse(raw: impl Into<String>) -> Result<Self, UsernameError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(UsernameError::Empty);
        }
        if raw.chars().count() > MAX_USERNAME_LEN {
            return Err(UsernameError::TooLong);
        }
        if raw.starts_with('.') {
            return Err(UsernameError::LeadingDot);
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(UsernameError::InvalidChar(bad));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}
