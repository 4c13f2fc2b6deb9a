//! Peer names.

use crate::types::DEFAULT_MAX_NAME_LEN;
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a handshake frame cannot be used as a peer name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The frame carried no characters.
    #[error("empty name")]
    Empty,
    /// The frame is longer than the relay accepts.
    #[error("{len} bytes exceeds limit of {max}")]
    TooLong {
        /// Length of the rejected name in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// A non-empty peer identifier, unique among currently registered peers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerName(String);

impl PeerName {
    /// Validate `raw` as a peer name no longer than `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] when `raw` is empty or too long.
    pub fn parse(raw: impl Into<String>, max_len: usize) -> Result<Self, NameError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if raw.len() > max_len {
            return Err(NameError::TooLong {
                len: raw.len(),
                max: max_len,
            });
        }
        Ok(Self(raw))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the name, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for PeerName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_MAX_NAME_LEN)
    }
}

// Lets registries keyed by `PeerName` be queried with a plain `&str`.
impl Borrow<str> for PeerName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PeerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
