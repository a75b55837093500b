use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The null/burn sentinel address (all zero bytes).
pub const ZERO_ADDRESS: &str = "0000000000000000000000000000000000000000";

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Address must be 40 hex characters, got {0}")]
    BadLength(usize),
    #[error("Address contains non-hexadecimal characters: {0}")]
    BadHex(String),
    #[error("Topic should be 64 characters, got {0}")]
    BadTopic(usize),
}

/// A 20-byte account address in canonical form: lowercase hex, no prefix.
///
/// Two text encodings are accepted at the system boundary (`0x`-prefixed and
/// `Z`-prefixed); both collapse to the same canonical value here. Prefixed
/// forms are produced only at output time via [`Address::to_hex`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse an address from either supported text encoding.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let canonical = normalize(raw);

        if canonical.len() != 40 {
            return Err(AddressError::BadLength(canonical.len()));
        }
        if !canonical.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::BadHex(canonical));
        }

        Ok(Address(canonical))
    }

    /// Extract the address carried in the trailing 20 bytes of a 32-byte
    /// indexed event topic.
    pub fn from_topic(topic: &str) -> Result<Self, AddressError> {
        let word = normalize(topic);
        if word.len() != 64 {
            return Err(AddressError::BadTopic(word.len()));
        }
        Address::parse(&word[24..])
    }

    /// Wrap a value that is already canonical, such as a column read back
    /// from the database. Values from outside go through [`Address::parse`].
    pub(crate) fn raw(canonical: String) -> Self {
        Address(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Output encoding: `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    pub fn zero() -> Self {
        Address(ZERO_ADDRESS.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Strip either accepted prefix and lowercase the rest.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        &trimmed[2..]
    } else if trimmed.starts_with('Z') || trimmed.starts_with('z') {
        &trimmed[1..]
    } else {
        trimmed
    };
    body.to_lowercase()
}
