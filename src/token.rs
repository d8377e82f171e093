//! Handshake tokens.
//!
//! A [`Token`] is one opaque step of the handshake. It owns its bytes and is
//! cheap to clone; memory is released when the last handle goes out of scope.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

use crate::error::{Error, Result};

/// An opaque handshake token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token(Bytes);

impl Token {
    /// The empty token (no output / first-round input).
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Token length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the token carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Fail with [`Error::TokenTooLarge`] if the token exceeds `max` bytes.
    pub fn check_size(&self, max: usize) -> Result<()> {
        if self.len() > max {
            return Err(Error::TokenTooLarge {
                len: self.len(),
                max,
            });
        }
        Ok(())
    }

    /// Lowercase hex dump of the token contents.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Deref for Token {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Token {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Token {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Token {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({} bytes)", self.len())
    }
}
