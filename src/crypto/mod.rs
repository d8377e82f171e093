//! Primitives behind the shared-key engine: an X25519 key share per side,
//! HKDF-SHA256 to turn the agreement and the principal's secret into context
//! keys, and HMAC-SHA256 tags that prove each side derived the same keys.
//!
//! Derived keys are wiped when dropped.

pub(crate) mod kdf;
mod keys;

use thiserror::Error;

pub use kdf::{ContextKeys, Hkdf};
pub use keys::{random_bytes, EphemeralSecret, PublicKey, SharedSecret};

/// Size of symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of X25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of handshake nonces in bytes
pub const NONCE_SIZE: usize = 32;

/// Size of HMAC-SHA256 confirmation tags in bytes
pub const CONFIRM_TAG_SIZE: usize = 32;

/// Failures of the primitives themselves (never of authentication).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// HMAC rejected the key length
    #[error("invalid MAC key length")]
    KeyLength,

    /// HKDF could not produce the requested output
    #[error("HKDF expansion to {0} bytes failed")]
    Expansion(usize),
}
