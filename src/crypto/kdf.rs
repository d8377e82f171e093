//! Key derivation and key confirmation.
//!
//! Uses HKDF (HMAC-based Key Derivation Function) with SHA-256 to turn the
//! X25519 shared secret and the principal's long-term secret into the keys
//! a handshake needs, and HMAC-SHA256 to prove possession of them.

use hkdf::Hkdf as HkdfImpl;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{CryptoError, SharedSecret, CONFIRM_TAG_SIZE, KEY_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// HKDF key derivation using SHA-256.
pub struct Hkdf {
    prk: HkdfImpl<Sha256>,
}

impl Hkdf {
    /// Create a new HKDF instance from input keying material.
    ///
    /// # Arguments
    ///
    /// * `salt` - Optional salt; the handshake uses the long-term secret here
    /// * `ikm` - Input keying material (e.g., shared secret from DH)
    pub fn new(salt: Option<&[u8]>, ikm: &[u8]) -> Self {
        Self {
            prk: HkdfImpl::new(salt, ikm),
        }
    }

    /// Expand to a fixed-size array.
    pub fn expand_fixed<const N: usize>(&self, info: &[u8]) -> Result<[u8; N], CryptoError> {
        let mut okm = [0u8; N];
        self.prk
            .expand(info, &mut okm)
            .map_err(|_| CryptoError::Expansion(N))?;
        Ok(okm)
    }
}

/// Keys derived for one security context.
///
/// Each side proves knowledge of the long-term secret by MACing the
/// transcript with its own confirmation key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContextKeys {
    initiator_confirm: [u8; KEY_SIZE],
    acceptor_confirm: [u8; KEY_SIZE],
    session: [u8; KEY_SIZE],
}

impl ContextKeys {
    /// Derive context keys.
    ///
    /// # Arguments
    ///
    /// * `shared_secret` - The result of the ephemeral key agreement
    /// * `long_term_secret` - The principal's secret from the keytab
    /// * `context` - Per-handshake binding (both nonces)
    pub fn derive(
        shared_secret: &SharedSecret,
        long_term_secret: &[u8],
        context: &[u8],
    ) -> Result<Self, CryptoError> {
        let hkdf = Hkdf::new(Some(long_term_secret), shared_secret.as_bytes());

        let initiator_info = [b"secctx initiator confirm".as_slice(), context].concat();
        let acceptor_info = [b"secctx acceptor confirm".as_slice(), context].concat();
        let session_info = [b"secctx session".as_slice(), context].concat();

        Ok(Self {
            initiator_confirm: hkdf.expand_fixed(&initiator_info)?,
            acceptor_confirm: hkdf.expand_fixed(&acceptor_info)?,
            session: hkdf.expand_fixed(&session_info)?,
        })
    }

    /// Key the initiator MACs its final token with.
    pub fn initiator_confirm(&self) -> &[u8; KEY_SIZE] {
        &self.initiator_confirm
    }

    /// Key the acceptor MACs its reply with.
    pub fn acceptor_confirm(&self) -> &[u8; KEY_SIZE] {
        &self.acceptor_confirm
    }

    /// Key available to the application once the context is established.
    pub fn session(&self) -> &[u8; KEY_SIZE] {
        &self.session
    }
}

/// Compute an HMAC-SHA256 confirmation tag over the concatenated `parts`.
pub fn confirmation_tag(
    key: &[u8],
    parts: &[&[u8]],
) -> Result<[u8; CONFIRM_TAG_SIZE], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CryptoError::KeyLength)?;
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize().into_bytes();

    let mut tag = [0u8; CONFIRM_TAG_SIZE];
    tag.copy_from_slice(&result);
    Ok(tag)
}

/// Verify a confirmation tag in constant time.
pub fn verify_confirmation_tag(
    key: &[u8],
    parts: &[&[u8]],
    tag: &[u8],
) -> Result<bool, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CryptoError::KeyLength)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.verify_slice(tag).is_ok())
}
