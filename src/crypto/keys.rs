//! Per-handshake key shares and nonces.
//!
//! Each side of a shared-key handshake contributes one X25519 key share and
//! one nonce. Neither outlives the handshake: the secret half of a share is
//! consumed by the agreement, and the agreed value is wiped when dropped.

use rand::RngCore;
use rand_core::OsRng;
use x25519_dalek::{
    EphemeralSecret as DalekEphemeral, PublicKey as DalekPublic, SharedSecret as DalekShared,
};

use crate::crypto::PUBLIC_KEY_SIZE;

/// Fresh bytes from the operating system, for nonces and generated keytab secrets.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Secret half of this side's key share; spent by [`EphemeralSecret::diffie_hellman`].
pub struct EphemeralSecret(DalekEphemeral);

impl EphemeralSecret {
    /// Draw a new key share.
    pub fn random() -> Self {
        Self(DalekEphemeral::random_from_rng(rand::thread_rng()))
    }

    /// Combine with the peer's share. The secret cannot be reused afterwards.
    pub fn diffie_hellman(self, their_public: &PublicKey) -> SharedSecret {
        SharedSecret(self.0.diffie_hellman(&their_public.0))
    }
}

impl From<&EphemeralSecret> for PublicKey {
    fn from(secret: &EphemeralSecret) -> Self {
        PublicKey(DalekPublic::from(&secret.0))
    }
}

/// Public half of a key share, as carried in init and reply tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(DalekPublic);

impl PublicKey {
    /// Key share as read off the wire.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(DalekPublic::from(bytes))
    }

    /// Wire encoding.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Agreed value of one handshake; input keying material for [`ContextKeys`].
///
/// [`ContextKeys`]: crate::crypto::ContextKeys
pub struct SharedSecret(DalekShared);

impl SharedSecret {
    /// Raw agreed bytes. Only ever fed to HKDF.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// False when the peer sent a low-order point, making the result predictable.
    pub fn was_contributory(&self) -> bool {
        self.0.was_contributory()
    }
}
