//! Long-term secrets for the shared-key mechanism.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{random_bytes, KEY_SIZE};
use crate::engine::shared_key::ServiceName;
use crate::error::{Error, Result};

/// A principal's 256-bit long-term secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self(random_bytes())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Table of principal secrets.
///
/// Without an explicit default principal, a keytab holding exactly one
/// entry uses that entry as its default.
#[derive(Clone, Default)]
pub struct Keytab {
    entries: BTreeMap<String, SecretKey>,
    default_principal: Option<ServiceName>,
}

impl Keytab {
    /// An empty keytab.
    pub fn new() -> Self {
        Self::default()
    }

    /// A keytab holding one freshly generated key for `principal`.
    pub fn generate(principal: ServiceName) -> Self {
        let mut keytab = Self::new();
        keytab.insert(&principal, SecretKey::random());
        keytab.default_principal = Some(principal);
        keytab
    }

    /// Add or replace the key for `principal`.
    pub fn insert(&mut self, principal: &ServiceName, key: SecretKey) {
        self.entries.insert(principal.to_string(), key);
    }

    /// Use `principal` when the caller names no principal.
    pub fn set_default_principal(&mut self, principal: ServiceName) {
        self.default_principal = Some(principal);
    }

    /// Key for `principal`.
    pub fn lookup(&self, principal: &ServiceName) -> Option<&SecretKey> {
        self.entries.get(&principal.to_string())
    }

    /// The principal to use when none was named.
    pub fn default_principal(&self) -> Option<ServiceName> {
        if let Some(principal) = &self.default_principal {
            return Some(principal.clone());
        }
        if self.entries.len() == 1 {
            return self
                .entries
                .keys()
                .next()
                .and_then(|name| ServiceName::parse(name).ok());
        }
        None
    }

    /// Number of principals with a key.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the keytab holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a TOML keytab file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read keytab {}: {}", path.display(), e)))?;
        let file: KeytabFile = toml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid keytab {}: {}", path.display(), e)))?;
        file.to_keytab().map_err(Error::Config)
    }
}

impl fmt::Debug for Keytab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keytab")
            .field("principals", &self.entries.keys().collect::<Vec<_>>())
            .field("default_principal", &self.default_principal)
            .finish()
    }
}

/// Keytab file format for serialization.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeytabFile {
    /// Principal used when none is named (`service@host`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_principal: Option<String>,
    /// Principal secrets
    #[serde(default)]
    pub entries: Vec<KeytabEntry>,
}

/// One principal and its secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeytabEntry {
    /// Principal name (`service@host` or `service`)
    pub principal: String,
    /// 32-byte secret, base64
    pub secret: String,
}

impl KeytabFile {
    /// Convert to a runtime keytab.
    pub fn to_keytab(&self) -> std::result::Result<Keytab, String> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let mut keytab = Keytab::new();
        for entry in &self.entries {
            let principal = ServiceName::parse(&entry.principal)
                .map_err(|status| format!("invalid principal {:?}: {}", entry.principal, status))?;

            let secret_bytes = STANDARD
                .decode(&entry.secret)
                .map_err(|e| format!("invalid base64 secret for {}: {}", principal, e))?;
            let secret: [u8; KEY_SIZE] = secret_bytes
                .as_slice()
                .try_into()
                .map_err(|_| format!("secret for {} must be {} bytes", principal, KEY_SIZE))?;

            keytab.insert(&principal, SecretKey::from_bytes(secret));
        }

        if let Some(name) = &self.default_principal {
            let principal = ServiceName::parse(name)
                .map_err(|status| format!("invalid default principal {:?}: {}", name, status))?;
            if keytab.lookup(&principal).is_none() {
                return Err(format!("default principal {} has no entry", principal));
            }
            keytab.set_default_principal(principal);
        }

        Ok(keytab)
    }

    /// Create from a runtime keytab.
    pub fn from_keytab(keytab: &Keytab) -> Self {
        use base64::{engine::general_purpose::STANDARD, Engine};

        Self {
            default_principal: keytab.default_principal.as_ref().map(ToString::to_string),
            entries: keytab
                .entries
                .iter()
                .map(|(principal, key)| KeytabEntry {
                    principal: principal.clone(),
                    secret: STANDARD.encode(key.as_bytes()),
                })
                .collect(),
        }
    }
}
