//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::negotiate::{NegotiationOptions, Role, TokenFraming};
use crate::DEFAULT_SOCKET_PATH;

/// Everything one negotiation run needs, passed explicitly to bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Role to play
    pub role: Role,
    /// Target (client) or local (server) identity
    pub name: Option<String>,
    /// Rendezvous socket path
    pub socket_path: PathBuf,
    /// Keytab for the built-in engine
    pub keytab: Option<PathBuf>,
    /// Driver options
    pub options: NegotiationOptions,
}

impl SessionConfig {
    /// Configuration for `role` with every other setting at its default.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            name: None,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            keytab: None,
            options: NegotiationOptions::default(),
        }
    }

    /// Set the identity.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the rendezvous path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Switch to length-prefixed framing.
    pub fn framed(mut self) -> Self {
        self.options.framing = TokenFraming::LengthPrefixed;
        self
    }

    /// Bound every blocking send and receive.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.io_timeout = Some(timeout);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(Error::usage("socket path cannot be empty"));
        }
        if self.name.as_deref().is_some_and(str::is_empty) {
            return Err(Error::usage("name cannot be empty"));
        }
        if self.options.max_token_size == 0 {
            return Err(Error::usage("max_token_size must be positive"));
        }
        if self.options.max_token_size > u32::MAX as usize {
            return Err(Error::usage("max_token_size must fit a 32-bit length prefix"));
        }
        if self.options.io_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::usage("timeout must be positive"));
        }
        Ok(())
    }
}
