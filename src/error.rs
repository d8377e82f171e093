//! Error types for security-context negotiation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::StatusCode;

/// Result type alias for negotiation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a negotiation attempt.
///
/// Every variant is terminal: a failed handshake is never retried or resumed.
#[derive(Error, Debug)]
pub enum Error {
    /// The configured identity string could not be turned into an engine name
    #[error("failed to resolve identity {name:?} {status}")]
    IdentityResolutionFailed {
        /// The name as supplied by the caller
        name: String,
        /// Engine status explaining the rejection
        status: StatusCode,
    },

    /// No accept credential could be obtained for the local identity
    #[error("failed to acquire accept credential for {name:?} {status}")]
    CredentialAcquisitionFailed {
        /// The local identity the credential was requested for
        name: String,
        /// Engine status explaining the rejection
        status: StatusCode,
    },

    /// The security engine reported a failure status
    #[error("{operation} rejected by security engine {status}")]
    EngineRejected {
        /// Engine operation that failed (`initiate` or `accept`)
        operation: &'static str,
        /// Major/minor status returned by the engine
        status: StatusCode,
    },

    /// A token crossed the size limit on the send or receive path
    #[error("token of {len} bytes exceeds the {max} byte limit")]
    TokenTooLarge {
        /// Observed (or announced) token length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Socket-level failure
    #[error("transport error during {operation}: {source}")]
    Transport {
        /// Operation that failed (`send`, `receive`, `bind`, ...)
        operation: &'static str,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The peer closed the connection while a token was still expected
    #[error("peer closed the connection before negotiation completed")]
    UnexpectedClose,

    /// The rendezvous socket does not exist
    #[error("no socket {}", .0.display())]
    NoSuchEndpoint(PathBuf),

    /// Invalid invocation
    #[error("usage: {0}")]
    Usage(String),

    /// A blocking send or receive exceeded the configured I/O timeout
    #[error("negotiation timed out after {0}ms")]
    Timeout(u64),

    /// The engine asked for a step the alternating protocol cannot express
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a transport error tagged with the failing operation
    pub fn transport(operation: &'static str, source: io::Error) -> Self {
        Error::Transport { operation, source }
    }

    /// Create a new usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Engine status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::IdentityResolutionFailed { status, .. }
            | Error::CredentialAcquisitionFailed { status, .. }
            | Error::EngineRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error was raised by the security engine rather than the transport
    pub fn is_engine_failure(&self) -> bool {
        self.status().is_some()
    }
}
