//! # secctx
//!
//! Establishes an authenticated security context between two local
//! processes over a Unix-domain stream socket.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   Session bootstrap (rendezvous socket, one peer)       │
//! ├─────────────────────────────────────────────────────────┤
//! │   Negotiation driver (initiator / acceptor loop)        │
//! ├───────────────────────────┬─────────────────────────────┤
//! │   Channel + token framing │   SecurityEngine (opaque)   │
//! ├───────────────────────────┴─────────────────────────────┤
//! │   Shared-key engine: X25519, HKDF, HMAC-SHA256          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The driver never inspects tokens. It hands each one to the engine and
//! ships whatever the engine produces until both sides report completion
//! or either side fails. Any failure aborts the attempt; nothing is retried.
//!
//! ## Example
//!
//! ```no_run
//! use secctx::engine::{Keytab, SharedKeyEngine};
//! use secctx::{session, Role, SessionConfig};
//!
//! let keytab = Keytab::load("/etc/secctx/keytab.toml")?;
//! let engine = SharedKeyEngine::new(keytab);
//! let config = SessionConfig::new(Role::Initiator).with_name("host@localhost");
//! let outcome = session::run(&config, &engine)?;
//! println!("{} negotiation OK", outcome.role);
//! # Ok::<(), secctx::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod channel;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod negotiate;
pub mod session;
pub mod token;

pub use channel::{Channel, UnixChannel};
pub use config::SessionConfig;
pub use engine::{NegotiationStatus, SecurityEngine, StatusCode};
pub use error::{Error, Result};
pub use negotiate::{
    negotiate_as_acceptor, negotiate_as_initiator, NegotiationOptions, NegotiationOutcome, Role,
    TokenFraming,
};
pub use token::Token;

/// Largest token either side will send or accept.
pub const MAX_TOKEN_SIZE: usize = 1024;

/// Rendezvous socket used when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/gss-test";
