//! Security-context engine interface.
//!
//! The engine is an opaque capability: the negotiation driver never looks
//! inside tokens, contexts or credentials. It only feeds inbound tokens in
//! and ships outbound tokens out until the engine reports a terminal status.
//!
//! ```text
//! Initiator                                   Acceptor
//!   initiate(ctx, target, "")  --token-->
//!                                          accept(ctx, cred, token)
//!                              <--token--
//!   initiate(ctx, target, token)
//!            ...                      ...
//!   COMPLETE                               COMPLETE
//! ```
//!
//! Handles are released by `Drop`; there is no explicit release call.

pub mod shared_key;
pub mod status;

use std::fmt;

pub use shared_key::{Keytab, SharedKeyEngine};
pub use status::StatusCode;

use crate::token::Token;

/// Status returned by every context-establishment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    /// The peer must answer the produced token before the context is usable
    ContinueNeeded,
    /// The context is fully established
    Complete,
    /// The engine rejected the exchange
    Failed(StatusCode),
}

impl NegotiationStatus {
    /// Whether this status ends the negotiation loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NegotiationStatus::ContinueNeeded)
    }
}

/// What a credential may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialUsage {
    /// Initiate contexts only
    Initiate,
    /// Accept contexts only
    Accept,
    /// Both directions
    Both,
}

/// Result of one `initiate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Loop-continuation status
    pub status: NegotiationStatus,
    /// Token to send to the peer (possibly empty)
    pub token: Token,
}

impl Step {
    /// A step that needs another round after `token` is delivered.
    pub fn continue_with(token: impl Into<Token>) -> Self {
        Self {
            status: NegotiationStatus::ContinueNeeded,
            token: token.into(),
        }
    }

    /// A completing step, optionally carrying a final token.
    pub fn complete(token: impl Into<Token>) -> Self {
        Self {
            status: NegotiationStatus::Complete,
            token: token.into(),
        }
    }

    /// A failed step; never carries a token.
    pub fn failed(status: StatusCode) -> Self {
        Self {
            status: NegotiationStatus::Failed(status),
            token: Token::empty(),
        }
    }
}

/// Result of one `accept` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptStep<N> {
    /// Status and outbound token
    pub step: Step,
    /// Authenticated initiator name, once the engine knows it
    pub peer: Option<N>,
}

impl<N> From<Step> for AcceptStep<N> {
    fn from(step: Step) -> Self {
        Self { step, peer: None }
    }
}

/// A security-context engine.
///
/// Implementations own all cryptography and token formats. Every call is
/// synchronous; `context` starts as `None` and is created and advanced by the
/// engine in place.
pub trait SecurityEngine {
    /// Engine-native identity.
    type Name: fmt::Display;
    /// Authority to accept contexts as a given identity.
    type Credential;
    /// Accumulated per-handshake state.
    type Context;

    /// Import a user-supplied name.
    fn resolve_identity(&self, name: &str) -> Result<Self::Name, StatusCode>;

    /// Acquire a credential bound to `name`.
    fn acquire_credential(
        &self,
        name: &Self::Name,
        usage: CredentialUsage,
    ) -> Result<Self::Credential, StatusCode>;

    /// Advance the initiator side of the handshake.
    fn initiate(
        &self,
        context: &mut Option<Self::Context>,
        target: Option<&Self::Name>,
        input: &[u8],
    ) -> Step;

    /// Advance the acceptor side of the handshake.
    fn accept(
        &self,
        context: &mut Option<Self::Context>,
        credential: Option<&Self::Credential>,
        input: &[u8],
    ) -> AcceptStep<Self::Name>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!NegotiationStatus::ContinueNeeded.is_terminal());
        assert!(NegotiationStatus::Complete.is_terminal());
        assert!(NegotiationStatus::Failed(StatusCode::new(status::FAILURE, 0)).is_terminal());
    }

    #[test]
    fn test_failed_step_has_no_token() {
        let step = Step::failed(StatusCode::new(status::BAD_SIG, 1));
        assert!(step.token.is_empty());
    }
}
