//! Shared-key mechanism.
//!
//! A small mutual-authentication mechanism built on a long-term secret that
//! both peers hold for a service principal. Each handshake runs an ephemeral
//! X25519 key agreement and derives confirmation keys with HKDF, salted by
//! the principal's secret. Each side then MACs the transcript with its own
//! confirmation key, so a peer that does not hold the secret cannot complete
//! either role.
//!
//! ## Protocol Flow
//!
//! ```text
//! Initiator                               Acceptor
//!   |  Init (key share, nonce, target)       |
//!   |--------------------------------------->|  CONTINUE_NEEDED
//!   |  Reply (key share, nonce, tag_a)       |
//!   |<---------------------------------------|  CONTINUE_NEEDED
//!   |  [verify tag_a]                        |
//!   |  Confirm (tag_i)                       |
//!   |--------------------------------------->|  COMPLETE
//!   |  COMPLETE                              |  [verify tag_i]
//! ```

mod keytab;
mod messages;

use std::fmt;

use bytes::Bytes;

pub use keytab::{Keytab, KeytabEntry, KeytabFile, SecretKey};

use crate::crypto::kdf::{confirmation_tag, verify_confirmation_tag};
use crate::crypto::{
    random_bytes, ContextKeys, EphemeralSecret, PublicKey, KEY_SIZE, NONCE_SIZE,
};
use crate::engine::status::{self, StatusCode};
use crate::engine::{AcceptStep, CredentialUsage, SecurityEngine, Step};
use messages::{ConfirmToken, InitToken, Message, ReplyToken, MAX_TARGET_LEN};

/// Minor status codes of the shared-key mechanism.
pub mod minor {
    /// The name was empty
    pub const EMPTY_NAME: u32 = 1;
    /// The name is not `service` or `service@host`
    pub const MALFORMED_NAME: u32 = 2;
    /// The keytab holds no key for the principal
    pub const NO_KEY_FOR_PRINCIPAL: u32 = 3;
    /// No principal was named and the keytab has no default
    pub const NO_DEFAULT_PRINCIPAL: u32 = 4;
    /// The token could not be parsed
    pub const MALFORMED_TOKEN: u32 = 5;
    /// The token carries an unknown mechanism version
    pub const UNSUPPORTED_VERSION: u32 = 6;
    /// The token is valid but not the one this state expects
    pub const UNEXPECTED_TOKEN: u32 = 7;
    /// The initiator asked for a principal other than the acceptor credential's
    pub const PRINCIPAL_MISMATCH: u32 = 8;
    /// The peer's confirmation tag did not verify
    pub const CONFIRMATION_FAILED: u32 = 9;
    /// The peer's key share produced a non-contributory shared secret
    pub const WEAK_KEY_SHARE: u32 = 10;
    /// The context is already established
    pub const CONTEXT_ESTABLISHED: u32 = 11;
    /// The context belongs to the other role
    pub const WRONG_CONTEXT_ROLE: u32 = 12;
    /// A cryptographic primitive failed
    pub const CRYPTO_FAILURE: u32 = 13;
    /// The credential was acquired for initiating only
    pub const CREDENTIAL_NOT_FOR_ACCEPT: u32 = 14;

    /// Text for a minor code.
    pub fn describe(code: u32) -> &'static str {
        match code {
            EMPTY_NAME => "empty principal name",
            MALFORMED_NAME => "malformed principal name",
            NO_KEY_FOR_PRINCIPAL => "no key for principal in keytab",
            NO_DEFAULT_PRINCIPAL => "no principal named and keytab has no default",
            MALFORMED_TOKEN => "malformed token",
            UNSUPPORTED_VERSION => "unsupported token version",
            UNEXPECTED_TOKEN => "token out of sequence",
            PRINCIPAL_MISMATCH => "requested principal does not match acceptor credential",
            CONFIRMATION_FAILED => "peer failed to prove the shared key",
            WEAK_KEY_SHARE => "peer key share is a low-order point",
            CONTEXT_ESTABLISHED => "context already established",
            WRONG_CONTEXT_ROLE => "context belongs to the other role",
            CRYPTO_FAILURE => "cryptographic primitive failed",
            CREDENTIAL_NOT_FOR_ACCEPT => "credential cannot be used to accept",
            _ => "unknown minor status",
        }
    }
}

/// Build a failure status with this mechanism's minor description.
pub(crate) fn reject(major: u32, minor_code: u32) -> StatusCode {
    StatusCode::new(major, minor_code).with_detail(minor::describe(minor_code))
}

/// A host-based service name: `service@host`, or `service` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName {
    service: String,
    host: Option<String>,
}

impl ServiceName {
    /// Parse a user-supplied name.
    pub fn parse(name: &str) -> Result<Self, StatusCode> {
        if name.is_empty() {
            return Err(reject(status::BAD_NAME, minor::EMPTY_NAME));
        }
        if name.len() > MAX_TARGET_LEN
            || name.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(reject(status::BAD_NAME, minor::MALFORMED_NAME));
        }

        let (service, host) = match name.split_once('@') {
            Some((service, host)) => (service, Some(host)),
            None => (name, None),
        };
        if service.is_empty() || host.is_some_and(|h| h.is_empty() || h.contains('@')) {
            return Err(reject(status::BAD_NAME, minor::MALFORMED_NAME));
        }

        Ok(Self {
            service: service.to_owned(),
            host: host.map(str::to_owned),
        })
    }

    /// Service part.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Host part, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}@{}", self.service, host),
            None => f.write_str(&self.service),
        }
    }
}

/// Authority to act as one principal.
#[derive(Debug, Clone)]
pub struct SharedKeyCredential {
    principal: ServiceName,
    secret: SecretKey,
    usage: CredentialUsage,
}

impl SharedKeyCredential {
    /// Principal this credential is bound to.
    pub fn principal(&self) -> &ServiceName {
        &self.principal
    }

    /// What the credential was acquired for.
    pub fn usage(&self) -> CredentialUsage {
        self.usage
    }
}

/// Which side of the handshake a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    /// Created by `initiate`
    Initiator,
    /// Created by `accept`
    Acceptor,
}

enum ContextState {
    AwaitingReply {
        ephemeral: EphemeralSecret,
        init: Bytes,
        nonce: [u8; NONCE_SIZE],
        secret: SecretKey,
    },
    AwaitingConfirm {
        keys: ContextKeys,
        transcript: Vec<u8>,
    },
    Established {
        keys: ContextKeys,
    },
}

/// Per-handshake state of the shared-key mechanism.
pub struct SharedKeyContext {
    role: ContextRole,
    principal: ServiceName,
    state: ContextState,
}

impl SharedKeyContext {
    /// Side of the handshake this context was created on.
    pub fn role(&self) -> ContextRole {
        self.role
    }

    /// Principal whose key authenticates this context.
    pub fn principal(&self) -> &ServiceName {
        &self.principal
    }

    /// Whether both peers have proven the key.
    pub fn is_established(&self) -> bool {
        matches!(self.state, ContextState::Established { .. })
    }

    /// Session key, available once established.
    pub fn session_key(&self) -> Option<&[u8; KEY_SIZE]> {
        match &self.state {
            ContextState::Established { keys } => Some(keys.session()),
            _ => None,
        }
    }
}

impl fmt::Debug for SharedKeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyContext")
            .field("role", &self.role)
            .field("principal", &self.principal)
            .field("established", &self.is_established())
            .finish()
    }
}

/// The shared-key [`SecurityEngine`].
#[derive(Debug, Clone, Default)]
pub struct SharedKeyEngine {
    keytab: Keytab,
}

impl SharedKeyEngine {
    /// Create an engine over `keytab`.
    pub fn new(keytab: Keytab) -> Self {
        Self { keytab }
    }

    /// The engine's keytab.
    pub fn keytab(&self) -> &Keytab {
        &self.keytab
    }

    fn principal_or_default(&self, named: Option<&ServiceName>) -> Result<ServiceName, StatusCode> {
        match named {
            Some(name) => Ok(name.clone()),
            None => self
                .keytab
                .default_principal()
                .ok_or_else(|| reject(status::NO_CRED, minor::NO_DEFAULT_PRINCIPAL)),
        }
    }

    fn secret_for(&self, principal: &ServiceName) -> Result<SecretKey, StatusCode> {
        self.keytab
            .lookup(principal)
            .cloned()
            .ok_or_else(|| reject(status::NO_CRED, minor::NO_KEY_FOR_PRINCIPAL))
    }

    fn start_initiator(
        &self,
        target: Option<&ServiceName>,
        input: &[u8],
    ) -> Result<(SharedKeyContext, Bytes), StatusCode> {
        if !input.is_empty() {
            return Err(reject(status::DEFECTIVE_TOKEN, minor::UNEXPECTED_TOKEN));
        }

        let principal = self.principal_or_default(target)?;
        let secret = self.secret_for(&principal)?;

        let ephemeral = EphemeralSecret::random();
        let nonce: [u8; NONCE_SIZE] = random_bytes();
        let init = Message::Init(InitToken {
            initiator_public: PublicKey::from(&ephemeral),
            nonce,
            target: target.map(ToString::to_string).unwrap_or_default(),
        })
        .encode();

        tracing::debug!("Initiating context for {}", principal);

        let context = SharedKeyContext {
            role: ContextRole::Initiator,
            principal,
            state: ContextState::AwaitingReply {
                ephemeral,
                init: init.clone(),
                nonce,
                secret,
            },
        };
        Ok((context, init))
    }

    fn finish_initiator(
        &self,
        principal: ServiceName,
        state: ContextState,
        input: &[u8],
    ) -> Result<(SharedKeyContext, Bytes), StatusCode> {
        let ContextState::AwaitingReply {
            ephemeral,
            init,
            nonce,
            secret,
        } = state
        else {
            return Err(reject(status::FAILURE, minor::CONTEXT_ESTABLISHED));
        };

        let reply = match Message::decode(input)? {
            Message::Reply(reply) => reply,
            _ => return Err(reject(status::DEFECTIVE_TOKEN, minor::UNEXPECTED_TOKEN)),
        };

        let shared = ephemeral.diffie_hellman(&reply.acceptor_public);
        if !shared.was_contributory() {
            return Err(reject(status::DEFECTIVE_TOKEN, minor::WEAK_KEY_SHARE));
        }
        let keys = ContextKeys::derive(&shared, secret.as_bytes(), &[nonce, reply.nonce].concat())
            .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;

        let verified = verify_confirmation_tag(
            keys.acceptor_confirm(),
            &[&init[..], &reply.acceptor_public.as_bytes()[..], &reply.nonce[..]],
            &reply.tag,
        )
        .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;
        if !verified {
            return Err(reject(status::BAD_SIG, minor::CONFIRMATION_FAILED));
        }

        let tag = confirmation_tag(keys.initiator_confirm(), &[&init[..], input])
            .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;
        let confirm = Message::Confirm(ConfirmToken { tag }).encode();

        tracing::debug!("Acceptor proved key for {}", principal);

        let context = SharedKeyContext {
            role: ContextRole::Initiator,
            principal,
            state: ContextState::Established { keys },
        };
        Ok((context, confirm))
    }

    fn start_acceptor(
        &self,
        credential: Option<&SharedKeyCredential>,
        input: &[u8],
    ) -> Result<(SharedKeyContext, Bytes), StatusCode> {
        let init = match Message::decode(input)? {
            Message::Init(init) => init,
            _ => return Err(reject(status::DEFECTIVE_TOKEN, minor::UNEXPECTED_TOKEN)),
        };

        let requested = if init.target.is_empty() {
            None
        } else {
            Some(ServiceName::parse(&init.target)?)
        };

        let (principal, secret) = match credential {
            Some(credential) => {
                if credential.usage == CredentialUsage::Initiate {
                    return Err(reject(status::NO_CRED, minor::CREDENTIAL_NOT_FOR_ACCEPT));
                }
                if requested.as_ref().is_some_and(|name| name != &credential.principal) {
                    return Err(reject(status::FAILURE, minor::PRINCIPAL_MISMATCH));
                }
                (credential.principal.clone(), credential.secret.clone())
            }
            None => {
                let principal = self.principal_or_default(requested.as_ref())?;
                let secret = self.secret_for(&principal)?;
                (principal, secret)
            }
        };

        let ephemeral = EphemeralSecret::random();
        let acceptor_public = PublicKey::from(&ephemeral);
        let nonce: [u8; NONCE_SIZE] = random_bytes();

        let shared = ephemeral.diffie_hellman(&init.initiator_public);
        if !shared.was_contributory() {
            return Err(reject(status::DEFECTIVE_TOKEN, minor::WEAK_KEY_SHARE));
        }
        let keys = ContextKeys::derive(&shared, secret.as_bytes(), &[init.nonce, nonce].concat())
            .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;

        let tag = confirmation_tag(
            keys.acceptor_confirm(),
            &[input, &acceptor_public.as_bytes()[..], &nonce[..]],
        )
        .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;
        let reply = Message::Reply(ReplyToken {
            acceptor_public,
            nonce,
            tag,
        })
        .encode();

        tracing::debug!("Accepting context for {}", principal);

        let context = SharedKeyContext {
            role: ContextRole::Acceptor,
            principal,
            state: ContextState::AwaitingConfirm {
                keys,
                transcript: [input, &reply[..]].concat(),
            },
        };
        Ok((context, reply))
    }

    fn finish_acceptor(
        &self,
        principal: ServiceName,
        state: ContextState,
        input: &[u8],
    ) -> Result<SharedKeyContext, StatusCode> {
        let ContextState::AwaitingConfirm { keys, transcript } = state else {
            return Err(reject(status::FAILURE, minor::CONTEXT_ESTABLISHED));
        };

        let confirm = match Message::decode(input)? {
            Message::Confirm(confirm) => confirm,
            _ => return Err(reject(status::DEFECTIVE_TOKEN, minor::UNEXPECTED_TOKEN)),
        };

        let verified = verify_confirmation_tag(
            keys.initiator_confirm(),
            &[transcript.as_slice()],
            &confirm.tag,
        )
        .map_err(|_| reject(status::FAILURE, minor::CRYPTO_FAILURE))?;
        if !verified {
            return Err(reject(status::BAD_SIG, minor::CONFIRMATION_FAILED));
        }

        tracing::debug!("Initiator proved key for {}", principal);

        Ok(SharedKeyContext {
            role: ContextRole::Acceptor,
            principal,
            state: ContextState::Established { keys },
        })
    }
}

impl SecurityEngine for SharedKeyEngine {
    type Name = ServiceName;
    type Credential = SharedKeyCredential;
    type Context = SharedKeyContext;

    fn resolve_identity(&self, name: &str) -> Result<ServiceName, StatusCode> {
        ServiceName::parse(name)
    }

    fn acquire_credential(
        &self,
        name: &ServiceName,
        usage: CredentialUsage,
    ) -> Result<SharedKeyCredential, StatusCode> {
        let secret = self.secret_for(name)?;
        Ok(SharedKeyCredential {
            principal: name.clone(),
            secret,
            usage,
        })
    }

    fn initiate(
        &self,
        context: &mut Option<SharedKeyContext>,
        target: Option<&ServiceName>,
        input: &[u8],
    ) -> Step {
        // A failed call leaves no context behind.
        let result = match context.take() {
            None => self.start_initiator(target, input),
            Some(ctx) if ctx.role != ContextRole::Initiator => {
                Err(reject(status::NO_CONTEXT, minor::WRONG_CONTEXT_ROLE))
            }
            Some(ctx) => {
                return match self.finish_initiator(ctx.principal, ctx.state, input) {
                    Ok((established, confirm)) => {
                        *context = Some(established);
                        Step::complete(confirm)
                    }
                    Err(status) => Step::failed(status),
                };
            }
        };

        match result {
            Ok((ctx, token)) => {
                *context = Some(ctx);
                Step::continue_with(token)
            }
            Err(status) => Step::failed(status),
        }
    }

    fn accept(
        &self,
        context: &mut Option<SharedKeyContext>,
        credential: Option<&SharedKeyCredential>,
        input: &[u8],
    ) -> AcceptStep<ServiceName> {
        match context.take() {
            None => match self.start_acceptor(credential, input) {
                Ok((ctx, reply)) => {
                    *context = Some(ctx);
                    Step::continue_with(reply).into()
                }
                Err(status) => Step::failed(status).into(),
            },
            Some(ctx) if ctx.role != ContextRole::Acceptor => {
                Step::failed(reject(status::NO_CONTEXT, minor::WRONG_CONTEXT_ROLE)).into()
            }
            Some(ctx) => match self.finish_acceptor(ctx.principal, ctx.state, input) {
                Ok(established) => {
                    let peer = established.principal.clone();
                    *context = Some(established);
                    AcceptStep {
                        step: Step::complete(Bytes::new()),
                        peer: Some(peer),
                    }
                }
                Err(status) => Step::failed(status).into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NegotiationStatus;

    fn name(s: &str) -> ServiceName {
        ServiceName::parse(s).unwrap()
    }

    fn engine_with(principal: &str, key: [u8; 32]) -> SharedKeyEngine {
        let mut keytab = Keytab::new();
        keytab.insert(&name(principal), SecretKey::from_bytes(key));
        SharedKeyEngine::new(keytab)
    }

    fn failure(step: &Step) -> StatusCode {
        match step.status {
            NegotiationStatus::Failed(status) => status,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_service_name_parsing() {
        let parsed = name("host@example.org");
        assert_eq!(parsed.service(), "host");
        assert_eq!(parsed.host(), Some("example.org"));
        assert_eq!(parsed.to_string(), "host@example.org");

        assert_eq!(name("nfs").host(), None);

        assert_eq!(ServiceName::parse("").unwrap_err().minor, minor::EMPTY_NAME);
        for bad in ["@host", "host@", "a@b@c", "with space@host", "tab\t"] {
            let err = ServiceName::parse(bad).unwrap_err();
            assert_eq!(err.major, status::BAD_NAME, "{bad}");
            assert_eq!(err.minor, minor::MALFORMED_NAME, "{bad}");
        }
    }

    #[test]
    fn test_full_handshake() {
        let engine = engine_with("host@localhost", [7u8; 32]);
        let target = name("host@localhost");
        let credential = engine
            .acquire_credential(&target, CredentialUsage::Accept)
            .unwrap();

        let mut initiator = None;
        let mut acceptor = None;

        let init = engine.initiate(&mut initiator, Some(&target), &[]);
        assert_eq!(init.status, NegotiationStatus::ContinueNeeded);
        assert!(!init.token.is_empty());

        let reply = engine.accept(&mut acceptor, Some(&credential), &init.token);
        assert_eq!(reply.step.status, NegotiationStatus::ContinueNeeded);
        assert!(reply.peer.is_none());

        let confirm = engine.initiate(&mut initiator, Some(&target), &reply.step.token);
        assert_eq!(confirm.status, NegotiationStatus::Complete);
        assert!(!confirm.token.is_empty());

        let done = engine.accept(&mut acceptor, Some(&credential), &confirm.token);
        assert_eq!(done.step.status, NegotiationStatus::Complete);
        assert!(done.step.token.is_empty());
        assert_eq!(done.peer, Some(target.clone()));

        let initiator = initiator.unwrap();
        let acceptor = acceptor.unwrap();
        assert!(initiator.is_established());
        assert!(acceptor.is_established());
        assert_eq!(initiator.session_key(), acceptor.session_key());
        assert_eq!(acceptor.principal(), &target);
    }

    #[test]
    fn test_default_principal_without_names() {
        let engine = engine_with("host@localhost", [3u8; 32]);

        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, None, &[]);
        let reply = engine.accept(&mut acceptor, None, &init.token);
        let confirm = engine.initiate(&mut initiator, None, &reply.step.token);
        let done = engine.accept(&mut acceptor, None, &confirm.token);

        assert_eq!(done.step.status, NegotiationStatus::Complete);
        assert_eq!(done.peer.map(|p| p.to_string()), Some("host@localhost".into()));
    }

    #[test]
    fn test_wrong_key_fails_at_initiator() {
        let initiator_engine = engine_with("host@localhost", [1u8; 32]);
        let acceptor_engine = engine_with("host@localhost", [2u8; 32]);

        let mut initiator = None;
        let mut acceptor = None;
        let init = initiator_engine.initiate(&mut initiator, None, &[]);
        let reply = acceptor_engine.accept(&mut acceptor, None, &init.token);
        let step = initiator_engine.initiate(&mut initiator, None, &reply.step.token);

        let status = failure(&step);
        assert_eq!(status.major, status::BAD_SIG);
        assert_eq!(status.minor, minor::CONFIRMATION_FAILED);
        assert!(initiator.is_none());
    }

    #[test]
    fn test_tampered_confirm_fails_at_acceptor() {
        let engine = engine_with("host@localhost", [5u8; 32]);

        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, None, &[]);
        let reply = engine.accept(&mut acceptor, None, &init.token);
        let confirm = engine.initiate(&mut initiator, None, &reply.step.token);

        let mut tampered = confirm.token.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;

        let done = engine.accept(&mut acceptor, None, &tampered);
        assert_eq!(failure(&done.step).major, status::BAD_SIG);
        assert!(done.peer.is_none());
    }

    #[test]
    fn test_unknown_principal_and_missing_default() {
        let engine = engine_with("host@localhost", [5u8; 32]);

        let err = engine
            .acquire_credential(&name("nfs@localhost"), CredentialUsage::Accept)
            .unwrap_err();
        assert_eq!(err.major, status::NO_CRED);
        assert_eq!(err.minor, minor::NO_KEY_FOR_PRINCIPAL);

        let empty = SharedKeyEngine::default();
        let mut context = None;
        let step = empty.initiate(&mut context, None, &[]);
        assert_eq!(failure(&step).minor, minor::NO_DEFAULT_PRINCIPAL);
    }

    #[test]
    fn test_credential_usage_is_enforced() {
        let engine = engine_with("host@localhost", [6u8; 32]);
        let target = name("host@localhost");

        let initiate_only = engine
            .acquire_credential(&target, CredentialUsage::Initiate)
            .unwrap();
        assert_eq!(initiate_only.usage(), CredentialUsage::Initiate);
        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, Some(&target), &[]);
        let step = engine.accept(&mut acceptor, Some(&initiate_only), &init.token);
        let status = failure(&step.step);
        assert_eq!(status.major, status::NO_CRED);
        assert_eq!(status.minor, minor::CREDENTIAL_NOT_FOR_ACCEPT);
        assert!(acceptor.is_none());

        let both = engine.acquire_credential(&target, CredentialUsage::Both).unwrap();
        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, Some(&target), &[]);
        let reply = engine.accept(&mut acceptor, Some(&both), &init.token);
        let confirm = engine.initiate(&mut initiator, Some(&target), &reply.step.token);
        let done = engine.accept(&mut acceptor, Some(&both), &confirm.token);
        assert_eq!(done.step.status, NegotiationStatus::Complete);
    }

    #[test]
    fn test_principal_mismatch_with_credential() {
        let mut keytab = Keytab::new();
        keytab.insert(&name("host@localhost"), SecretKey::from_bytes([1u8; 32]));
        keytab.insert(&name("nfs@localhost"), SecretKey::from_bytes([2u8; 32]));
        let engine = SharedKeyEngine::new(keytab);
        let credential = engine
            .acquire_credential(&name("host@localhost"), CredentialUsage::Accept)
            .unwrap();

        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, Some(&name("nfs@localhost")), &[]);
        let reply = engine.accept(&mut acceptor, Some(&credential), &init.token);

        assert_eq!(failure(&reply.step).minor, minor::PRINCIPAL_MISMATCH);
        assert!(acceptor.is_none());
    }

    #[test]
    fn test_out_of_sequence_tokens() {
        let engine = engine_with("host@localhost", [5u8; 32]);

        // Initiator must not be fed a token on its first call.
        let mut context = None;
        let step = engine.initiate(&mut context, None, b"unexpected");
        assert_eq!(failure(&step).minor, minor::UNEXPECTED_TOKEN);

        // Acceptor must start from an init token.
        let confirm = Message::Confirm(ConfirmToken { tag: [0u8; 32] }).encode();
        let mut context = None;
        let step = engine.accept(&mut context, None, &confirm);
        assert_eq!(failure(&step.step).minor, minor::UNEXPECTED_TOKEN);

        // An initiator context cannot be used for accepting.
        let mut context = None;
        let init = engine.initiate(&mut context, None, &[]);
        let step = engine.accept(&mut context, None, &init.token);
        assert_eq!(failure(&step.step).major, status::NO_CONTEXT);
    }

    #[test]
    fn test_established_context_rejects_more_tokens() {
        let engine = engine_with("host@localhost", [5u8; 32]);

        let mut initiator = None;
        let mut acceptor = None;
        let init = engine.initiate(&mut initiator, None, &[]);
        let reply = engine.accept(&mut acceptor, None, &init.token);
        engine.initiate(&mut initiator, None, &reply.step.token);

        let again = engine.initiate(&mut initiator, None, &reply.step.token);
        assert_eq!(failure(&again).minor, minor::CONTEXT_ESTABLISHED);
    }

    #[test]
    fn test_low_order_key_share_is_rejected() {
        let engine = engine_with("host@localhost", [5u8; 32]);
        let init = Message::Init(InitToken {
            initiator_public: PublicKey::from_bytes([0u8; 32]),
            nonce: [1u8; NONCE_SIZE],
            target: String::new(),
        })
        .encode();

        let mut context = None;
        let step = engine.accept(&mut context, None, &init);
        assert_eq!(failure(&step.step).minor, minor::WEAK_KEY_SHARE);
    }
}
