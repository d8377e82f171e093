//! Initiator (client) side of the negotiation.

use crate::channel::Channel;
use crate::engine::{SecurityEngine, Step};
use crate::error::{Error, Result};
use crate::negotiate::{drive, NegotiationDriver, NegotiationOptions, NegotiationOutcome, Role};

/// Drives `initiate` calls toward an optional target identity.
pub struct InitiatorDriver<E: SecurityEngine> {
    target: Option<E::Name>,
}

impl<E: SecurityEngine> InitiatorDriver<E> {
    /// Resolve `target` (if any) before any I/O happens.
    pub fn new(engine: &E, target: Option<&str>) -> Result<Self> {
        let target = target
            .map(|name| {
                engine
                    .resolve_identity(name)
                    .map_err(|status| Error::IdentityResolutionFailed {
                        name: name.to_owned(),
                        status,
                    })
            })
            .transpose()?;
        Ok(Self { target })
    }

    /// Run the initiator loop over `channel`.
    pub fn run<C: Channel + ?Sized>(
        mut self,
        engine: &E,
        channel: &mut C,
        options: &NegotiationOptions,
    ) -> Result<NegotiationOutcome> {
        if let Some(target) = &self.target {
            tracing::debug!("Initiating context with {}", target);
        }
        drive(engine, &mut self, channel, options)
    }
}

impl<E: SecurityEngine> NegotiationDriver<E> for InitiatorDriver<E> {
    const ROLE: Role = Role::Initiator;
    const OPERATION: &'static str = "initiate";

    fn step(&mut self, engine: &E, context: &mut Option<E::Context>, input: &[u8]) -> Step {
        engine.initiate(context, self.target.as_ref(), input)
    }

    fn peer_name(&self) -> Option<String> {
        self.target.as_ref().map(ToString::to_string)
    }
}

/// Establish a context as the initiator. The initiator always speaks first.
pub fn negotiate_as_initiator<E, C>(
    engine: &E,
    channel: &mut C,
    target: Option<&str>,
    options: &NegotiationOptions,
) -> Result<NegotiationOutcome>
where
    E: SecurityEngine,
    C: Channel + ?Sized,
{
    InitiatorDriver::new(engine, target)?.run(engine, channel, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::status;
    use crate::negotiate::testing::{MemoryChannel, ScriptedEngine};
    use crate::token::Token;

    #[test]
    fn test_bad_target_fails_before_io() {
        let mut engine = ScriptedEngine::new([Step::continue_with(&b"t1"[..])]);
        engine.reject_names = true;
        let mut channel = MemoryChannel::new();

        let err = negotiate_as_initiator(
            &engine,
            &mut channel,
            Some("bogus"),
            &NegotiationOptions::default(),
        )
        .unwrap_err();

        match err {
            Error::IdentityResolutionFailed { name, status } => {
                assert_eq!(name, "bogus");
                assert_eq!(status.major, status::BAD_NAME);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(channel.sent.is_empty());
        assert!(engine.inputs.borrow().is_empty());
    }

    #[test]
    fn test_complete_with_final_token() {
        let engine = ScriptedEngine::new([
            Step::continue_with(&b"t1"[..]),
            Step::complete(&b"final"[..]),
        ]);
        let mut channel = MemoryChannel::with_inbound([b"r1".to_vec(), b"never read".to_vec()]);

        let outcome = negotiate_as_initiator(
            &engine,
            &mut channel,
            Some("host@localhost"),
            &NegotiationOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.role, Role::Initiator);
        assert_eq!(outcome.tokens_sent, 2);
        assert_eq!(outcome.tokens_received, 1);
        assert_eq!(outcome.peer.as_deref(), Some("host@localhost"));
        assert_eq!(&channel.sent[1][..], b"final");
    }

    #[test]
    fn test_complete_on_first_call() {
        let engine = ScriptedEngine::new([Step::complete(Token::empty())]);
        let mut channel = MemoryChannel::new();

        let outcome =
            negotiate_as_initiator(&engine, &mut channel, None, &NegotiationOptions::default())
                .unwrap();

        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.tokens_sent, 0);
        assert!(outcome.peer.is_none());
    }

    #[test]
    fn test_oversized_reply_is_rejected() {
        let engine = ScriptedEngine::new([Step::continue_with(&b"t1"[..])]);
        let mut channel = MemoryChannel::with_inbound([vec![0u8; 4096]]);

        let err =
            negotiate_as_initiator(&engine, &mut channel, None, &NegotiationOptions::default())
                .unwrap_err();

        assert!(matches!(err, Error::TokenTooLarge { len: 1025, max: 1024 }));
        assert_eq!(engine.inputs.borrow().len(), 1);
    }
}
