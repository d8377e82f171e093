//! Acceptor (server) side of the negotiation.

use crate::channel::Channel;
use crate::engine::{CredentialUsage, SecurityEngine, Step};
use crate::error::{Error, Result};
use crate::negotiate::{drive, NegotiationDriver, NegotiationOptions, NegotiationOutcome, Role};

/// Drives `accept` calls, optionally under an accept credential.
pub struct AcceptorDriver<E: SecurityEngine> {
    credential: Option<E::Credential>,
    peer: Option<E::Name>,
}

impl<E: SecurityEngine> AcceptorDriver<E> {
    /// Resolve `local` and acquire its accept credential before any I/O.
    ///
    /// Without a local name the engine picks its default identity.
    pub fn new(engine: &E, local: Option<&str>) -> Result<Self> {
        let credential = match local {
            Some(name) => {
                let resolved =
                    engine
                        .resolve_identity(name)
                        .map_err(|status| Error::IdentityResolutionFailed {
                            name: name.to_owned(),
                            status,
                        })?;
                let credential = engine
                    .acquire_credential(&resolved, CredentialUsage::Accept)
                    .map_err(|status| Error::CredentialAcquisitionFailed {
                        name: name.to_owned(),
                        status,
                    })?;
                tracing::debug!("Acquired accept credential for {}", resolved);
                Some(credential)
            }
            None => None,
        };

        Ok(Self {
            credential,
            peer: None,
        })
    }

    /// Run the acceptor loop over `channel`.
    pub fn run<C: Channel + ?Sized>(
        mut self,
        engine: &E,
        channel: &mut C,
        options: &NegotiationOptions,
    ) -> Result<NegotiationOutcome> {
        let outcome = drive(engine, &mut self, channel, options)?;
        if let Some(peer) = &outcome.peer {
            tracing::info!("Authenticated peer {}", peer);
        }
        Ok(outcome)
    }
}

impl<E: SecurityEngine> NegotiationDriver<E> for AcceptorDriver<E> {
    const ROLE: Role = Role::Acceptor;
    const OPERATION: &'static str = "accept";

    fn step(&mut self, engine: &E, context: &mut Option<E::Context>, input: &[u8]) -> Step {
        let accepted = engine.accept(context, self.credential.as_ref(), input);
        if let Some(peer) = accepted.peer {
            self.peer = Some(peer);
        }
        accepted.step
    }

    fn peer_name(&self) -> Option<String> {
        self.peer.as_ref().map(ToString::to_string)
    }
}

/// Establish a context as the acceptor. The acceptor always listens first.
pub fn negotiate_as_acceptor<E, C>(
    engine: &E,
    channel: &mut C,
    local: Option<&str>,
    options: &NegotiationOptions,
) -> Result<NegotiationOutcome>
where
    E: SecurityEngine,
    C: Channel + ?Sized,
{
    AcceptorDriver::new(engine, local)?.run(engine, channel, options)
}
