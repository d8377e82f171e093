//! Negotiation driver.
//!
//! Both roles run the same loop: call the engine, ship whatever token it
//! produced, and wait for the peer's answer while the engine still needs
//! one. The roles differ only in who speaks first and which engine
//! operation they call, captured by [`NegotiationDriver`].
//!
//! ```text
//!          +------------------+
//!          | receive (acceptor|  <- acceptor starts here
//!          |  only, round 1)  |
//!          +--------+---------+
//!                   v
//!   +-------> engine step ----FAILED----> EngineRejected
//!   |               |
//!   |        send token if any
//!   |               |
//!   |   CONTINUE    |    COMPLETE
//!   +-- receive <---+-----------> outcome
//! ```

mod acceptor;
mod framing;
mod initiator;

use std::fmt;
use std::io;
use std::time::Duration;

pub use acceptor::{negotiate_as_acceptor, AcceptorDriver};
pub use framing::{TokenFraming, LENGTH_PREFIX_SIZE};
pub use initiator::{negotiate_as_initiator, InitiatorDriver};

use crate::channel::Channel;
use crate::engine::{NegotiationStatus, SecurityEngine, Step};
use crate::error::{Error, Result};
use crate::token::Token;
use crate::MAX_TOKEN_SIZE;
use framing::TokenLink;

/// Which side of the handshake this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client: connects and speaks first
    Initiator,
    /// Server: listens and answers
    Acceptor,
}

impl Role {
    /// Name used in the summary line.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Initiator => "Client",
            Role::Acceptor => "Server",
        }
    }

    /// Whether this role sends before it receives.
    pub fn speaks_first(&self) -> bool {
        matches!(self, Role::Initiator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Knobs threaded into every negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationOptions {
    /// Largest token accepted on either path
    pub max_token_size: usize,
    /// Wire delimiting of tokens
    pub framing: TokenFraming,
    /// Log every token with a hex dump
    pub trace_tokens: bool,
    /// Bound on each blocking send/receive; `None` waits forever
    pub io_timeout: Option<Duration>,
}

impl Default for NegotiationOptions {
    fn default() -> Self {
        Self {
            max_token_size: MAX_TOKEN_SIZE,
            framing: TokenFraming::Raw,
            trace_tokens: false,
            io_timeout: None,
        }
    }
}

/// Summary of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Role this side played
    pub role: Role,
    /// Engine calls made
    pub rounds: usize,
    /// Tokens handed to the transport
    pub tokens_sent: usize,
    /// Tokens read from the transport
    pub tokens_received: usize,
    /// Peer identity as reported by the engine
    pub peer: Option<String>,
}

/// One role's view of the negotiation loop.
pub trait NegotiationDriver<E: SecurityEngine> {
    /// Role implemented by this driver
    const ROLE: Role;

    /// Engine operation name used in diagnostics
    const OPERATION: &'static str;

    /// Advance the engine by one call.
    fn step(&mut self, engine: &E, context: &mut Option<E::Context>, input: &[u8]) -> Step;

    /// Peer identity to report once the loop completes.
    fn peer_name(&self) -> Option<String>;
}

/// Run the negotiation loop for `driver` over `channel`.
///
/// The engine context lives only for the duration of this call.
pub fn drive<E, D, C>(
    engine: &E,
    driver: &mut D,
    channel: &mut C,
    options: &NegotiationOptions,
) -> Result<NegotiationOutcome>
where
    E: SecurityEngine,
    D: NegotiationDriver<E>,
    C: Channel + ?Sized,
{
    let role = D::ROLE;
    let mut context: Option<E::Context> = None;
    let mut link = TokenLink::new(channel, options);
    let mut rounds = 0;

    let mut inbound = if role.speaks_first() {
        Token::empty()
    } else {
        receive_or_close(&mut link, role)?
    };

    loop {
        rounds += 1;
        let step = driver.step(engine, &mut context, &inbound);
        tracing::debug!(
            "{} round {}: {:?}, {} byte token",
            D::OPERATION,
            rounds,
            step.status,
            step.token.len()
        );

        if let NegotiationStatus::Failed(status) = step.status {
            return Err(Error::EngineRejected {
                operation: D::OPERATION,
                status,
            });
        }
        let more = !step.status.is_terminal();

        if !step.token.is_empty() {
            link.send(&step.token)?;
        } else if more {
            return Err(Error::protocol(format!(
                "{} needs another round but produced no token",
                D::OPERATION
            )));
        }

        if !more {
            break;
        }
        inbound = receive_or_close(&mut link, role)?;
    }

    Ok(NegotiationOutcome {
        role,
        rounds,
        tokens_sent: link.sent,
        tokens_received: link.received,
        peer: driver.peer_name(),
    })
}

fn receive_or_close<C: Channel + ?Sized>(link: &mut TokenLink<'_, C>, role: Role) -> Result<Token> {
    match link.receive()? {
        Some(token) => Ok(token),
        None => match role {
            Role::Initiator => Err(Error::UnexpectedClose),
            Role::Acceptor => Err(Error::transport(
                "receive",
                io::Error::new(io::ErrorKind::UnexpectedEof, "peer sent no token"),
            )),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine and in-memory channel for driver tests.

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    use bytes::Bytes;

    use crate::channel::Channel;
    use crate::engine::status::{self, StatusCode};
    use crate::engine::{AcceptStep, CredentialUsage, SecurityEngine, Step};

    /// Channel that records sends and replays queued reads.
    ///
    /// An exhausted queue reads as a clean close.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryChannel {
        inbound: VecDeque<Bytes>,
        pub(crate) sent: Vec<Bytes>,
        pub(crate) closes: usize,
        receive_error: Option<io::ErrorKind>,
    }

    impl MemoryChannel {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_inbound<I, T>(chunks: I) -> Self
        where
            I: IntoIterator<Item = T>,
            T: Into<Vec<u8>>,
        {
            Self {
                inbound: chunks.into_iter().map(|c| Bytes::from(c.into())).collect(),
                ..Self::default()
            }
        }

        pub(crate) fn fail_receive_with(&mut self, kind: io::ErrorKind) {
            self.receive_error = Some(kind);
        }
    }

    impl Channel for MemoryChannel {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.push(Bytes::copy_from_slice(bytes));
            Ok(())
        }

        fn receive(&mut self, max_len: usize) -> io::Result<Bytes> {
            if let Some(kind) = self.receive_error {
                return Err(io::Error::from(kind));
            }
            let Some(mut chunk) = self.inbound.pop_front() else {
                return Ok(Bytes::new());
            };
            if chunk.len() > max_len {
                let rest = chunk.split_off(max_len);
                self.inbound.push_front(rest);
            }
            Ok(chunk)
        }

        fn close(&mut self) -> io::Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    /// Engine that replays a fixed list of steps and records its inputs.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedEngine {
        steps: RefCell<VecDeque<Step>>,
        pub(crate) inputs: RefCell<Vec<Vec<u8>>>,
        pub(crate) peer: Option<String>,
        pub(crate) reject_names: bool,
        pub(crate) reject_credentials: bool,
    }

    impl ScriptedEngine {
        pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: RefCell::new(steps.into_iter().collect()),
                ..Self::default()
            }
        }

        fn next(&self, context: &mut Option<usize>, input: &[u8]) -> Step {
            self.inputs.borrow_mut().push(input.to_vec());
            *context.get_or_insert(0) += 1;
            self.steps
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Step::failed(StatusCode::new(status::FAILURE, 99)))
        }
    }

    impl SecurityEngine for ScriptedEngine {
        type Name = String;
        type Credential = String;
        type Context = usize;

        fn resolve_identity(&self, name: &str) -> Result<String, StatusCode> {
            if self.reject_names {
                return Err(StatusCode::new(status::BAD_NAME, 1));
            }
            Ok(name.to_owned())
        }

        fn acquire_credential(
            &self,
            name: &String,
            _usage: CredentialUsage,
        ) -> Result<String, StatusCode> {
            if self.reject_credentials {
                return Err(StatusCode::new(status::NO_CRED, 2));
            }
            Ok(name.clone())
        }

        fn initiate(
            &self,
            context: &mut Option<usize>,
            _target: Option<&String>,
            input: &[u8],
        ) -> Step {
            self.next(context, input)
        }

        fn accept(
            &self,
            context: &mut Option<usize>,
            _credential: Option<&String>,
            input: &[u8],
        ) -> AcceptStep<String> {
            let step = self.next(context, input);
            let peer = match step.status {
                crate::engine::NegotiationStatus::Complete => self.peer.clone(),
                _ => None,
            };
            AcceptStep { step, peer }
        }
    }
}
