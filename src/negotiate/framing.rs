//! Token transfer over a [`Channel`].
//!
//! [`TokenFraming::Raw`] treats each transport read as one whole token.
//! Stream sockets do not promise that, but the handshake never has two
//! tokens in flight in the same direction, so a read can only be split if
//! the kernel splits a single small write. [`TokenFraming::LengthPrefixed`]
//! removes that assumption at the cost of wire compatibility with raw peers.

use std::io;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::negotiate::NegotiationOptions;
use crate::token::Token;

/// Size of the length prefix in [`TokenFraming::LengthPrefixed`] mode.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// How tokens are delimited on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenFraming {
    /// One read is one token
    #[default]
    Raw,
    /// Each token is preceded by its length as a big-endian `u32`
    LengthPrefixed,
}

/// Sends and receives whole tokens, enforcing the size limit both ways.
pub(crate) struct TokenLink<'a, C: Channel + ?Sized> {
    channel: &'a mut C,
    options: &'a NegotiationOptions,
    pub(crate) sent: usize,
    pub(crate) received: usize,
}

impl<'a, C: Channel + ?Sized> TokenLink<'a, C> {
    pub(crate) fn new(channel: &'a mut C, options: &'a NegotiationOptions) -> Self {
        Self {
            channel,
            options,
            sent: 0,
            received: 0,
        }
    }

    /// Size-check then transmit `token`. Oversized tokens never reach the channel.
    pub(crate) fn send(&mut self, token: &Token) -> Result<()> {
        token.check_size(self.options.max_token_size)?;
        self.trace("send", token);

        let result = match self.options.framing {
            TokenFraming::Raw => self.channel.send(token),
            TokenFraming::LengthPrefixed => {
                let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + token.len());
                frame.put_u32(token.len() as u32);
                frame.put_slice(token);
                self.channel.send(&frame)
            }
        };
        result.map_err(|e| self.io_error("send", e))?;

        self.sent += 1;
        Ok(())
    }

    /// Block until the next token arrives. `None` means the peer closed cleanly.
    pub(crate) fn receive(&mut self) -> Result<Option<Token>> {
        let max = self.options.max_token_size;

        let bytes = match self.options.framing {
            TokenFraming::Raw => {
                // One byte of headroom so an oversized token is seen, not truncated.
                let bytes = self
                    .channel
                    .receive(max + 1)
                    .map_err(|e| self.io_error("receive", e))?;
                if bytes.is_empty() {
                    return Ok(None);
                }
                if bytes.len() > max {
                    return Err(Error::TokenTooLarge {
                        len: bytes.len(),
                        max,
                    });
                }
                bytes
            }
            TokenFraming::LengthPrefixed => {
                let Some(len) = self.receive_length()? else {
                    return Ok(None);
                };
                if len > max {
                    return Err(Error::TokenTooLarge { len, max });
                }
                self.channel
                    .receive_exact(len)
                    .map_err(|e| self.io_error("receive", e))?
            }
        };

        let token = Token::from(bytes);
        self.trace("received", &token);
        self.received += 1;
        Ok(Some(token))
    }

    fn receive_length(&mut self) -> Result<Option<usize>> {
        let head = self
            .channel
            .receive(LENGTH_PREFIX_SIZE)
            .map_err(|e| self.io_error("receive", e))?;
        if head.is_empty() {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix[..head.len()].copy_from_slice(&head);
        if head.len() < LENGTH_PREFIX_SIZE {
            let rest: Bytes = self
                .channel
                .receive_exact(LENGTH_PREFIX_SIZE - head.len())
                .map_err(|e| self.io_error("receive", e))?;
            prefix[head.len()..].copy_from_slice(&rest);
        }

        Ok(Some(u32::from_be_bytes(prefix) as usize))
    }

    fn trace(&self, direction: &str, token: &Token) {
        if self.options.trace_tokens {
            tracing::debug!("{} buf len {}:\n{}", direction, token.len(), token.to_hex());
        }
    }

    fn io_error(&self, operation: &'static str, source: io::Error) -> Error {
        match (self.options.io_timeout, source.kind()) {
            (Some(timeout), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Error::Timeout(duration_ms(timeout))
            }
            _ => Error::transport(operation, source),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::testing::MemoryChannel;

    fn options(framing: TokenFraming) -> NegotiationOptions {
        NegotiationOptions {
            framing,
            ..NegotiationOptions::default()
        }
    }

    #[test]
    fn test_token_at_limit_is_sent() {
        let options = options(TokenFraming::Raw);
        let mut channel = MemoryChannel::new();
        let mut link = TokenLink::new(&mut channel, &options);

        link.send(&Token::from(vec![1u8; options.max_token_size])).unwrap();

        assert_eq!(link.sent, 1);
        assert_eq!(channel.sent[0].len(), options.max_token_size);
    }

    #[test]
    fn test_oversized_token_never_reaches_channel() {
        let options = options(TokenFraming::Raw);
        let mut channel = MemoryChannel::new();
        let mut link = TokenLink::new(&mut channel, &options);

        let err = link
            .send(&Token::from(vec![1u8; options.max_token_size + 1]))
            .unwrap_err();

        assert!(matches!(err, Error::TokenTooLarge { len: 1025, max: 1024 }));
        assert!(channel.sent.is_empty());
    }

    #[test]
    fn test_raw_receive_limits() {
        let options = options(TokenFraming::Raw);
        let mut channel = MemoryChannel::with_inbound([vec![2u8; 1024], vec![3u8; 1025]]);
        let mut link = TokenLink::new(&mut channel, &options);

        assert_eq!(link.receive().unwrap().unwrap().len(), 1024);
        assert!(matches!(
            link.receive(),
            Err(Error::TokenTooLarge { len: 1025, max: 1024 })
        ));
        assert_eq!(link.received, 1);
    }

    #[test]
    fn test_raw_receive_close() {
        let options = options(TokenFraming::Raw);
        let mut channel = MemoryChannel::new();
        let mut link = TokenLink::new(&mut channel, &options);

        assert!(link.receive().unwrap().is_none());
    }

    #[test]
    fn test_length_prefixed_roundtrip_through_split_reads() {
        let options = options(TokenFraming::LengthPrefixed);
        let mut sender = MemoryChannel::new();
        TokenLink::new(&mut sender, &options)
            .send(&Token::from(&b"abcdef"[..]))
            .unwrap();
        assert_eq!(&sender.sent[0][..], b"\x00\x00\x00\x06abcdef");

        // Deliver the frame in awkward pieces.
        let frame = sender.sent[0].clone();
        let mut receiver = MemoryChannel::with_inbound([
            frame[..2].to_vec(),
            frame[2..5].to_vec(),
            frame[5..].to_vec(),
        ]);
        let token = TokenLink::new(&mut receiver, &options)
            .receive()
            .unwrap()
            .unwrap();

        assert_eq!(token.as_bytes(), b"abcdef");
    }

    #[test]
    fn test_length_prefixed_rejects_announced_oversize() {
        let options = options(TokenFraming::LengthPrefixed);
        let mut channel = MemoryChannel::with_inbound([2000u32.to_be_bytes().to_vec()]);
        let mut link = TokenLink::new(&mut channel, &options);

        assert!(matches!(
            link.receive(),
            Err(Error::TokenTooLarge { len: 2000, max: 1024 })
        ));
    }

    #[test]
    fn test_length_prefixed_truncated_body() {
        let options = options(TokenFraming::LengthPrefixed);
        let mut channel = MemoryChannel::with_inbound([b"\x00\x00\x00\x08abc".to_vec()]);
        let mut link = TokenLink::new(&mut channel, &options);

        match link.receive() {
            Err(Error::Transport { operation, source }) => {
                assert_eq!(operation, "receive");
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_mapping() {
        let options = NegotiationOptions {
            io_timeout: Some(Duration::from_millis(1500)),
            ..NegotiationOptions::default()
        };
        let mut channel = MemoryChannel::new();
        channel.fail_receive_with(io::ErrorKind::WouldBlock);
        let mut link = TokenLink::new(&mut channel, &options);

        assert!(matches!(link.receive(), Err(Error::Timeout(1500))));
    }
}
