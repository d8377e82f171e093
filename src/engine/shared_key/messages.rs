//! Wire format of the shared-key mechanism's three handshake tokens.
//!
//! ```text
//! Init    | ver | 1 | initiator key (32) | nonce (32) | target len (2) | target |
//! Reply   | ver | 2 | acceptor key (32)  | nonce (32) | confirmation tag (32)  |
//! Confirm | ver | 3 | confirmation tag (32)                                     |
//! ```
//!
//! Integers are big-endian. An empty target means "the acceptor's default".

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crypto::{PublicKey, CONFIRM_TAG_SIZE, NONCE_SIZE, PUBLIC_KEY_SIZE};
use crate::engine::shared_key::{minor, reject};
use crate::engine::status::{self, StatusCode};

/// Mechanism token version.
pub const VERSION: u8 = 0x01;

/// Longest target principal an init token may carry.
pub const MAX_TARGET_LEN: usize = 512;

/// Handshake message types
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Init = 1,
    Reply = 2,
    Confirm = 3,
}

impl MessageType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::Init),
            2 => Some(MessageType::Reply),
            3 => Some(MessageType::Confirm),
            _ => None,
        }
    }
}

/// First leg: initiator key share and requested principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitToken {
    pub initiator_public: PublicKey,
    pub nonce: [u8; NONCE_SIZE],
    pub target: String,
}

/// Second leg: acceptor key share and proof of the principal's secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyToken {
    pub acceptor_public: PublicKey,
    pub nonce: [u8; NONCE_SIZE],
    pub tag: [u8; CONFIRM_TAG_SIZE],
}

/// Third leg: initiator proof of the principal's secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmToken {
    pub tag: [u8; CONFIRM_TAG_SIZE],
}

/// A decoded mechanism token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Init(InitToken),
    Reply(ReplyToken),
    Confirm(ConfirmToken),
}

impl Message {
    /// Type tag of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Init(_) => MessageType::Init,
            Message::Reply(_) => MessageType::Reply,
            Message::Confirm(_) => MessageType::Confirm,
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u8(VERSION);
        buf.put_u8(self.message_type() as u8);

        match self {
            Message::Init(init) => {
                buf.put_slice(init.initiator_public.as_bytes());
                buf.put_slice(&init.nonce);
                buf.put_u16(init.target.len() as u16);
                buf.put_slice(init.target.as_bytes());
            }
            Message::Reply(reply) => {
                buf.put_slice(reply.acceptor_public.as_bytes());
                buf.put_slice(&reply.nonce);
                buf.put_slice(&reply.tag);
            }
            Message::Confirm(confirm) => {
                buf.put_slice(&confirm.tag);
            }
        }

        buf.freeze()
    }

    /// Parse wire bytes, rejecting anything malformed or with trailing data.
    pub fn decode(data: &[u8]) -> Result<Self, StatusCode> {
        let mut buf = data;
        if buf.remaining() < 2 {
            return Err(malformed());
        }

        let version = buf.get_u8();
        if version != VERSION {
            return Err(reject(status::DEFECTIVE_TOKEN, minor::UNSUPPORTED_VERSION));
        }

        let message_type = MessageType::from_u8(buf.get_u8()).ok_or_else(malformed)?;
        let message = match message_type {
            MessageType::Init => {
                let initiator_public = PublicKey::from_bytes(take_array(&mut buf)?);
                let nonce = take_array(&mut buf)?;
                if buf.remaining() < 2 {
                    return Err(malformed());
                }
                let target_len = buf.get_u16() as usize;
                if target_len > MAX_TARGET_LEN || buf.remaining() < target_len {
                    return Err(malformed());
                }
                let target = std::str::from_utf8(&buf[..target_len])
                    .map_err(|_| malformed())?
                    .to_owned();
                buf.advance(target_len);

                Message::Init(InitToken {
                    initiator_public,
                    nonce,
                    target,
                })
            }
            MessageType::Reply => Message::Reply(ReplyToken {
                acceptor_public: PublicKey::from_bytes(take_array::<PUBLIC_KEY_SIZE>(&mut buf)?),
                nonce: take_array(&mut buf)?,
                tag: take_array(&mut buf)?,
            }),
            MessageType::Confirm => Message::Confirm(ConfirmToken {
                tag: take_array(&mut buf)?,
            }),
        };

        if buf.has_remaining() {
            return Err(malformed());
        }
        Ok(message)
    }
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N], StatusCode> {
    if buf.remaining() < N {
        return Err(malformed());
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn malformed() -> StatusCode {
    reject(status::DEFECTIVE_TOKEN, minor::MALFORMED_TOKEN)
}
