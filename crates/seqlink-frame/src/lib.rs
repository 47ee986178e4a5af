//! Message contracts and sequence-numbered framing.
//!
//! The engine is generic over [`MessageFactory`]; this crate defines that
//! contract and ships one binding for it. Every sample-binding frame is:
//! - A 1-byte outbound sequence (host-assigned, 0 for pushes)
//! - A 1-byte inbound sequence (device-assigned push counter)
//! - A reserved byte (always 0)
//! - A 1-byte body length, followed by the body
//!
//! Reassembly across arbitrary chunk boundaries happens inside the factory;
//! callers only ever see complete messages.

pub mod codec;
pub mod error;
pub mod factory;
pub mod message;

pub use codec::{
    declared_frame_len, encode_frame, parse_frame, FrameConfig, SeqFrame, DEFAULT_MAX_FRAME,
    HEADER_SIZE, MAX_BODY_LEN, PUSH_SEQUENCE,
};
pub use error::{FrameError, Result};
pub use factory::SeqFactory;
pub use message::{Message, MessageFactory};
