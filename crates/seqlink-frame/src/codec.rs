use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::Message;

/// Frame header: outbound seq (1) + inbound seq (1) + reserved (1) + length (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest body the one-byte length field may declare.
pub const MAX_BODY_LEN: usize = 251;

/// Default maximum frame size, header included.
pub const DEFAULT_MAX_FRAME: usize = 4096;

/// Outbound sequence value reserved for device-initiated pushes.
pub const PUSH_SEQUENCE: u8 = 0;

/// A sequence-numbered frame.
///
/// Holds the complete wire bytes; header fields and the body are views into
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqFrame {
    raw: Bytes,
}

impl SeqFrame {
    /// Build a frame from header fields and a body.
    pub fn new(outbound_seq: u8, inbound_seq: u8, body: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        encode_frame(outbound_seq, inbound_seq, body, &mut buf)?;
        Ok(Self { raw: buf.freeze() })
    }

    /// Sequence assigned by the host to a request (0 for pushes).
    pub fn outbound_seq(&self) -> u8 {
        self.raw[0]
    }

    /// Sequence assigned by the device to a push.
    pub fn inbound_seq(&self) -> u8 {
        self.raw[1]
    }

    /// Whether the outbound sequence marks this as device-initiated.
    pub fn is_push_candidate(&self) -> bool {
        self.outbound_seq() == PUSH_SEQUENCE
    }

    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        self.raw.len()
    }
}

impl Message for SeqFrame {
    type Body = Bytes;

    fn bytes(&self) -> &Bytes {
        &self.raw
    }

    fn body(&self) -> Bytes {
        self.raw.slice(HEADER_SIZE..)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬────────────┬──────────┬────────────┬──────────────┐
/// │ Out seq (1B)│ In seq (1B)│ Rsvd (1B)│ Length (1B)│ Body         │
/// │             │            │ 0x00     │ 0..=251    │ (Length B)   │
/// └─────────────┴────────────┴──────────┴────────────┴──────────────┘
/// ```
pub fn encode_frame(
    outbound_seq: u8,
    inbound_seq: u8,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if body.len() > MAX_BODY_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: MAX_BODY_LEN,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_u8(outbound_seq);
    dst.put_u8(inbound_seq);
    dst.put_u8(0);
    dst.put_u8(body.len() as u8);
    dst.put_slice(body);
    Ok(())
}

/// Total frame length declared by the header at the front of `src`.
///
/// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
pub fn declared_frame_len(src: &[u8]) -> Option<usize> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    Some(HEADER_SIZE + src[3] as usize)
}

/// Parse exactly one frame from `raw`.
///
/// `raw` must hold the header and exactly the declared number of body bytes.
pub fn parse_frame(raw: Bytes) -> Result<SeqFrame> {
    let needed = declared_frame_len(&raw).ok_or(FrameError::Truncated {
        available: raw.len(),
        needed: HEADER_SIZE,
    })?;
    if raw.len() < needed {
        return Err(FrameError::Truncated {
            available: raw.len(),
            needed,
        });
    }

    let reserved = raw[2];
    if reserved != 0 {
        return Err(FrameError::ReservedByte(reserved));
    }

    let len = raw[3] as usize;
    if len > MAX_BODY_LEN {
        return Err(FrameError::InvalidLength {
            len,
            max: MAX_BODY_LEN,
        });
    }

    Ok(SeqFrame {
        raw: raw.slice(..needed),
    })
}

/// Configuration for the sequence-numbered binding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, header included. Default: 4096.
    pub max_frame_size: usize,
    /// First outbound sequence number. `None` picks a random non-zero value.
    pub initial_sequence: Option<u8>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            initial_sequence: None,
        }
    }
}

impl FrameConfig {
    /// Largest body accepted under this configuration.
    pub fn max_body_len(&self) -> usize {
        MAX_BODY_LEN.min(self.max_frame_size.saturating_sub(HEADER_SIZE))
    }
}
