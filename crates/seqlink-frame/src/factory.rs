use bytes::{Bytes, BytesMut};
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::codec::{declared_frame_len, parse_frame, FrameConfig, SeqFrame, PUSH_SEQUENCE};
use crate::error::{FrameError, Result};
use crate::message::MessageFactory;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Factory for the sequence-numbered binding.
///
/// Outbound requests carry a non-zero sequence that advances by one per
/// request and wraps from 255 back to 1; zero is left for pushes, so at most
/// 255 requests (not 256) can be outstanding with distinct sequences. The first
/// value is random unless pinned in [`FrameConfig`], so a restarted host is
/// unlikely to reuse the sequence of a reply the device is still sending.
#[derive(Debug)]
pub struct SeqFactory {
    next_seq: u8,
    last_push: Option<u8>,
    remainder: BytesMut,
    config: FrameConfig,
}

impl SeqFactory {
    /// Create a factory with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a factory with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        let next_seq = match config.initial_sequence {
            Some(PUSH_SEQUENCE) => 1,
            Some(seq) => seq,
            None => rand::thread_rng().gen_range(1..=u8::MAX),
        };
        Self {
            next_seq,
            last_push: None,
            remainder: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Sequence the next encapsulated request will carry.
    pub fn next_sequence(&self) -> u8 {
        self.next_seq
    }

    /// Inbound sequence of the last accepted push, if any.
    pub fn last_push(&self) -> Option<u8> {
        self.last_push
    }

    /// Bytes buffered from an incomplete frame.
    pub fn pending_bytes(&self) -> usize {
        self.remainder.len()
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn advance(&mut self) {
        self.next_seq = match self.next_seq {
            u8::MAX => 1,
            seq => seq + 1,
        };
    }

    fn accept_frame(&self, raw: Bytes) -> Result<SeqFrame> {
        if raw.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: raw.len(),
                max: self.config.max_frame_size,
            });
        }
        parse_frame(raw)
    }
}

impl Default for SeqFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageFactory for SeqFactory {
    type Body = Bytes;
    type Message = SeqFrame;

    fn encapsulate(&mut self, body: Bytes) -> Result<SeqFrame> {
        let max = self.config.max_body_len();
        if body.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max,
            });
        }

        // Requests acknowledge the latest push the host has accepted.
        let frame = SeqFrame::new(self.next_seq, self.last_push.unwrap_or(0), &body)?;
        self.advance();
        trace!(seq = frame.outbound_seq(), size = body.len(), "encapsulated request");
        Ok(frame)
    }

    fn is_matched(&self, request: &SeqFrame, candidate: &SeqFrame) -> bool {
        !candidate.is_push_candidate() && request.outbound_seq() == candidate.outbound_seq()
    }

    fn is_push(&mut self, message: &SeqFrame) -> bool {
        if !message.is_push_candidate() {
            return false;
        }
        let seq = message.inbound_seq();
        let fresh = match self.last_push {
            None => true,
            Some(last) => seq == last.wrapping_add(1),
        };
        if fresh {
            self.last_push = Some(seq);
        } else {
            debug!(seq, last = ?self.last_push, "ignoring out-of-sequence push");
        }
        fresh
    }

    fn destructure(&mut self, bytes: &[u8]) -> Vec<SeqFrame> {
        self.remainder.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(total) = declared_frame_len(&self.remainder) {
            if self.remainder.len() < total {
                break;
            }
            let raw = self.remainder.split_to(total).freeze();
            match self.accept_frame(raw) {
                Ok(frame) => frames.push(frame),
                Err(err) => warn!(error = %err, size = total, "dropping malformed frame"),
            }
        }

        if !self.remainder.is_empty() {
            trace!(pending = self.remainder.len(), "holding partial frame");
        }
        frames
    }
}
