use std::time::Duration;

use seqlink_frame::FrameError;

/// Failure outcomes of a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransceiverError {
    /// The factory could not frame the outbound body.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] FrameError),

    /// No device stream is attached, or it ended while the request was pending.
    #[error("device disconnected")]
    Disconnected,

    /// No matching reply arrived before the deadline.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, TransceiverError>;
