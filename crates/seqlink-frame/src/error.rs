/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The body does not fit in a single frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An inbound frame exceeds the configured maximum frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Fewer bytes than the header or the declared body length.
    #[error("truncated frame ({available} bytes, need {needed})")]
    Truncated { available: usize, needed: usize },

    /// The reserved header byte must be zero.
    #[error("reserved header byte is {0:#04x} (expected 0x00)")]
    ReservedByte(u8),

    /// The declared body length is outside the binding's range.
    #[error("declared body length {len} exceeds {max}")]
    InvalidLength { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
