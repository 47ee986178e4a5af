//! Sequence-numbered request/response framing for byte-stream peripherals.
//!
//! seqlink lets an application treat a peripheral that only offers a raw,
//! ordered, duplex byte stream as a concurrent request/response service with
//! per-request timeouts and a separate feed of unsolicited pushes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Duplex byte-stream abstraction and TCP/Unix helpers
//! - [`frame`]: Message contracts and the sequence-numbered binding
//! - [`engine`]: The [`Transceiver`](engine::Transceiver) correlation engine

/// Re-export transport types.
pub mod transport {
    pub use seqlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use seqlink_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use seqlink_engine::*;
}
