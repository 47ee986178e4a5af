//! Request/response correlation over a single device byte stream.
//!
//! A [`Transceiver`] lets many tasks issue requests concurrently over one
//! ordered duplex stream. Each reply is matched back to its request by the
//! [`MessageFactory`](seqlink_frame::MessageFactory), each request carries its
//! own deadline, and unsolicited frames from the device are delivered on a
//! separate [`PushStream`].

mod config;
mod error;
mod ledger;
mod push;
mod transceiver;

pub use config::{TransceiverConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{Result, TransceiverError};
pub use push::PushStream;
pub use transceiver::{Transceiver, TransceiverState};
