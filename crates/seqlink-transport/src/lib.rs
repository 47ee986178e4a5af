//! Duplex byte-stream abstraction.
//!
//! The engine never talks to sockets or serial ports directly. It consumes a
//! [`ByteStream`]: an ordered stream of inbound byte chunks that terminates
//! (or errors) when the device goes away, paired with a sink that accepts
//! outbound byte chunks.
//!
//! This is the lowest layer of seqlink. Producing the stream for a specific
//! peripheral is the caller's job; [`ByteStream::from_io`] and the
//! [`endpoint`] helpers cover the common tokio I/O cases.

pub mod endpoint;
pub mod error;
pub mod stream;

pub use endpoint::{connect_tcp, connect_unix, Acceptor, Endpoint};
pub use error::{Result, TransportError};
pub use stream::{ByteStream, Inbound, Outbound};
