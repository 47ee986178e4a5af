use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::{Sink, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};

/// Inbound half: byte chunks in arrival order. `None` is end-of-stream.
pub type Inbound = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Outbound half: accepts encoded frames for the device.
pub type Outbound = Pin<Box<dyn Sink<Bytes, Error = io::Error> + Send>>;

/// A connected duplex byte stream to one peripheral.
///
/// Chunk boundaries carry no meaning: a frame may be split across chunks or
/// several frames may arrive in one.
pub struct ByteStream {
    inbound: Inbound,
    outbound: Outbound,
    kind: &'static str,
}

impl ByteStream {
    /// Build a stream from an arbitrary chunk stream and byte sink.
    pub fn new<R, W>(inbound: R, outbound: W) -> Self
    where
        R: Stream<Item = io::Result<Bytes>> + Send + 'static,
        W: Sink<Bytes, Error = io::Error> + Send + 'static,
    {
        Self {
            inbound: Box::pin(inbound),
            outbound: Box::pin(outbound),
            kind: "custom",
        }
    }

    /// Adapt any tokio I/O object (TCP, Unix socket, serial port, in-memory
    /// duplex) into a byte stream.
    pub fn from_io<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        let inbound = FramedRead::new(reader, BytesCodec::new())
            .map(|chunk| chunk.map(BytesMut::freeze));
        let outbound = FramedWrite::new(writer, BytesCodec::new());
        Self::new(inbound, outbound).with_kind("io")
    }

    /// Tag the stream with a short transport label used in logs.
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    /// Transport label (`"tcp"`, `"unix"`, `"io"`, `"custom"`).
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Split into the inbound chunk stream and the outbound sink.
    pub fn into_parts(self) -> (Inbound, Outbound) {
        (self.inbound, self.outbound)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("type", &self.kind)
            .finish()
    }
}
