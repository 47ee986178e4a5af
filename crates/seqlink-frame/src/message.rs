use bytes::Bytes;

use crate::error::Result;

/// One on-wire unit: raw bytes plus the body the application cares about.
///
/// Messages are immutable once built; a factory produces them either by
/// encapsulating an outbound body or by reassembling inbound bytes.
pub trait Message: Clone + Send + Sync + 'static {
    /// Payload type carried by this message.
    type Body: Clone + Send + 'static;

    /// The full encoded frame, header included.
    fn bytes(&self) -> &Bytes;

    /// The payload carried by this frame.
    fn body(&self) -> Self::Body;
}

/// Framing and correlation policy for one connection.
///
/// A factory owns all per-connection sequence bookkeeping. The engine calls
/// it from a single serialization domain, so implementations need no
/// interior locking.
pub trait MessageFactory: Send + 'static {
    /// Payload type accepted by [`encapsulate`](Self::encapsulate).
    type Body: Clone + Send + 'static;

    /// Concrete message representation.
    type Message: Message<Body = Self::Body>;

    /// Frame an outbound body, assigning it the next outbound sequence.
    ///
    /// Must not mutate any state when it fails.
    fn encapsulate(&mut self, body: Self::Body) -> Result<Self::Message>;

    /// Whether `candidate` is the reply to `request`.
    fn is_matched(&self, request: &Self::Message, candidate: &Self::Message) -> bool;

    /// Whether an unmatched inbound message is a fresh push.
    ///
    /// Accepting a push updates the factory's push bookkeeping, so a
    /// repeated push is reported as `false` the second time.
    fn is_push(&mut self, message: &Self::Message) -> bool;

    /// Feed inbound bytes and return every message completed by them.
    ///
    /// Incomplete trailing bytes are kept for the next call. Malformed
    /// frames are dropped; this never fails.
    fn destructure(&mut self, bytes: &[u8]) -> Vec<Self::Message>;
}
