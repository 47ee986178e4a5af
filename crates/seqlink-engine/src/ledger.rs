use std::time::Duration;

use seqlink_frame::Message;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{Result, TransceiverError};

/// One-shot result slot handed back to the waiting caller.
pub(crate) type Slot<B> = oneshot::Sender<Result<B>>;

/// A request waiting for its reply.
///
/// Every way out of the ledger consumes the entry, so a slot can only ever be
/// resolved once.
pub(crate) struct Outstanding<M: Message> {
    id: u64,
    request: M,
    slot: Slot<M::Body>,
    timer: AbortHandle,
}

impl<M: Message> Outstanding<M> {
    pub(crate) fn new(id: u64, request: M, slot: Slot<M::Body>, timer: AbortHandle) -> Self {
        Self {
            id,
            request,
            slot,
            timer,
        }
    }

    /// Resolve with the reply body and stop the timer.
    pub(crate) fn complete(self, body: M::Body) {
        self.timer.abort();
        let _ = self.slot.send(Ok(body));
    }

    /// Resolve with a failure and stop the timer.
    pub(crate) fn fail(self, err: TransceiverError) {
        self.timer.abort();
        let _ = self.slot.send(Err(err));
    }

    /// Resolve from inside the timer task itself.
    pub(crate) fn expire(self, timeout: Duration) {
        let _ = self.slot.send(Err(TransceiverError::RequestTimeout(timeout)));
    }
}

/// Outstanding requests in registration order.
pub(crate) struct Ledger<M: Message> {
    entries: Vec<Outstanding<M>>,
    next_id: u64,
}

impl<M: Message> Ledger<M> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Reserve an id for the next entry.
    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub(crate) fn insert(&mut self, entry: Outstanding<M>) {
        self.entries.push(entry);
    }

    /// Remove the first entry, in registration order, whose request satisfies `matches`.
    pub(crate) fn take_matching(
        &mut self,
        mut matches: impl FnMut(&M) -> bool,
    ) -> Option<Outstanding<M>> {
        let pos = self.entries.iter().position(|e| matches(&e.request))?;
        Some(self.entries.remove(pos))
    }

    /// Remove the entry registered under `id`, if it is still outstanding.
    pub(crate) fn take(&mut self, id: u64) -> Option<Outstanding<M>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn drain(&mut self) -> Vec<Outstanding<M>> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
