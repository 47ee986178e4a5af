use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use seqlink_frame::{Message, MessageFactory};
use seqlink_transport::{ByteStream, Inbound, Outbound};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::config::TransceiverConfig;
use crate::error::{Result, TransceiverError};
use crate::ledger::{Ledger, Outstanding};
use crate::push::PushStream;

/// Lifecycle of a transceiver. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransceiverState {
    /// Constructed; the stream is attached but not yet read.
    Idle,
    /// Reader and writer tasks are running.
    Listening,
    /// The stream ended or failed. Every later request fails immediately.
    Disconnected,
}

struct Shared<F: MessageFactory> {
    factory: F,
    ledger: Ledger<F::Message>,
    state: TransceiverState,
    stream: Option<ByteStream>,
    writer: Option<mpsc::UnboundedSender<Bytes>>,
    push: Option<mpsc::UnboundedSender<F::Body>>,
    tasks: Vec<AbortHandle>,
}

impl<F: MessageFactory> Shared<F> {
    fn deliver_push(&mut self, body: F::Body) {
        let Some(push) = &self.push else {
            trace!("push discarded, no subscriber");
            return;
        };
        if push.send(body).is_err() {
            debug!("push subscriber dropped");
            self.push = None;
        }
    }
}

struct Inner<F: MessageFactory> {
    shared: Mutex<Shared<F>>,
    config: TransceiverConfig,
}

impl<F: MessageFactory> Inner<F> {
    fn lock(&self) -> MutexGuard<'_, Shared<F>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one inbound chunk: replies to their requests, fresh pushes to the
    /// subscriber, everything else is dropped.
    fn dispatch(&self, chunk: &[u8]) {
        let mut guard = self.lock();
        let shared = &mut *guard;

        for message in shared.factory.destructure(chunk) {
            let entry = shared
                .ledger
                .take_matching(|request| shared.factory.is_matched(request, &message));
            if let Some(entry) = entry {
                debug!(
                    size = message.bytes().len(),
                    outstanding = shared.ledger.len(),
                    "reply matched"
                );
                entry.complete(message.body());
            } else if shared.factory.is_push(&message) {
                debug!(size = message.bytes().len(), "push received");
                shared.deliver_push(message.body());
            } else {
                trace!(size = message.bytes().len(), "unmatched frame dropped");
            }
        }
    }

    /// Enter the terminal state. Idempotent.
    fn disconnect(&self, reason: &'static str) {
        let pending = {
            let mut shared = self.lock();
            if shared.state == TransceiverState::Disconnected {
                return;
            }
            shared.state = TransceiverState::Disconnected;
            shared.stream = None;
            shared.writer = None;
            shared.push = None;
            for task in shared.tasks.drain(..) {
                task.abort();
            }
            shared.ledger.drain()
        };

        info!(reason, failed = pending.len(), "device disconnected");
        for entry in pending {
            entry.fail(TransceiverError::Disconnected);
        }
    }

    /// Remove and time out the entry `id`, unless a reply or disconnect
    /// already took it.
    fn expire(&self, id: u64, timeout: Duration) {
        let entry = self.lock().ledger.take(id);
        if let Some(entry) = entry {
            debug!(id, ?timeout, "request timed out");
            entry.expire(timeout);
        }
    }
}

impl<F: MessageFactory> Drop for Inner<F> {
    fn drop(&mut self) {
        let shared = self
            .shared
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for task in shared.tasks.drain(..) {
            task.abort();
        }
        for entry in shared.ledger.drain() {
            entry.fail(TransceiverError::Disconnected);
        }
    }
}

/// Correlates requests and replies over one device byte stream.
///
/// Handles are cheap to clone and may be used from many tasks at once; all
/// clones drive the same connection. Dropping the last handle stops the
/// background tasks and fails anything still outstanding.
///
/// ```no_run
/// # async fn run(stream: seqlink_transport::ByteStream) -> seqlink_engine::Result<()> {
/// use bytes::Bytes;
/// use seqlink_engine::Transceiver;
/// use seqlink_frame::SeqFactory;
///
/// let transceiver = Transceiver::new(SeqFactory::new(), stream);
/// let _pushes = transceiver.listen();
/// let reply = transceiver.send(Bytes::from_static(b"ping")).await?;
/// # let _ = reply;
/// # Ok(())
/// # }
/// ```
pub struct Transceiver<F: MessageFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: MessageFactory> Clone for Transceiver<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: MessageFactory> fmt::Debug for Transceiver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("Transceiver")
            .field("state", &shared.state)
            .field("outstanding", &shared.ledger.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<F: MessageFactory> Transceiver<F> {
    /// Wrap a stream with the default configuration. Nothing is read until
    /// [`listen`](Self::listen) is called.
    pub fn new(factory: F, stream: ByteStream) -> Self {
        Self::with_config(factory, stream, TransceiverConfig::default())
    }

    /// Wrap a stream with an explicit configuration.
    pub fn with_config(factory: F, stream: ByteStream, config: TransceiverConfig) -> Self {
        let shared = Shared {
            factory,
            ledger: Ledger::new(),
            state: TransceiverState::Idle,
            stream: Some(stream),
            writer: None,
            push: None,
            tasks: Vec::new(),
        };
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(shared),
                config,
            }),
        }
    }

    /// Start reading the stream and subscribe to pushes.
    ///
    /// The first call spawns the reader and writer tasks, so it must run
    /// inside a Tokio runtime. A later call replaces the subscription: the
    /// previous [`PushStream`] ends and the returned one receives from then
    /// on. After disconnect the returned stream is already finished.
    pub fn listen(&self) -> PushStream<F::Body> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.inner.lock();

        match shared.state {
            TransceiverState::Disconnected => {}
            TransceiverState::Listening => {
                debug!("push subscription replaced");
                shared.push = Some(tx);
            }
            TransceiverState::Idle => {
                let Some(stream) = shared.stream.take() else {
                    shared.state = TransceiverState::Disconnected;
                    return PushStream::new(rx);
                };
                let kind = stream.kind();
                let (inbound, outbound) = stream.into_parts();
                let (write_tx, write_rx) = mpsc::unbounded_channel();

                let reader = tokio::spawn(read_loop(Arc::downgrade(&self.inner), inbound));
                let writer = tokio::spawn(write_loop(
                    Arc::downgrade(&self.inner),
                    outbound,
                    write_rx,
                ));
                shared.tasks.push(reader.abort_handle());
                shared.tasks.push(writer.abort_handle());

                shared.writer = Some(write_tx);
                shared.push = Some(tx);
                shared.state = TransceiverState::Listening;
                info!(transport = kind, "listening");
            }
        }

        PushStream::new(rx)
    }

    /// Send `body` and wait for its reply using the configured timeout.
    pub async fn send(&self, body: F::Body) -> Result<F::Body> {
        self.send_with_timeout(body, self.inner.config.request_timeout)
            .await
    }

    /// Send `body` and wait at most `timeout` for its reply.
    ///
    /// # Errors
    ///
    /// - [`TransceiverError::InvalidRequest`] if the body cannot be framed.
    ///   Nothing is written.
    /// - [`TransceiverError::Disconnected`] if the engine is not listening,
    ///   or the stream ends before the reply arrives.
    /// - [`TransceiverError::RequestTimeout`] if no reply matched in time.
    pub async fn send_with_timeout(&self, body: F::Body, timeout: Duration) -> Result<F::Body> {
        let slot = self.submit(body, timeout)?;
        slot.await.unwrap_or(Err(TransceiverError::Disconnected))
    }

    fn submit(
        &self,
        body: F::Body,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Result<F::Body>>> {
        let mut guard = self.inner.lock();
        let shared = &mut *guard;

        let request = shared.factory.encapsulate(body)?;
        let Some(writer) = &shared.writer else {
            return Err(TransceiverError::Disconnected);
        };
        if writer.send(request.bytes().clone()).is_err() {
            return Err(TransceiverError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        let id = shared.ledger.next_id();
        let timer = tokio::spawn(expire_after(Arc::downgrade(&self.inner), id, timeout));
        debug!(
            id,
            size = request.bytes().len(),
            outstanding = shared.ledger.len() + 1,
            "request queued"
        );
        shared
            .ledger
            .insert(Outstanding::new(id, request, tx, timer.abort_handle()));
        Ok(rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransceiverState {
        self.inner.lock().state
    }

    /// Whether the reader and writer tasks are running.
    pub fn is_listening(&self) -> bool {
        self.state() == TransceiverState::Listening
    }

    /// Number of requests waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().ledger.len()
    }

    /// Configuration this transceiver was built with.
    pub fn config(&self) -> &TransceiverConfig {
        &self.inner.config
    }
}

async fn read_loop<F: MessageFactory>(inner: Weak<Inner<F>>, mut inbound: Inbound) {
    let reason = loop {
        match inbound.next().await {
            Some(Ok(chunk)) => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                trace!(size = chunk.len(), "chunk received");
                inner.dispatch(&chunk);
            }
            Some(Err(err)) => {
                warn!(error = %err, "device stream read failed");
                break "read error";
            }
            None => break "end of stream",
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.disconnect(reason);
    }
}

async fn write_loop<F: MessageFactory>(
    inner: Weak<Inner<F>>,
    mut outbound: Outbound,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = queue.recv().await {
        let size = frame.len();
        if let Err(err) = outbound.send(frame).await {
            warn!(error = %err, size, "device stream write failed");
            if let Some(inner) = inner.upgrade() {
                inner.disconnect("write error");
            }
            return;
        }
        trace!(size, "frame written");
    }
    let _ = outbound.close().await;
}

async fn expire_after<F: MessageFactory>(inner: Weak<Inner<F>>, id: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(inner) = inner.upgrade() {
        inner.expire(id, timeout);
    }
}
