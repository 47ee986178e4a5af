use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

/// Bodies pushed by the device without a matching request.
///
/// Returned by [`Transceiver::listen`](crate::Transceiver::listen). The
/// stream ends when the device disconnects or a later `listen()` call takes
/// over the subscription. Dropping it unsubscribes; pushes that arrive with
/// no subscriber are discarded.
#[derive(Debug)]
pub struct PushStream<B> {
    rx: mpsc::UnboundedReceiver<B>,
}

impl<B> PushStream<B> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<B>) -> Self {
        Self { rx }
    }

    /// Wait for the next push. `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<B> {
        self.rx.recv().await
    }

    /// Stop receiving; already queued pushes can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<B> Stream for PushStream<B> {
    type Item = B;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<B>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
