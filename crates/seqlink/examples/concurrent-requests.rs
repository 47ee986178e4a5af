//! Issue many requests at once over a single stream and pair up the replies.
//!
//! Run with:
//!   cargo run --example concurrent-requests
//!
//! The "device" is an in-memory duplex pipe that echoes bytes back, so no
//! hardware is needed.

use std::time::Duration;

use bytes::Bytes;
use seqlink::engine::{Transceiver, TransceiverConfig};
use seqlink::frame::SeqFactory;
use seqlink::transport::ByteStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, device) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let (mut rx, mut tx) = tokio::io::split(device);
        let _ = tokio::io::copy(&mut rx, &mut tx).await;
    });

    let config = TransceiverConfig {
        request_timeout: Duration::from_millis(500),
    };
    let transceiver =
        Transceiver::with_config(SeqFactory::new(), ByteStream::from_io(host), config);
    let _pushes = transceiver.listen();

    let mut tasks = Vec::new();
    for marker in 1u8..=8 {
        let transceiver = transceiver.clone();
        tasks.push(tokio::spawn(async move {
            transceiver.send(Bytes::from(vec![marker; 4])).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let reply = task.await??;
        eprintln!("request {} -> {:02x?}", i + 1, reply.as_ref());
    }

    eprintln!("outstanding after all replies: {}", transceiver.outstanding());
    Ok(())
}
