//! Minimal loopback device: accepts one host over TCP and echoes every frame.
//!
//! Run with:
//!   cargo run --example loopback-device
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7410 --data hello

use futures_util::{SinkExt, StreamExt};
use seqlink::frame::{Message, MessageFactory, SeqFactory};
use seqlink::transport::{Acceptor, Endpoint};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = "127.0.0.1:7410".parse()?;
    let acceptor = Acceptor::bind(&endpoint).await?;
    eprintln!("Listening on {endpoint}");

    let stream = acceptor.accept().await?;
    eprintln!("Host connected over {}", stream.kind());

    let (mut inbound, mut outbound) = stream.into_parts();
    let mut factory = SeqFactory::new();
    while let Some(chunk) = inbound.next().await {
        for frame in factory.destructure(&chunk?) {
            eprintln!(
                "Echoing {} byte body (seq {})",
                frame.body().len(),
                frame.outbound_seq()
            );
            outbound.send(frame.bytes().clone()).await?;
        }
    }

    eprintln!("Host disconnected");
    Ok(())
}
