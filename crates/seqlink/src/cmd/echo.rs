use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use seqlink_frame::{Message, MessageFactory, SeqFactory, SeqFrame, PUSH_SEQUENCE};
use seqlink_transport::{Acceptor, ByteStream};
use tokio::time::{Interval, MissedTickBehavior};

use crate::cmd::{parse_duration, EchoArgs};
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};

pub async fn run(args: EchoArgs) -> CliResult<i32> {
    let push_interval = args
        .push_interval
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let acceptor = Acceptor::bind(&args.endpoint)
        .await
        .map_err(|err| transport_error("bind failed", err))?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                return Ok(SUCCESS);
            }
            accepted = acceptor.accept() => {
                let stream = accepted.map_err(|err| transport_error("accept failed", err))?;
                tracing::info!(transport = stream.kind(), "device session started");
                tokio::spawn(async move {
                    match serve(stream, push_interval).await {
                        Ok(echoed) => tracing::info!(echoed, "device session ended"),
                        Err(err) => tracing::warn!(error = %err, "device session failed"),
                    }
                });
            }
        }
    }
}

/// Echo every complete frame back unchanged, optionally emitting pushes.
///
/// Returns the number of frames echoed once the host closes the stream.
async fn serve(stream: ByteStream, push_interval: Option<Duration>) -> io::Result<usize> {
    let (mut inbound, mut outbound) = stream.into_parts();
    let mut reassembly = SeqFactory::new();
    let mut ticker = push_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut push_seq = PUSH_SEQUENCE;
    let mut echoed = 0usize;

    loop {
        tokio::select! {
            chunk = inbound.next() => {
                let Some(chunk) = chunk else {
                    return Ok(echoed);
                };
                for frame in reassembly.destructure(&chunk?) {
                    tracing::debug!(
                        seq = frame.outbound_seq(),
                        size = frame.wire_size(),
                        "echoing frame"
                    );
                    outbound.send(frame.bytes().clone()).await?;
                    echoed += 1;
                }
            }
            _ = next_tick(&mut ticker) => {
                push_seq = push_seq.wrapping_add(1);
                let body = format!("tick {push_seq}");
                let frame = SeqFrame::new(PUSH_SEQUENCE, push_seq, body.as_bytes())
                    .map_err(io::Error::other)?;
                tracing::debug!(seq = push_seq, "emitting push");
                outbound.send(frame.bytes().clone()).await?;
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
