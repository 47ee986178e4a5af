//! End-to-end behavior of the transceiver against in-memory devices.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{sink, stream, StreamExt};
use seqlink_engine::{Transceiver, TransceiverConfig, TransceiverError, TransceiverState};
use seqlink_frame::{FrameConfig, FrameError, Message, SeqFactory, SeqFrame, MAX_BODY_LEN};
use seqlink_transport::ByteStream;
use tokio::sync::mpsc;

fn factory_from(seq: u8) -> SeqFactory {
    SeqFactory::with_config(FrameConfig {
        initial_sequence: Some(seq),
        ..FrameConfig::default()
    })
}

/// A device that writes back every byte it receives.
fn echo_device() -> ByteStream {
    let (host, device) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let (mut rx, mut tx) = tokio::io::split(device);
        let _ = tokio::io::copy(&mut rx, &mut tx).await;
    });
    ByteStream::from_io(host)
}

/// The device side of a scripted connection: feed chunks in, observe frames out.
struct Device {
    inbound: mpsc::UnboundedSender<io::Result<Bytes>>,
    written: mpsc::UnboundedReceiver<Bytes>,
}

impl Device {
    fn inject(&self, bytes: impl Into<Bytes>) {
        self.inbound
            .send(Ok(bytes.into()))
            .expect("reader should be running");
    }

    fn push(&self, inbound_seq: u8, body: &[u8]) {
        let frame = SeqFrame::new(0, inbound_seq, body).unwrap();
        self.inject(frame.bytes().clone());
    }

    async fn next_written(&mut self) -> Bytes {
        self.written.recv().await.expect("writer should be running")
    }
}

fn scripted() -> (ByteStream, Device) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<io::Result<Bytes>>();
    let (written_tx, written_rx) = mpsc::unbounded_channel::<Bytes>();

    let inbound = stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    let outbound = sink::unfold(written_tx, |tx, frame: Bytes| async move {
        tx.send(frame)
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok::<_, io::Error>(tx)
    });

    let device = Device {
        inbound: inbound_tx,
        written: written_rx,
    };
    (ByteStream::new(inbound, outbound), device)
}

#[tokio::test]
async fn round_trip_against_echo_device() {
    let transceiver = Transceiver::new(SeqFactory::new(), echo_device());
    let _pushes = transceiver.listen();

    let body = Bytes::from(vec![0u8; 16]);
    let reply = transceiver.send(body.clone()).await.unwrap();
    assert_eq!(reply, body);
    assert_eq!(transceiver.outstanding(), 0);
}

#[tokio::test]
async fn round_trip_max_body() {
    let transceiver = Transceiver::new(SeqFactory::new(), echo_device());
    let _pushes = transceiver.listen();

    let body = Bytes::from(vec![0xA5; MAX_BODY_LEN]);
    assert_eq!(transceiver.send(body.clone()).await.unwrap(), body);
}

#[tokio::test]
async fn two_concurrent_requests_get_their_own_replies() {
    let transceiver = Transceiver::new(SeqFactory::new(), echo_device());
    let _pushes = transceiver.listen();

    let (a, b) = tokio::join!(
        transceiver.send(Bytes::from_static(&[0x01])),
        transceiver.send(Bytes::from_static(&[0x02])),
    );
    assert_eq!(a.unwrap().as_ref(), &[0x01]);
    assert_eq!(b.unwrap().as_ref(), &[0x02]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_has_no_cross_delivery() {
    let transceiver = Transceiver::new(SeqFactory::new(), echo_device());
    let _pushes = transceiver.listen();

    let mut tasks = Vec::new();
    for marker in 0u8..32 {
        let transceiver = transceiver.clone();
        tasks.push(tokio::spawn(async move {
            let body = Bytes::from(vec![marker; 1 + marker as usize]);
            let reply = transceiver.send(body.clone()).await;
            (body, reply)
        }));
    }

    for task in tasks {
        let (body, reply) = task.await.unwrap();
        assert_eq!(reply.unwrap(), body);
    }
    assert_eq!(transceiver.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out_and_clears_ledger() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let _pushes = transceiver.listen();

    let started = tokio::time::Instant::now();
    let err = transceiver
        .send_with_timeout(Bytes::from_static(b"anyone?"), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert_eq!(err, TransceiverError::RequestTimeout(Duration::from_secs(1)));
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(transceiver.outstanding(), 0);
    assert!(!device.next_written().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_applies_to_send() {
    let (stream, _device) = scripted();
    let config = TransceiverConfig {
        request_timeout: Duration::from_millis(300),
    };
    let transceiver = Transceiver::with_config(SeqFactory::new(), stream, config);
    let _pushes = transceiver.listen();

    let err = transceiver.send(Bytes::from_static(b"x")).await.unwrap_err();
    assert_eq!(
        err,
        TransceiverError::RequestTimeout(Duration::from_millis(300))
    );
}

#[tokio::test(start_paused = true)]
async fn late_reply_after_timeout_is_ignored() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(40), stream);
    let mut pushes = transceiver.listen();

    let err = transceiver
        .send_with_timeout(Bytes::from_static(b"slow"), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, TransceiverError::RequestTimeout(_)));

    let late = device.next_written().await;
    device.inject(late);

    device.push(1, b"after");
    assert_eq!(pushes.next().await.unwrap().as_ref(), b"after");
    assert_eq!(transceiver.outstanding(), 0);
}

#[tokio::test]
async fn push_is_delivered_once_and_duplicates_are_dropped() {
    let (stream, device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let mut pushes = transceiver.listen();

    device.push(0x55, b"first");
    device.push(0x55, b"first");
    device.push(0x56, b"second");

    assert_eq!(pushes.next().await.unwrap().as_ref(), b"first");
    assert_eq!(pushes.next().await.unwrap().as_ref(), b"second");

    drop(device);
    assert!(pushes.next().await.is_none());
}

#[tokio::test]
async fn push_does_not_disturb_outstanding_request() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(12), stream);
    let mut pushes = transceiver.listen();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"req")).await })
    };
    let request = device.next_written().await;
    assert_eq!(request[0], 12);

    device.push(3, b"event");
    assert_eq!(pushes.next().await.unwrap().as_ref(), b"event");
    assert_eq!(transceiver.outstanding(), 1);

    device.inject(SeqFrame::new(12, 0, b"resp").unwrap().bytes().clone());
    assert_eq!(pending.await.unwrap().unwrap().as_ref(), b"resp");
}

#[tokio::test]
async fn request_acknowledges_last_push() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(5), stream);
    let mut pushes = transceiver.listen();

    device.push(0x30, b"hello");
    pushes.next().await.unwrap();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"ack")).await })
    };
    let request = device.next_written().await;
    assert_eq!(&request[..4], &[5, 0x30, 0, 3]);

    device.inject(request);
    assert!(pending.await.unwrap().is_ok());
}

#[tokio::test]
async fn stream_end_fails_pending_request_with_disconnected() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let _pushes = transceiver.listen();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move {
            transceiver
                .send_with_timeout(Bytes::from_static(b"lost"), Duration::from_secs(30))
                .await
        })
    };
    device.next_written().await;
    drop(device.inbound);

    assert_eq!(
        pending.await.unwrap(),
        Err(TransceiverError::Disconnected)
    );
    assert_eq!(transceiver.state(), TransceiverState::Disconnected);
    assert_eq!(transceiver.outstanding(), 0);
}

#[tokio::test]
async fn send_after_disconnect_writes_nothing() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let mut pushes = transceiver.listen();

    drop(device.inbound);
    assert!(pushes.next().await.is_none());

    let err = transceiver
        .send(Bytes::from_static(b"too late"))
        .await
        .unwrap_err();
    assert_eq!(err, TransceiverError::Disconnected);
    assert_eq!(transceiver.outstanding(), 0);
    assert!(device.written.recv().await.is_none());
}

#[tokio::test]
async fn stream_error_is_a_disconnect() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let _pushes = transceiver.listen();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"q")).await })
    };
    device.next_written().await;
    device
        .inbound
        .send(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
        .unwrap();

    assert_eq!(
        pending.await.unwrap(),
        Err(TransceiverError::Disconnected)
    );
    assert_eq!(transceiver.state(), TransceiverState::Disconnected);
}

#[tokio::test]
async fn write_failure_is_a_disconnect() {
    let (stream, device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let mut pushes = transceiver.listen();

    let Device { inbound, written } = device;
    drop(written);

    let err = transceiver
        .send_with_timeout(Bytes::from_static(b"q"), Duration::from_secs(30))
        .await
        .unwrap_err();
    assert_eq!(err, TransceiverError::Disconnected);
    assert!(pushes.next().await.is_none());
    drop(inbound);
}

#[tokio::test]
async fn sequence_wraps_past_255_and_still_matches() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(250), stream);
    let _pushes = transceiver.listen();

    let echo = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..10 {
            let frame = device.next_written().await;
            seen.push(frame[0]);
            device.inject(frame);
        }
        seen
    });

    for i in 0u8..10 {
        let body = Bytes::from(vec![i; 4]);
        assert_eq!(transceiver.send(body.clone()).await.unwrap(), body);
    }

    let seen = echo.await.unwrap();
    assert_eq!(seen, vec![250, 251, 252, 253, 254, 255, 1, 2, 3, 4]);
}

#[tokio::test]
async fn oversize_body_is_rejected_without_writing() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(7), stream);
    let _pushes = transceiver.listen();

    let err = transceiver
        .send(Bytes::from(vec![0u8; MAX_BODY_LEN + 1]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransceiverError::InvalidRequest(FrameError::PayloadTooLarge {
            size: MAX_BODY_LEN + 1,
            max: MAX_BODY_LEN,
        })
    );
    assert_eq!(transceiver.outstanding(), 0);
    assert!(device.written.try_recv().is_err());

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"ok")).await })
    };
    let frame = device.next_written().await;
    assert_eq!(frame[0], 7);
    device.inject(frame);
    assert!(pending.await.unwrap().is_ok());
}

#[tokio::test]
async fn reply_split_across_chunks_is_reassembled() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(20), stream);
    let _pushes = transceiver.listen();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"split")).await })
    };
    device.next_written().await;

    let reply = SeqFrame::new(20, 0, b"reassembled").unwrap();
    let raw = reply.bytes().clone();
    device.inject(raw.slice(..2));
    device.inject(raw.slice(2..7));
    device.inject(raw.slice(7..));

    assert_eq!(pending.await.unwrap().unwrap().as_ref(), b"reassembled");
}

#[tokio::test]
async fn out_of_order_replies_in_one_chunk() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(100), stream);
    let _pushes = transceiver.listen();

    let first = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"a")).await })
    };
    assert_eq!(device.next_written().await[0], 100);
    let second = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"b")).await })
    };
    assert_eq!(device.next_written().await[0], 101);

    let mut chunk = Vec::new();
    chunk.extend_from_slice(SeqFrame::new(101, 0, b"B").unwrap().bytes());
    chunk.extend_from_slice(SeqFrame::new(100, 0, b"A").unwrap().bytes());
    device.inject(chunk);

    assert_eq!(first.await.unwrap().unwrap().as_ref(), b"A");
    assert_eq!(second.await.unwrap().unwrap().as_ref(), b"B");
}

#[tokio::test]
async fn unmatched_and_malformed_frames_are_dropped() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(60), stream);
    let mut pushes = transceiver.listen();

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"real")).await })
    };
    device.next_written().await;

    device.inject(SeqFrame::new(61, 0, b"stray").unwrap().bytes().clone());
    device.inject(Bytes::from_static(&[60, 0, 0xFF, 1, b'x']));
    device.inject(SeqFrame::new(60, 0, b"answer").unwrap().bytes().clone());

    assert_eq!(pending.await.unwrap().unwrap().as_ref(), b"answer");

    device.push(9, b"still alive");
    assert_eq!(pushes.next().await.unwrap().as_ref(), b"still alive");
}

#[tokio::test]
async fn second_listen_supersedes_first_subscription() {
    let (stream, device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);

    let mut first = transceiver.listen();
    let mut second = transceiver.listen();
    assert!(first.next().await.is_none());

    device.push(1, b"for second");
    assert_eq!(second.next().await.unwrap().as_ref(), b"for second");
    assert_eq!(transceiver.state(), TransceiverState::Listening);
}

#[tokio::test]
async fn push_without_subscriber_is_dropped_not_queued() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(factory_from(33), stream);
    drop(transceiver.listen());

    device.push(1, b"nobody listening");

    let pending = {
        let transceiver = transceiver.clone();
        tokio::spawn(async move { transceiver.send(Bytes::from_static(b"hi")).await })
    };
    let frame = device.next_written().await;
    device.inject(frame);
    assert_eq!(pending.await.unwrap().unwrap().as_ref(), b"hi");

    let mut pushes = transceiver.listen();
    device.push(2, b"after resubscribe");
    assert_eq!(pushes.next().await.unwrap().as_ref(), b"after resubscribe");
}

#[tokio::test]
async fn dropping_last_handle_stops_background_tasks() {
    let (stream, mut device) = scripted();
    let transceiver = Transceiver::new(SeqFactory::new(), stream);
    let _pushes = transceiver.listen();
    assert!(transceiver.is_listening());

    drop(transceiver);
    assert!(device.written.recv().await.is_none());
}
