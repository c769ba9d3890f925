//! Internal stress tests for concurrent subscriptions and fan-out.
//!
//! A fake server acknowledges every (un)subscribe request and pushes
//! messages on demand through a control channel.

use std::collections::HashSet;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::core::builder::SubscriptionBuilder;
use crate::core::connection::Connection;
use crate::proto::frame::Frame;

fn bulk(value: impl Into<Bytes>) -> Frame {
    Frame::BulkString(Some(value.into()))
}

/// Spawns a single-connection server; returns its address and a sender
/// whose `(channel, payload)` pairs are pushed as `message` frames.
async fn fake_server() -> (String, mpsc::UnboundedSender<(Bytes, Bytes)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("redis://{}", listener.local_addr().unwrap());
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<(Bytes, Bytes)>();

    tokio::spawn(async move {
        let (socket, _) = match listener.accept().await {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut conn = Connection::new(socket);
        let mut subscribed: HashSet<Bytes> = HashSet::new();

        loop {
            tokio::select! {
                frame = conn.read_frame() => {
                    let Ok(Frame::Array(args)) = frame else { return };
                    let Some(kind) = args.first().and_then(Frame::as_bytes) else { return };
                    let kind = kind.to_ascii_lowercase();
                    for target in args.iter().skip(1).filter_map(Frame::as_bytes) {
                        if kind.ends_with(b"unsubscribe") {
                            subscribed.remove(&target);
                        } else {
                            subscribed.insert(target.clone());
                        }
                        let ack = Frame::Array(vec![
                            bulk(kind.clone()),
                            bulk(target),
                            Frame::Integer(subscribed.len() as i64),
                        ]);
                        if conn.write_frame(&ack).await.is_err() {
                            return;
                        }
                    }
                }
                Some((channel, payload)) = push_rx.recv() => {
                    let push = Frame::Array(vec![bulk("message"), bulk(channel), bulk(payload)]);
                    if conn.write_frame(&push).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    (addr, push_tx)
}

#[tokio::test]
async fn test_concurrent_subscribes() {
    let (addr, _push) = fake_server().await;
    let subscription = SubscriptionBuilder::new()
        .address(addr)
        .queue_size(64)
        .build()
        .await
        .expect("Failed to connect");

    let mut handles = Vec::new();
    for i in 0..500 {
        let subscription = subscription.clone();
        handles.push(tokio::spawn(async move {
            let channel = Bytes::from(format!("channel-{i}"));
            subscription.subscribe(&[channel]).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(subscription.channels().len(), 500);

    subscription.cancel().await.unwrap();
    assert!(subscription.channels().is_empty());
}

#[tokio::test]
async fn test_fan_out_to_many_consumers() {
    const CONSUMERS: usize = 50;
    const MESSAGES: usize = 200;

    let (addr, push) = fake_server().await;
    let subscription = SubscriptionBuilder::new()
        .address(addr)
        .build()
        .await
        .expect("Failed to connect");
    subscription.subscribe(&[Bytes::from("feed")]).await.unwrap();

    let (ready_tx, mut ready_rx) = mpsc::channel(CONSUMERS);
    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
        let mut messages = subscription.receive();
        let ready = ready_tx.clone();
        consumers.push(tokio::spawn(async move {
            // The first poll attaches; signal once it is pending.
            assert!(futures::poll!(messages.next()).is_pending());
            ready.send(()).await.unwrap();

            let mut payloads = Vec::with_capacity(MESSAGES);
            while payloads.len() < MESSAGES {
                let message = messages.next().await.unwrap().unwrap();
                payloads.push(message.payload().clone());
            }
            payloads
        }));
    }
    for _ in 0..CONSUMERS {
        ready_rx.recv().await.unwrap();
    }
    assert_eq!(subscription.consumer_count(), CONSUMERS);

    for i in 0..MESSAGES {
        push.send((Bytes::from("feed"), Bytes::from(i.to_string())))
            .unwrap();
    }

    let expected: Vec<Bytes> = (0..MESSAGES).map(|i| Bytes::from(i.to_string())).collect();
    for consumer in consumers {
        assert_eq!(consumer.await.unwrap(), expected);
    }
}
