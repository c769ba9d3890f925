//! Pub/sub round-trips against a live server.
//!
//! Requirements:
//! - Redis running on localhost:6379
//!
//! Run with:
//! ```bash
//! cargo test --test pubsub_integration -- --ignored
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures::{poll, StreamExt};
use submux::core::command;
use submux::core::connection::Connection;
use submux::proto::frame::Frame;
use submux::{ReceiveError, SubscriptionBuilder};
use tokio::net::TcpStream;

const ADDRESS: &str = "redis://127.0.0.1:6379";

/// Publishes over a separate plain connection; returns the receiver count.
async fn publish(channel: &str, payload: &str) -> i64 {
    let stream = TcpStream::connect("127.0.0.1:6379")
        .await
        .expect("Failed to connect");
    let mut conn = Connection::new(stream);
    conn.write_frame(&command::publish(channel.to_string(), payload.to_string()).into_frame())
        .await
        .unwrap();
    match conn.read_frame().await.unwrap() {
        Frame::Integer(n) => n,
        other => panic!("unexpected PUBLISH reply: {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn test_channel_round_trip() {
    let subscription = SubscriptionBuilder::new()
        .address(ADDRESS)
        .client_name("submux-it")
        .build()
        .await
        .expect("Failed to connect");

    subscription
        .subscribe(&[Bytes::from("submux:it:channel")])
        .await
        .unwrap();
    let mut messages = subscription.receive();
    assert!(poll!(messages.next()).is_pending());

    assert_eq!(publish("submux:it:channel", "hello").await, 1);

    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("timed out")
        .unwrap()
        .unwrap();
    assert!(!message.is_pattern());
    assert_eq!(message.channel(), "submux:it:channel");
    assert_eq!(message.payload(), "hello");

    subscription.cancel().await.unwrap();
    assert!(matches!(messages.next().await, Some(Err(ReceiveError::Cancelled))));
}

#[tokio::test]
#[ignore]
async fn test_pattern_round_trip() {
    let subscription = SubscriptionBuilder::new()
        .address(ADDRESS)
        .build()
        .await
        .expect("Failed to connect");

    subscription
        .psubscribe(&[Bytes::from("submux:it:p:*")])
        .await
        .unwrap();
    let mut messages = subscription.receive();
    assert!(poll!(messages.next()).is_pending());

    publish("submux:it:p:orders", "42").await;

    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("timed out")
        .unwrap()
        .unwrap();
    assert_eq!(message.pattern(), Some(&Bytes::from("submux:it:p:*")));
    assert_eq!(message.channel(), "submux:it:p:orders");

    subscription.punsubscribe_all().await.unwrap();
    assert!(subscription.patterns().is_empty());
}
