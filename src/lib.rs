//! # Submux
//!
//! Redis Cluster slot routing and reactive Pub/Sub sessions for Rust.
//!
//! ## Features
//!
//! - `cluster` - Hash slot calculation (enabled by default)
//! - `test-utils` - In-memory pub/sub connection for tests
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use futures::StreamExt;
//! use submux::SubscriptionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subscription = SubscriptionBuilder::new()
//!         .address("redis://localhost:6379")
//!         .build()
//!         .await?;
//!
//!     subscription.psubscribe(&[Bytes::from("orders.*")]).await?;
//!     let mut messages = subscription.receive();
//!     if let Some(Ok(message)) = messages.next().await {
//!         println!("{:?} on {:?}", message.payload(), message.channel());
//!     }
//!
//!     subscription.cancel().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod proto;
pub mod pubsub;

#[cfg(feature = "cluster")]
pub mod cluster;

#[cfg(test)]
mod stress;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crate::core::builder::SubscriptionBuilder;
pub use crate::core::{Error, Result};
pub use crate::pubsub::{
    Message, MessageStream, NoopListener, PubSubConnection, ReceiveError, Subscription,
    SubscriptionListener,
};

#[cfg(feature = "cluster")]
pub use crate::cluster::{key_slot, same_slot, SLOT_COUNT};
