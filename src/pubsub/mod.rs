//! Reactive Pub/Sub sessions.
//!
//! A [`Subscription`] wraps one [`PubSubConnection`], tracks the channels
//! and patterns subscribed through it, reports changes to a
//! [`SubscriptionListener`] and multicasts inbound messages to every
//! [`MessageStream`] obtained from [`Subscription::receive`].
//!
//! [`RespPubSubConnection`] drives the RESP2 pub/sub protocol over a
//! [`Connection`](crate::core::connection::Connection).

mod delivery;
mod facade;
mod listener;
mod message;
mod resp;
mod session;

pub use delivery::MessageStream;
pub use facade::PubSubConnection;
pub use listener::{NoopListener, SubscriptionListener};
pub use message::{ChannelMessage, Message, PatternMessage};
pub use resp::{translate_connection_error, ConnectionError, RespPubSubConnection};
pub use session::{ErrorTranslator, ReceiveError, Subscription};
