use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::message::{ChannelMessage, PatternMessage};

/// The connection a [`Subscription`](super::Subscription) drives.
///
/// Exposes the pub/sub command round-trips and two independent observation
/// streams. Each call to `observe_*` registers one upstream observer that
/// lives until the returned stream is dropped; every registered observer
/// sees every message in arrival order. A stream item of `Err` is terminal.
///
/// [`RespPubSubConnection`](super::RespPubSubConnection) is the TCP
/// implementation; tests use `testing::MockPubSubConnection`.
#[async_trait]
pub trait PubSubConnection: Send + Sync + 'static {
    /// The connection's native failure type, translated into
    /// [`crate::Error`] by the session's error translator.
    type Error: Send + 'static;

    /// Subscribes to channels; completes once the server acknowledged all of them.
    async fn subscribe(&self, channels: &[Bytes]) -> Result<(), Self::Error>;

    /// Unsubscribes from channels; completes once the server acknowledged all of them.
    async fn unsubscribe(&self, channels: &[Bytes]) -> Result<(), Self::Error>;

    /// Subscribes to glob patterns.
    async fn psubscribe(&self, patterns: &[Bytes]) -> Result<(), Self::Error>;

    /// Unsubscribes from glob patterns.
    async fn punsubscribe(&self, patterns: &[Bytes]) -> Result<(), Self::Error>;

    /// Observes messages delivered for channel subscriptions.
    fn observe_channels(&self) -> BoxStream<'static, Result<ChannelMessage, Self::Error>>;

    /// Observes messages delivered for pattern subscriptions.
    fn observe_patterns(&self) -> BoxStream<'static, Result<PatternMessage, Self::Error>>;
}
