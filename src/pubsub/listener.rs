use bytes::Bytes;

/// Observer of subscription state changes.
///
/// Callbacks run on the task that completed the subscribe/unsubscribe
/// round-trip, after the server acknowledged it. Implementations must
/// return quickly and must not block; hand work off to a channel or a
/// spawned task when it is more than bookkeeping.
///
/// `count` is the number of channels (or patterns) tracked by the session
/// after the change. Every method has a no-op default.
pub trait SubscriptionListener: Send + Sync {
    /// Called once per channel after a successful SUBSCRIBE.
    fn on_channel_subscribed(&self, _channel: &Bytes, _count: usize) {}

    /// Called once per channel after a successful UNSUBSCRIBE.
    fn on_channel_unsubscribed(&self, _channel: &Bytes, _count: usize) {}

    /// Called once per pattern after a successful PSUBSCRIBE.
    fn on_pattern_subscribed(&self, _pattern: &Bytes, _count: usize) {}

    /// Called once per pattern after a successful PUNSUBSCRIBE.
    fn on_pattern_unsubscribed(&self, _pattern: &Bytes, _count: usize) {}
}

/// A listener that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl SubscriptionListener for NoopListener {}
