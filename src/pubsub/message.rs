use bytes::Bytes;

/// A message published to a channel the connection subscribed to directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    channel: Bytes,
    payload: Bytes,
}

impl ChannelMessage {
    /// Creates a channel message.
    pub fn new(channel: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// The channel the message was published to.
    pub fn channel(&self) -> &Bytes {
        &self.channel
    }

    /// The published payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// A message delivered because its channel matched a subscribed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMessage {
    pattern: Bytes,
    channel: Bytes,
    payload: Bytes,
}

impl PatternMessage {
    /// Creates a pattern message.
    pub fn new(
        pattern: impl Into<Bytes>,
        channel: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// The subscribed pattern that matched.
    pub fn pattern(&self) -> &Bytes {
        &self.pattern
    }

    /// The channel the message was published to.
    pub fn channel(&self) -> &Bytes {
        &self.channel
    }

    /// The published payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// An inbound pub/sub message of either kind.
///
/// Channel and pattern deliveries are merged into one stream by
/// [`Subscription::receive`](crate::pubsub::Subscription::receive); match on
/// the variant (or use [`Message::pattern`]) to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Delivered for an exact channel subscription.
    Channel(ChannelMessage),
    /// Delivered for a pattern subscription.
    Pattern(PatternMessage),
}

impl Message {
    /// The channel the message was published to.
    pub fn channel(&self) -> &Bytes {
        match self {
            Message::Channel(m) => m.channel(),
            Message::Pattern(m) => m.channel(),
        }
    }

    /// The published payload.
    pub fn payload(&self) -> &Bytes {
        match self {
            Message::Channel(m) => m.payload(),
            Message::Pattern(m) => m.payload(),
        }
    }

    /// The matching pattern, for pattern deliveries only.
    pub fn pattern(&self) -> Option<&Bytes> {
        match self {
            Message::Channel(_) => None,
            Message::Pattern(m) => Some(m.pattern()),
        }
    }

    /// Returns `true` for pattern deliveries.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Message::Pattern(_))
    }
}

impl From<ChannelMessage> for Message {
    fn from(message: ChannelMessage) -> Self {
        Message::Channel(message)
    }
}

impl From<PatternMessage> for Message {
    fn from(message: PatternMessage) -> Self {
        Message::Pattern(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_message_accessors() {
        let message: Message = ChannelMessage::new("news", "hello").into();
        assert_eq!(message.channel(), &Bytes::from("news"));
        assert_eq!(message.payload(), &Bytes::from("hello"));
        assert_eq!(message.pattern(), None);
        assert!(!message.is_pattern());
    }

    #[test]
    fn test_pattern_message_accessors() {
        let message: Message = PatternMessage::new("foo*", "foo", "body").into();
        assert_eq!(message.pattern(), Some(&Bytes::from("foo*")));
        assert_eq!(message.channel(), &Bytes::from("foo"));
        assert_eq!(message.payload(), &Bytes::from("body"));
        assert!(message.is_pattern());
    }
}
