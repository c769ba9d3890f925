//! In-memory doubles for exercising subscription sessions without a server.
//!
//! [`MockPubSubConnection`] records every command it receives, can be told
//! to fail the next one, and lets tests push messages or failures to
//! whoever is observing it. [`RecordingListener`] captures listener
//! callbacks as strings.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pubsub::{ChannelMessage, PatternMessage, PubSubConnection, SubscriptionListener};

/// Native error type of [`MockPubSubConnection`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mock failure: {0}")]
pub struct MockError(pub String);

type Observer<T> = mpsc::UnboundedSender<Result<T, MockError>>;

#[derive(Default)]
struct MockState {
    commands: Vec<(&'static str, Vec<Bytes>)>,
    fail_next: Option<MockError>,
    channel_observers: Vec<Observer<ChannelMessage>>,
    pattern_observers: Vec<Observer<PatternMessage>>,
}

#[derive(Default)]
struct MockInner {
    state: Mutex<MockState>,
}

impl MockInner {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scriptable [`PubSubConnection`]. Clones share state.
#[derive(Clone, Default)]
pub struct MockPubSubConnection {
    inner: Arc<MockInner>,
}

impl MockPubSubConnection {
    /// Creates a connection that acknowledges every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command received so far, in order, with its arguments.
    pub fn commands(&self) -> Vec<(&'static str, Vec<Bytes>)> {
        self.inner.state().commands.clone()
    }

    /// Makes the next command fail with `err`.
    pub fn fail_next_command(&self, err: MockError) {
        self.inner.state().fail_next = Some(err);
    }

    /// Handle for pushing channel messages to observers.
    pub fn channel_emitter(&self) -> Emitter<ChannelMessage> {
        Emitter {
            inner: self.inner.clone(),
            observers: |state| &mut state.channel_observers,
        }
    }

    /// Handle for pushing pattern messages to observers.
    pub fn pattern_emitter(&self) -> Emitter<PatternMessage> {
        Emitter {
            inner: self.inner.clone(),
            observers: |state| &mut state.pattern_observers,
        }
    }

    fn execute(&self, name: &'static str, args: &[Bytes]) -> Result<(), MockError> {
        let mut state = self.inner.state();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        state.commands.push((name, args.to_vec()));
        Ok(())
    }
}

impl std::fmt::Debug for MockPubSubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPubSubConnection")
            .field("commands", &self.inner.state().commands.len())
            .finish()
    }
}

#[async_trait]
impl PubSubConnection for MockPubSubConnection {
    type Error = MockError;

    async fn subscribe(&self, channels: &[Bytes]) -> Result<(), MockError> {
        self.execute("SUBSCRIBE", channels)
    }

    async fn unsubscribe(&self, channels: &[Bytes]) -> Result<(), MockError> {
        self.execute("UNSUBSCRIBE", channels)
    }

    async fn psubscribe(&self, patterns: &[Bytes]) -> Result<(), MockError> {
        self.execute("PSUBSCRIBE", patterns)
    }

    async fn punsubscribe(&self, patterns: &[Bytes]) -> Result<(), MockError> {
        self.execute("PUNSUBSCRIBE", patterns)
    }

    fn observe_channels(&self) -> BoxStream<'static, Result<ChannelMessage, MockError>> {
        self.channel_emitter().register()
    }

    fn observe_patterns(&self) -> BoxStream<'static, Result<PatternMessage, MockError>> {
        self.pattern_emitter().register()
    }
}

/// Pushes items to every live observer of one message kind.
pub struct Emitter<T> {
    inner: Arc<MockInner>,
    observers: fn(&mut MockState) -> &mut Vec<Observer<T>>,
}

impl<T: Clone + Send + 'static> Emitter<T> {
    /// Delivers `message` to every live observer.
    pub fn emit(&self, message: T) {
        let mut state = self.inner.state();
        (self.observers)(&mut state).retain(|tx| tx.send(Ok(message.clone())).is_ok());
    }

    /// Fails every live observer with `err` and forgets them.
    pub fn fail(&self, err: MockError) {
        let mut state = self.inner.state();
        for tx in (self.observers)(&mut state).drain(..) {
            let _ = tx.send(Err(err.clone()));
        }
    }

    /// Number of observers whose stream has not been dropped.
    pub fn observer_count(&self) -> usize {
        let mut state = self.inner.state();
        let observers = (self.observers)(&mut state);
        observers.retain(|tx| !tx.is_closed());
        observers.len()
    }

    fn register(&self) -> BoxStream<'static, Result<T, MockError>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        (self.observers)(&mut self.inner.state()).push(tx);
        stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

/// Listener that records every callback.
///
/// Events read `+channel <name> (<count>)`, `-channel ...`, `+pattern ...`
/// and `-pattern ...`.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    /// Events recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, sign: char, kind: &str, target: &Bytes, count: usize) {
        self.lock().push(format!(
            "{sign}{kind} {} ({count})",
            String::from_utf8_lossy(target)
        ));
    }
}

impl SubscriptionListener for RecordingListener {
    fn on_channel_subscribed(&self, channel: &Bytes, count: usize) {
        self.record('+', "channel", channel, count);
    }

    fn on_channel_unsubscribed(&self, channel: &Bytes, count: usize) {
        self.record('-', "channel", channel, count);
    }

    fn on_pattern_subscribed(&self, pattern: &Bytes, count: usize) {
        self.record('+', "pattern", pattern, count);
    }

    fn on_pattern_unsubscribed(&self, pattern: &Bytes, count: usize) {
        self.record('-', "pattern", pattern, count);
    }
}
