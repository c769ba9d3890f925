use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::delivery::{Delivery, MessageStream, UpstreamFactory};
use super::facade::PubSubConnection;
use super::listener::SubscriptionListener;
use super::message::Message;
use crate::{Error, Result};

/// Converts a connection's native failure into the domain [`Error`].
pub type ErrorTranslator<E> = Arc<dyn Fn(E) -> Error + Send + Sync>;

/// Why a [`MessageStream`] terminated.
#[derive(Debug, Clone, Error)]
pub enum ReceiveError {
    /// [`Subscription::cancel`] was called.
    #[error("subscription cancelled")]
    Cancelled,

    /// The connection's message stream failed; the error is shared by every
    /// consumer that was attached at the time.
    #[error("upstream failure: {0}")]
    Upstream(Arc<Error>),
}

/// Lock-protected set of channels or patterns.
#[derive(Debug, Default)]
struct Targets(Mutex<HashSet<Bytes>>);

impl Targets {
    fn lock(&self) -> MutexGuard<'_, HashSet<Bytes>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> HashSet<Bytes> {
        self.lock().clone()
    }

    /// Inserts all targets atomically unless `cancelled` is set; returns the
    /// set size after each insertion.
    ///
    /// The flag is read under the set lock, so an insertion either precedes
    /// the snapshot taken by cancel or does not happen at all.
    fn add(&self, targets: &[Bytes], cancelled: &AtomicBool) -> Option<Vec<usize>> {
        let mut set = self.lock();
        if cancelled.load(Ordering::Acquire) {
            return None;
        }
        Some(
            targets
                .iter()
                .map(|t| {
                    set.insert(t.clone());
                    set.len()
                })
                .collect(),
        )
    }

    /// Removes all targets atomically; returns the set size after each removal.
    fn remove(&self, targets: &[Bytes]) -> Vec<usize> {
        let mut set = self.lock();
        targets
            .iter()
            .map(|t| {
                set.remove(t);
                set.len()
            })
            .collect()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

struct Shared<C: PubSubConnection> {
    connection: Arc<C>,
    listener: Arc<dyn SubscriptionListener>,
    translate: ErrorTranslator<C::Error>,
    channels: Targets,
    patterns: Targets,
    delivery: Arc<Delivery>,
    cancelled: AtomicBool,
}

/// A reactive pub/sub session bound to one connection.
///
/// Tracks the channels and patterns subscribed through it and exposes every
/// inbound message through one shared [`MessageStream`]. The handle is cheap
/// to clone; clones share the same session.
///
/// Upstream failures are never retried: a failed (un)subscribe returns the
/// translated error, and a failure on the message streams terminates every
/// attached consumer with [`ReceiveError::Upstream`]. Reconnecting and
/// resubscribing is up to the caller.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use futures::StreamExt;
/// use submux::SubscriptionBuilder;
///
/// #[tokio::main]
/// async fn main() -> submux::Result<()> {
///     let subscription = SubscriptionBuilder::new()
///         .address("redis://127.0.0.1:6379")
///         .build()
///         .await?;
///
///     subscription.subscribe(&[Bytes::from("news")]).await?;
///     let mut messages = subscription.receive();
///     while let Some(Ok(message)) = messages.next().await {
///         println!("{:?}: {:?}", message.channel(), message.payload());
///     }
///     Ok(())
/// }
/// ```
pub struct Subscription<C: PubSubConnection> {
    shared: Arc<Shared<C>>,
}

impl<C: PubSubConnection> Clone for Subscription<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: PubSubConnection> Subscription<C> {
    /// Creates a session over `connection`.
    ///
    /// # Arguments
    ///
    /// * `listener` - Notified after every acknowledged (un)subscription
    /// * `translate` - Maps the connection's failures to [`Error`]
    pub fn new<L, F>(connection: C, listener: L, translate: F) -> Self
    where
        L: SubscriptionListener + 'static,
        F: Fn(C::Error) -> Error + Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(connection), Arc::new(listener), Arc::new(translate))
    }

    /// Creates a session over a shared connection and listener.
    pub fn from_arc(
        connection: Arc<C>,
        listener: Arc<dyn SubscriptionListener>,
        translate: ErrorTranslator<C::Error>,
    ) -> Self {
        let delivery = Delivery::new(upstream_factory(connection.clone(), translate.clone()));
        Self {
            shared: Arc::new(Shared {
                connection,
                listener,
                translate,
                channels: Targets::default(),
                patterns: Targets::default(),
                delivery,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes to the given channels.
    ///
    /// The channels are recorded and the listener notified only after the
    /// server acknowledged the request. On failure nothing is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] after [`cancel`](Self::cancel), or the
    /// translated connection failure. A request still awaiting its
    /// acknowledgement when the session is cancelled is undone on the
    /// server and also returns [`Error::Cancelled`].
    #[instrument(skip(self), level = "debug")]
    pub async fn subscribe(&self, channels: &[Bytes]) -> Result<()> {
        self.ensure_open()?;
        if channels.is_empty() {
            return Ok(());
        }

        self.shared
            .connection
            .subscribe(channels)
            .await
            .map_err(|e| self.translate("SUBSCRIBE", e))?;

        let Some(counts) = self.shared.channels.add(channels, &self.shared.cancelled) else {
            // Cancelled while the request was in flight.
            if let Err(e) = self.shared.connection.unsubscribe(channels).await {
                self.translate("UNSUBSCRIBE", e);
            }
            return Err(Error::Cancelled);
        };
        for (channel, count) in channels.iter().zip(counts) {
            self.shared.listener.on_channel_subscribed(channel, count);
        }
        Ok(())
    }

    /// Subscribes to the given glob patterns.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    #[instrument(skip(self), level = "debug")]
    pub async fn psubscribe(&self, patterns: &[Bytes]) -> Result<()> {
        self.ensure_open()?;
        if patterns.is_empty() {
            return Ok(());
        }

        self.shared
            .connection
            .psubscribe(patterns)
            .await
            .map_err(|e| self.translate("PSUBSCRIBE", e))?;

        let Some(counts) = self.shared.patterns.add(patterns, &self.shared.cancelled) else {
            if let Err(e) = self.shared.connection.punsubscribe(patterns).await {
                self.translate("PUNSUBSCRIBE", e);
            }
            return Err(Error::Cancelled);
        };
        for (pattern, count) in patterns.iter().zip(counts) {
            self.shared.listener.on_pattern_subscribed(pattern, count);
        }
        Ok(())
    }

    /// Unsubscribes from the given channels.
    ///
    /// An empty slice, or any call after [`cancel`](Self::cancel), is a no-op.
    /// Channels that were never subscribed are still sent to the server and
    /// reported to the listener, with an unchanged count.
    pub async fn unsubscribe(&self, channels: &[Bytes]) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        self.remove_channels(channels).await
    }

    /// Unsubscribes from every channel currently tracked by the session.
    pub async fn unsubscribe_all(&self) -> Result<()> {
        let channels: Vec<Bytes> = self.shared.channels.snapshot().into_iter().collect();
        self.remove_channels(&channels).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_channels(&self, channels: &[Bytes]) -> Result<()> {
        if channels.is_empty() {
            return Ok(());
        }

        self.shared
            .connection
            .unsubscribe(channels)
            .await
            .map_err(|e| self.translate("UNSUBSCRIBE", e))?;

        let counts = self.shared.channels.remove(channels);
        for (channel, count) in channels.iter().zip(counts) {
            self.shared.listener.on_channel_unsubscribed(channel, count);
        }
        Ok(())
    }

    /// Unsubscribes from the given patterns.
    ///
    /// Same rules as [`unsubscribe`](Self::unsubscribe), including for
    /// patterns that were never subscribed.
    pub async fn punsubscribe(&self, patterns: &[Bytes]) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        self.remove_patterns(patterns).await
    }

    /// Unsubscribes from every pattern currently tracked by the session.
    pub async fn punsubscribe_all(&self) -> Result<()> {
        let patterns: Vec<Bytes> = self.shared.patterns.snapshot().into_iter().collect();
        self.remove_patterns(&patterns).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_patterns(&self, patterns: &[Bytes]) -> Result<()> {
        if patterns.is_empty() {
            return Ok(());
        }

        self.shared
            .connection
            .punsubscribe(patterns)
            .await
            .map_err(|e| self.translate("PUNSUBSCRIBE", e))?;

        let counts = self.shared.patterns.remove(patterns);
        for (pattern, count) in patterns.iter().zip(counts) {
            self.shared.listener.on_pattern_unsubscribed(pattern, count);
        }
        Ok(())
    }

    /// Snapshot of the subscribed channels.
    pub fn channels(&self) -> HashSet<Bytes> {
        self.shared.channels.snapshot()
    }

    /// Snapshot of the subscribed patterns.
    pub fn patterns(&self) -> HashSet<Bytes> {
        self.shared.patterns.snapshot()
    }

    /// Returns the stream of inbound channel and pattern messages.
    ///
    /// Returns immediately; delivery is activated on the first poll and
    /// shared by all consumers of this session, so the connection is
    /// observed at most once no matter how many streams are attached.
    /// Messages are not filtered against [`channels`](Self::channels) or
    /// [`patterns`](Self::patterns).
    pub fn receive(&self) -> MessageStream {
        MessageStream::new(self.shared.delivery.clone())
    }

    /// Whether message delivery is currently activated.
    pub fn is_active(&self) -> bool {
        self.shared.delivery.is_active()
    }

    /// Number of [`MessageStream`]s currently attached.
    pub fn consumer_count(&self) -> usize {
        self.shared.delivery.consumer_count()
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Tears the session down.
    ///
    /// Unsubscribes all channels and patterns, clears local state and ends
    /// every current and future [`MessageStream`] with
    /// [`ReceiveError::Cancelled`]. Safe to call repeatedly and with no
    /// subscriptions. Local teardown happens even when an unsubscribe request
    /// fails; the first such failure is returned.
    #[instrument(skip(self), level = "debug")]
    pub async fn cancel(&self) -> Result<()> {
        let first = !self.shared.cancelled.swap(true, Ordering::AcqRel);

        let channels = self.unsubscribe_all().await;
        let patterns = self.punsubscribe_all().await;

        self.shared.channels.clear();
        self.shared.patterns.clear();
        self.shared.delivery.cancel();

        if first {
            debug!("subscription cancelled");
        }
        channels.and(patterns)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn translate(&self, command: &'static str, err: C::Error) -> Error {
        let err = (self.shared.translate)(err);
        warn!(command, error = %err, "pub/sub request failed");
        err
    }
}

impl<C: PubSubConnection> fmt::Debug for Subscription<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channels", &self.shared.channels)
            .field("patterns", &self.shared.patterns)
            .field("active", &self.is_active())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Merges both observation streams into one translated stream.
fn upstream_factory<C: PubSubConnection>(
    connection: Arc<C>,
    translate: ErrorTranslator<C::Error>,
) -> UpstreamFactory {
    Box::new(move || {
        let on_channel = translate.clone();
        let on_pattern = translate.clone();
        let channels = connection.observe_channels().map(move |item| {
            item.map(Message::from)
                .map_err(|e| ReceiveError::Upstream(Arc::new(on_channel(e))))
        });
        let patterns = connection.observe_patterns().map(move |item| {
            item.map(Message::from)
                .map_err(|e| ReceiveError::Upstream(Arc::new(on_pattern(e))))
        });
        stream::select(channels, patterns).boxed()
    })
}
