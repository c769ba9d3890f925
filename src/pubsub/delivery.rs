//! Shared message delivery.
//!
//! One [`Delivery`] hub exists per subscription session. Consumers attach
//! lazily on their first poll; the first attachment registers with the
//! upstream connection and spawns a pump task, later attachments share it.
//! When the last consumer detaches the pump is aborted, which drops the
//! upstream streams and deregisters from the connection. Events are fanned
//! out to every attached consumer without replay.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::message::Message;
use super::session::ReceiveError;

/// Item yielded to consumers.
pub(crate) type Item = Result<Message, ReceiveError>;

/// Opens a fresh, already merged and translated upstream registration.
pub(crate) type UpstreamFactory = Box<dyn Fn() -> BoxStream<'static, Item> + Send + Sync>;

struct Pump {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct DeliveryState {
    next_consumer: u64,
    generation: u64,
    consumers: HashMap<u64, mpsc::UnboundedSender<Item>>,
    pump: Option<Pump>,
    cancelled: bool,
}

pub(crate) struct Delivery {
    state: Mutex<DeliveryState>,
    upstream: UpstreamFactory,
}

impl Delivery {
    pub(crate) fn new(upstream: UpstreamFactory) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DeliveryState::default()),
            upstream,
        })
    }

    fn state(&self) -> MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an upstream registration is currently live.
    pub(crate) fn is_active(&self) -> bool {
        self.state().pump.is_some()
    }

    /// Number of attached consumers.
    pub(crate) fn consumer_count(&self) -> usize {
        self.state().consumers.len()
    }

    /// Attaches a consumer, activating the upstream if nobody else has.
    ///
    /// Returns `None` once the hub has been cancelled.
    fn attach(self: &Arc<Self>) -> Option<(u64, mpsc::UnboundedReceiver<Item>)> {
        let mut state = self.state();
        if state.cancelled {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = state.next_consumer;
        state.next_consumer += 1;
        state.consumers.insert(id, tx);

        if state.pump.is_none() {
            state.generation += 1;
            let generation = state.generation;
            let upstream = (self.upstream)();
            let handle = tokio::spawn(run_pump(Arc::downgrade(self), generation, upstream));
            state.pump = Some(Pump { generation, handle });
            debug!(generation, "activated message delivery");
        }

        Some((id, rx))
    }

    fn detach(&self, id: u64) {
        let mut state = self.state();
        if state.consumers.remove(&id).is_none() || !state.consumers.is_empty() {
            return;
        }
        if let Some(pump) = state.pump.take() {
            pump.handle.abort();
            debug!(generation = pump.generation, "last consumer detached, released upstream");
        }
    }

    /// Fans one upstream event out. Terminal events end the current registration.
    fn publish(&self, generation: u64, item: Item) {
        let mut state = self.state();
        if state.pump.as_ref().map(|p| p.generation) != Some(generation) {
            return;
        }

        let terminal = item.is_err();
        state
            .consumers
            .retain(|_, tx| tx.send(item.clone()).is_ok());

        if terminal {
            warn!(generation, consumers = state.consumers.len(), "upstream failed, terminating delivery");
            state.consumers.clear();
            state.pump = None;
        }
    }

    /// Upstream completed without error.
    fn finish(&self, generation: u64) {
        let mut state = self.state();
        if state.pump.as_ref().map(|p| p.generation) == Some(generation) {
            debug!(generation, "upstream completed");
            state.consumers.clear();
            state.pump = None;
        }
    }

    /// Terminates every current and future consumer with [`ReceiveError::Cancelled`].
    pub(crate) fn cancel(&self) {
        let mut state = self.state();
        state.cancelled = true;
        for (_, tx) in state.consumers.drain() {
            let _ = tx.send(Err(ReceiveError::Cancelled));
        }
        if let Some(pump) = state.pump.take() {
            pump.handle.abort();
        }
    }
}

async fn run_pump(hub: Weak<Delivery>, generation: u64, mut upstream: BoxStream<'static, Item>) {
    while let Some(item) = upstream.next().await {
        let Some(hub) = hub.upgrade() else {
            return;
        };
        let terminal = item.is_err();
        hub.publish(generation, item);
        if terminal {
            return;
        }
    }
    if let Some(hub) = hub.upgrade() {
        hub.finish(generation);
    }
}

enum Attachment {
    Detached,
    Attached {
        id: u64,
        rx: mpsc::UnboundedReceiver<Item>,
    },
    Done,
}

/// Stream of inbound messages returned by
/// [`Subscription::receive`](super::Subscription::receive).
///
/// Nothing happens until the stream is first polled. The first poll attaches
/// it to the session's shared delivery pipeline (registering with the
/// connection if no other consumer has), which requires a running tokio
/// runtime. Dropping the stream detaches only this consumer.
///
/// The stream ends after yielding an `Err`: either
/// [`ReceiveError::Cancelled`] or [`ReceiveError::Upstream`].
pub struct MessageStream {
    delivery: Arc<Delivery>,
    attachment: Attachment,
}

impl MessageStream {
    pub(crate) fn new(delivery: Arc<Delivery>) -> Self {
        Self {
            delivery,
            attachment: Attachment::Detached,
        }
    }

    fn release(&mut self) {
        if let Attachment::Attached { id, .. } =
            std::mem::replace(&mut self.attachment, Attachment::Done)
        {
            self.delivery.detach(id);
        }
    }
}

impl Stream for MessageStream {
    type Item = Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        let this = self.get_mut();

        if let Attachment::Detached = this.attachment {
            match this.delivery.attach() {
                Some((id, rx)) => this.attachment = Attachment::Attached { id, rx },
                None => {
                    this.attachment = Attachment::Done;
                    return Poll::Ready(Some(Err(ReceiveError::Cancelled)));
                }
            }
        }

        let Attachment::Attached { rx, .. } = &mut this.attachment else {
            return Poll::Ready(None);
        };

        match rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(message))) => Poll::Ready(Some(Ok(message))),
            Poll::Ready(Some(Err(err))) => {
                this.release();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.release();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.attachment {
            Attachment::Detached => "detached",
            Attachment::Attached { .. } => "attached",
            Attachment::Done => "done",
        };
        f.debug_struct("MessageStream")
            .field("state", &state)
            .finish()
    }
}
