//! RESP2 implementation of [`PubSubConnection`].
//!
//! Once a connection enters subscribed state the server interleaves command
//! acknowledgements with pushed messages, so reads and writes are driven by
//! two tasks. The writer records what acknowledgements a request expects
//! before writing it; the reader routes every push either to the oldest
//! pending request or to the registered observers.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use super::facade::PubSubConnection;
use super::message::{ChannelMessage, PatternMessage};
use crate::core::command::{self, Cmd};
use crate::core::connection::{Connection, ConnectionReader, ConnectionWriter};
use crate::proto::frame::Frame;

/// Native failure type of [`RespPubSubConnection`].
///
/// `Clone` so a single transport failure can be handed to every observer
/// and pending request.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The connection was closed by either side.
    #[error("connection closed")]
    Closed,

    /// Reading or writing the socket failed.
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),

    /// The server sent something that is not valid pub/sub traffic.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected a request.
    #[error("server error: {0}")]
    Server(String),
}

impl From<crate::Error> for ConnectionError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::ConnectionClosed => ConnectionError::Closed,
            crate::Error::Io { source } => ConnectionError::Io(Arc::new(source)),
            crate::Error::Server { message } => ConnectionError::Server(message),
            crate::Error::Protocol { message } => ConnectionError::Protocol(message),
            other => ConnectionError::Protocol(other.to_string()),
        }
    }
}

/// Translates [`ConnectionError`] into the domain [`Error`](crate::Error).
pub fn translate_connection_error(err: ConnectionError) -> crate::Error {
    match err {
        ConnectionError::Closed => crate::Error::ConnectionClosed,
        ConnectionError::Io(source) => crate::Error::Io {
            source: io::Error::new(source.kind(), source.to_string()),
        },
        ConnectionError::Protocol(message) => crate::Error::Protocol { message },
        ConnectionError::Server(message) => crate::Error::Server { message },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckKind {
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
}

impl AckKind {
    fn from_push(kind: &[u8]) -> Option<Self> {
        match kind.to_ascii_lowercase().as_slice() {
            b"subscribe" => Some(AckKind::Subscribe),
            b"unsubscribe" => Some(AckKind::Unsubscribe),
            b"psubscribe" => Some(AckKind::PSubscribe),
            b"punsubscribe" => Some(AckKind::PUnsubscribe),
            _ => None,
        }
    }

    fn command(self, targets: &[Bytes]) -> Cmd {
        match self {
            AckKind::Subscribe => command::subscribe(targets),
            AckKind::Unsubscribe => command::unsubscribe(targets),
            AckKind::PSubscribe => command::psubscribe(targets),
            AckKind::PUnsubscribe => command::punsubscribe(targets),
        }
    }
}

type Reply = oneshot::Sender<Result<(), ConnectionError>>;

struct Pending {
    kind: AckKind,
    remaining: usize,
    reply: Reply,
}

struct Request {
    frame: Frame,
    pending: Pending,
}

type ChannelObserver = mpsc::UnboundedSender<Result<ChannelMessage, ConnectionError>>;
type PatternObserver = mpsc::UnboundedSender<Result<PatternMessage, ConnectionError>>;

#[derive(Default)]
struct State {
    pending: VecDeque<Pending>,
    channel_observers: Vec<ChannelObserver>,
    pattern_observers: Vec<PatternObserver>,
    failure: Option<ConnectionError>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure(&self) -> ConnectionError {
        self.state().failure.clone().unwrap_or(ConnectionError::Closed)
    }

    /// Routes one frame read from the server.
    fn dispatch(&self, frame: Frame) {
        let items = match frame {
            Frame::Array(items) => items,
            Frame::Error(message) => {
                let message = String::from_utf8_lossy(&message).into_owned();
                self.reject(ConnectionError::Server(message));
                return;
            }
            other => {
                warn!(frame = ?other, "ignoring unexpected frame on pub/sub connection");
                return;
            }
        };

        let Some(kind) = items.first().and_then(Frame::as_bytes) else {
            warn!("ignoring push without a kind");
            return;
        };

        match (kind.to_ascii_lowercase().as_slice(), items.as_slice()) {
            (b"message", [_, channel, payload]) => {
                match (channel.as_bytes(), payload.as_bytes()) {
                    (Some(channel), Some(payload)) => {
                        let message = ChannelMessage::new(channel, payload);
                        self.state()
                            .channel_observers
                            .retain(|tx| tx.send(Ok(message.clone())).is_ok());
                    }
                    _ => warn!("malformed message push"),
                }
            }
            (b"pmessage", [_, pattern, channel, payload]) => {
                match (pattern.as_bytes(), channel.as_bytes(), payload.as_bytes()) {
                    (Some(pattern), Some(channel), Some(payload)) => {
                        let message = PatternMessage::new(pattern, channel, payload);
                        self.state()
                            .pattern_observers
                            .retain(|tx| tx.send(Ok(message.clone())).is_ok());
                    }
                    _ => warn!("malformed pmessage push"),
                }
            }
            (b"pong", _) => debug!("pong"),
            (name, _) => match AckKind::from_push(name) {
                Some(ack) => self.acknowledge(ack),
                None => warn!(kind = ?kind, "ignoring unknown push"),
            },
        }
    }

    fn acknowledge(&self, kind: AckKind) {
        let mut state = self.state();
        let Some(front) = state.pending.front_mut() else {
            debug!(?kind, "unsolicited acknowledgement");
            return;
        };
        if front.kind != kind {
            warn!(expected = ?front.kind, got = ?kind, "out-of-order acknowledgement");
            return;
        }
        front.remaining = front.remaining.saturating_sub(1);
        if front.remaining == 0 {
            if let Some(done) = state.pending.pop_front() {
                let _ = done.reply.send(Ok(()));
            }
        }
    }

    fn reject(&self, err: ConnectionError) {
        match self.state().pending.pop_front() {
            Some(pending) => {
                let _ = pending.reply.send(Err(err));
            }
            None => warn!(error = %err, "server error with no pending request"),
        }
    }

    /// Terminates the connection: pending requests and observers all fail.
    fn fail(&self, err: ConnectionError) {
        let mut state = self.state();
        if state.failure.is_some() {
            return;
        }
        error!(error = %err, "pub/sub connection failed");
        state.failure = Some(err.clone());
        for pending in state.pending.drain(..) {
            let _ = pending.reply.send(Err(err.clone()));
        }
        for tx in state.channel_observers.drain(..) {
            let _ = tx.send(Err(err.clone()));
        }
        for tx in state.pattern_observers.drain(..) {
            let _ = tx.send(Err(err.clone()));
        }
    }
}

/// A pub/sub connection speaking RESP2 over any async byte stream.
///
/// Commands are queued to a writer task; a reader task demultiplexes
/// acknowledgements, error replies and pushed messages. Both tasks are
/// spawned on construction, so a tokio runtime must be running.
pub struct RespPubSubConnection {
    requests: mpsc::Sender<Request>,
    inner: Arc<Inner>,
    reader: JoinHandle<()>,
}

impl RespPubSubConnection {
    /// Wraps an established connection.
    ///
    /// The connection must already be authenticated and have the right
    /// database selected; pub/sub mode accepts no other commands.
    ///
    /// # Arguments
    ///
    /// * `connection` - The underlying connection to drive.
    /// * `queue_size` - The maximum number of queued requests.
    pub fn new<S>(connection: Connection<S>, queue_size: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = connection.split();
        let (request_tx, request_rx) = mpsc::channel(queue_size.max(1));
        let inner = Arc::new(Inner::default());

        tokio::spawn(run_writer(writer, request_rx, inner.clone()));
        let reader = tokio::spawn(run_reader(reader, inner.clone()));

        Self {
            requests: request_tx,
            inner,
            reader,
        }
    }

    /// Number of live channel and pattern observers.
    pub fn observer_count(&self) -> usize {
        let mut state = self.inner.state();
        state.channel_observers.retain(|tx| !tx.is_closed());
        state.pattern_observers.retain(|tx| !tx.is_closed());
        state.channel_observers.len() + state.pattern_observers.len()
    }

    #[instrument(skip(self), level = "debug")]
    async fn request(&self, kind: AckKind, targets: &[Bytes]) -> Result<(), ConnectionError> {
        if targets.is_empty() {
            return Ok(());
        }

        let (reply, response) = oneshot::channel();
        let request = Request {
            frame: kind.command(targets).into_frame(),
            pending: Pending {
                kind,
                remaining: targets.len(),
                reply,
            },
        };

        self.requests
            .send(request)
            .await
            .map_err(|_| self.inner.failure())?;

        response.await.map_err(|_| self.inner.failure())?
    }
}

impl Drop for RespPubSubConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl fmt::Debug for RespPubSubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RespPubSubConnection")
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[async_trait]
impl PubSubConnection for RespPubSubConnection {
    type Error = ConnectionError;

    async fn subscribe(&self, channels: &[Bytes]) -> Result<(), ConnectionError> {
        self.request(AckKind::Subscribe, channels).await
    }

    async fn unsubscribe(&self, channels: &[Bytes]) -> Result<(), ConnectionError> {
        self.request(AckKind::Unsubscribe, channels).await
    }

    async fn psubscribe(&self, patterns: &[Bytes]) -> Result<(), ConnectionError> {
        self.request(AckKind::PSubscribe, patterns).await
    }

    async fn punsubscribe(&self, patterns: &[Bytes]) -> Result<(), ConnectionError> {
        self.request(AckKind::PUnsubscribe, patterns).await
    }

    fn observe_channels(&self) -> BoxStream<'static, Result<ChannelMessage, ConnectionError>> {
        let mut state = self.inner.state();
        if let Some(err) = state.failure.clone() {
            return stream::once(async move { Err(err) }).boxed();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.channel_observers.push(tx);
        receiver_stream(rx)
    }

    fn observe_patterns(&self) -> BoxStream<'static, Result<PatternMessage, ConnectionError>> {
        let mut state = self.inner.state();
        if let Some(err) = state.failure.clone() {
            return stream::once(async move { Err(err) }).boxed();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.pattern_observers.push(tx);
        receiver_stream(rx)
    }
}

fn receiver_stream<T: Send + 'static>(
    mut rx: mpsc::UnboundedReceiver<T>,
) -> BoxStream<'static, T> {
    stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
}

async fn run_writer<S>(
    mut writer: ConnectionWriter<S>,
    mut request_rx: mpsc::Receiver<Request>,
    inner: Arc<Inner>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = request_rx.recv().await {
        {
            let mut state = inner.state();
            if let Some(err) = state.failure.clone() {
                let _ = request.pending.reply.send(Err(err));
                continue;
            }
            // Registered before the write so a fast acknowledgement finds it.
            state.pending.push_back(request.pending);
        }

        debug!(frame = ?request.frame, "sending frame");
        if let Err(e) = writer.write_frame(&request.frame).await {
            inner.fail(ConnectionError::Io(Arc::new(e)));
            return;
        }
    }
}

async fn run_reader<S>(mut reader: ConnectionReader<S>, inner: Arc<Inner>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match reader.read_frame().await {
            Ok(frame) => {
                debug!(?frame, "received frame");
                inner.dispatch(frame);
            }
            Err(e) => {
                inner.fail(e.into());
                return;
            }
        }
    }
}
