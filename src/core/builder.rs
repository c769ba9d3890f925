use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{connect, handshake, parse_address, Handshake};
use crate::pubsub::{
    translate_connection_error, NoopListener, RespPubSubConnection, Subscription,
    SubscriptionListener,
};
use crate::Error;

const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Builder for configuring and opening a [`Subscription`] over TCP.
///
/// # Example
///
/// ```no_run
/// use submux::SubscriptionBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let subscription = SubscriptionBuilder::new()
///     .address("redis://localhost:6379")
///     .password("secret")
///     .database(0)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SubscriptionBuilder {
    address: Option<String>,
    handshake: Handshake,
    connection_timeout: Option<Duration>,
    queue_size: Option<usize>,
    listener: Option<Arc<dyn SubscriptionListener>>,
}

impl SubscriptionBuilder {
    /// Creates a new [`SubscriptionBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Redis server address.
    ///
    /// # Arguments
    ///
    /// * `address` - Redis address in format `redis://host:port`
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the password for authentication.
    #[inline]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.handshake.password = Some(password.into());
        self
    }

    /// Sets the username for ACL authentication. Ignored without a password.
    #[inline]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.handshake.username = Some(username.into());
        self
    }

    /// Sets the database to select before subscribing.
    ///
    /// Pub/sub channels are global, so this only matters for ACLs and
    /// keyspace notifications.
    #[inline]
    pub fn database(mut self, database: u8) -> Self {
        self.handshake.database = Some(database);
        self
    }

    /// Sets the client connection name.
    ///
    /// # Arguments
    ///
    /// * `name` - Client name displayed in `CLIENT LIST`
    #[inline]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.handshake.client_name = Some(name.into());
        self
    }

    /// Sets the connection timeout.
    #[inline]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of queued (un)subscribe requests.
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum number of requests (default: 1024)
    #[inline]
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = Some(size);
        self
    }

    /// Sets the listener notified of subscription changes.
    #[inline]
    pub fn listener(mut self, listener: impl SubscriptionListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Connects, runs the handshake and returns the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the address is missing or invalid,
    /// [`Error::Auth`] if authentication is rejected and [`Error::Io`] if the
    /// connection fails or times out.
    pub async fn build(self) -> Result<Subscription<RespPubSubConnection>, Error> {
        let address = self.address.ok_or_else(|| Error::InvalidArgument {
            message: "address is required".to_string(),
        })?;
        let addr = parse_address(&address)?;

        let mut connection = connect(&addr, self.connection_timeout).await?;
        handshake(&mut connection, &self.handshake).await?;
        debug!(addr = %addr, "handshake complete, entering pub/sub mode");

        let connection = RespPubSubConnection::new(
            connection,
            self.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
        );
        let listener: Arc<dyn SubscriptionListener> = match self.listener {
            Some(listener) => listener,
            None => Arc::new(NoopListener),
        };

        Ok(Subscription::from_arc(
            Arc::new(connection),
            listener,
            Arc::new(translate_connection_error),
        ))
    }
}

impl fmt::Debug for SubscriptionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBuilder")
            .field("address", &self.address)
            .field("database", &self.handshake.database)
            .field("client_name", &self.handshake.client_name)
            .field("connection_timeout", &self.connection_timeout)
            .field("queue_size", &self.queue_size)
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command;
    use crate::core::connection::Connection;
    use crate::proto::frame::Frame;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    #[test]
    fn test_builder_new() {
        let builder = SubscriptionBuilder::new();
        assert!(builder.address.is_none());
        assert!(builder.handshake.password.is_none());
        assert!(builder.listener.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let builder = SubscriptionBuilder::new()
            .address("redis://localhost:6379")
            .username("app")
            .password("secret")
            .database(0)
            .client_name("test")
            .queue_size(8)
            .listener(NoopListener);

        assert_eq!(builder.address, Some("redis://localhost:6379".to_string()));
        assert_eq!(builder.handshake.username, Some("app".to_string()));
        assert_eq!(builder.handshake.password, Some("secret".to_string()));
        assert_eq!(builder.handshake.database, Some(0));
        assert_eq!(builder.handshake.client_name, Some("test".to_string()));
        assert_eq!(builder.queue_size, Some(8));
        assert!(builder.listener.is_some());
    }

    #[tokio::test]
    async fn test_builder_build_without_address() {
        let result = SubscriptionBuilder::new().build().await;
        match result {
            Err(Error::InvalidArgument { message }) => {
                assert_eq!(message, "address is required");
            }
            other => panic!("Expected InvalidArgument error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_builder_rejects_tls_scheme() {
        let result = SubscriptionBuilder::new()
            .address("rediss://localhost:6380")
            .build()
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_builder_opens_working_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);

            let setname = conn.read_frame().await.unwrap();
            assert_eq!(setname, command::client_setname("worker").into_frame());
            conn.write_frame(&Frame::SimpleString(b"OK".to_vec()))
                .await
                .unwrap();

            let subscribe = conn.read_frame().await.unwrap();
            assert_eq!(subscribe, command::subscribe(&[Bytes::from("jobs")]).into_frame());
            conn.write_frame(&Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("subscribe"))),
                Frame::BulkString(Some(Bytes::from("jobs"))),
                Frame::Integer(1),
            ]))
            .await
            .unwrap();
            conn
        });

        let subscription = SubscriptionBuilder::new()
            .address(format!("redis://{addr}"))
            .client_name("worker")
            .connection_timeout(Duration::from_secs(5))
            .build()
            .await
            .unwrap();

        subscription.subscribe(&[Bytes::from("jobs")]).await.unwrap();
        assert!(subscription.channels().contains(&Bytes::from("jobs")));
        let _conn = server.await.unwrap();
    }
}
