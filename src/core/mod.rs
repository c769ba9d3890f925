//! Connection plumbing shared by pub/sub sessions.
//!
//! ## Modules
//!
//! - [`connection`] - Framed connection over any async byte stream
//! - [`command`] - Command builders
//! - [`builder`] - Subscription builder
//!

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

pub use crate::proto::error::{Error, Result};

/// Subscription builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Low-level connection management.
pub mod connection;

use connection::Connection;

const DEFAULT_PORT: u16 = 6379;

/// Commands run on a fresh connection before it enters subscribed state.
#[derive(Debug, Default, Clone)]
pub(crate) struct Handshake {
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<u8>,
    pub(crate) client_name: Option<String>,
}

/// Resolves a `redis://host[:port]` address into `host:port`.
pub(crate) fn parse_address(address: &str) -> Result<String> {
    let parsed_url = url::Url::parse(address).map_err(|_| Error::InvalidArgument {
        message: "invalid address format".to_string(),
    })?;

    if parsed_url.scheme() != "redis" {
        return Err(Error::InvalidArgument {
            message: "invalid scheme, expected redis://".to_string(),
        });
    }

    let host = parsed_url
        .host_str()
        .ok_or_else(|| Error::InvalidArgument {
            message: "missing host in address".to_string(),
        })?;

    let port = parsed_url.port().unwrap_or(DEFAULT_PORT);
    Ok(format!("{}:{}", host, port))
}

/// Opens a TCP connection, optionally bounded by `timeout`.
#[instrument(level = "debug")]
pub(crate) async fn connect(addr: &str, timeout: Option<Duration>) -> Result<Connection<TcpStream>> {
    let stream = match timeout {
        Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Io {
                source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
            })??,
        None => TcpStream::connect(addr).await?,
    };
    debug!(addr, "connected");
    Ok(Connection::new(stream))
}

/// Runs AUTH, SELECT and CLIENT SETNAME as configured.
///
/// A rejected AUTH maps to [`Error::Auth`]; other rejections to
/// [`Error::Server`].
pub(crate) async fn handshake<S>(connection: &mut Connection<S>, handshake: &Handshake) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(password) = &handshake.password {
        let cmd = match &handshake.username {
            Some(username) => command::auth_with_username(username.clone(), password.clone()),
            None => command::auth(password.clone()),
        };
        connection.write_frame(&cmd.into_frame()).await?;
        if let crate::proto::frame::Frame::Error(_) = connection.read_frame().await? {
            return Err(Error::Auth);
        }
    }

    if let Some(db) = handshake.database {
        connection.write_frame(&command::select(db).into_frame()).await?;
        command::parse_frame_response(connection.read_frame().await?)?;
    }

    if let Some(name) = &handshake.client_name {
        let cmd = command::client_setname(name.clone());
        connection.write_frame(&cmd.into_frame()).await?;
        command::parse_frame_response(connection.read_frame().await?)?;
    }

    Ok(())
}
