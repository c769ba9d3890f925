use crate::proto::frame::Frame;
use bytes::Bytes;

/// A command ready to be sent to Redis.
///
/// Commands are built using the builder pattern and converted to frames
/// for transmission over the connection.
///
/// # Example
///
/// ```
/// use submux::core::command::{subscribe, Cmd};
/// use bytes::Bytes;
///
/// let cmd = Cmd::new("PUBLISH").arg("news").arg("hello");
/// let sub = subscribe(&[Bytes::from("news")]);
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The command name (e.g., "SUBSCRIBE", "PING")
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends every argument in order.
    #[inline]
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Converts the command to a RESP Array frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(
            self.args
                .into_iter()
                .map(|b| Frame::BulkString(Some(b)))
                .collect(),
        )
    }
}

/// Creates a SUBSCRIBE command for the given channels.
#[inline]
pub fn subscribe(channels: &[Bytes]) -> Cmd {
    Cmd::new("SUBSCRIBE").args(channels.iter().cloned())
}

/// Creates an UNSUBSCRIBE command for the given channels.
#[inline]
pub fn unsubscribe(channels: &[Bytes]) -> Cmd {
    Cmd::new("UNSUBSCRIBE").args(channels.iter().cloned())
}

/// Creates a PSUBSCRIBE command for the given glob patterns.
#[inline]
pub fn psubscribe(patterns: &[Bytes]) -> Cmd {
    Cmd::new("PSUBSCRIBE").args(patterns.iter().cloned())
}

/// Creates a PUNSUBSCRIBE command for the given glob patterns.
#[inline]
pub fn punsubscribe(patterns: &[Bytes]) -> Cmd {
    Cmd::new("PUNSUBSCRIBE").args(patterns.iter().cloned())
}

/// Creates a PUBLISH command.
///
/// Must be sent on a regular connection; a connection in subscribed state
/// only accepts the (P)SUBSCRIBE family, PING and QUIT.
#[inline]
pub fn publish(channel: impl Into<Bytes>, payload: impl Into<Bytes>) -> Cmd {
    Cmd::new("PUBLISH").arg(channel).arg(payload)
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates an AUTH command with password only.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates an AUTH command with username and password (ACL style).
#[inline]
pub fn auth_with_username(username: impl Into<Bytes>, password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(username).arg(password)
}

/// Creates a SELECT command.
#[inline]
pub fn select(db: u8) -> Cmd {
    Cmd::new("SELECT").arg(db.to_string())
}

/// Creates a CLIENT SETNAME command.
#[inline]
pub fn client_setname(name: impl Into<Bytes>) -> Cmd {
    Cmd::new("CLIENT").arg("SETNAME").arg(name)
}

/// Parses a frame as a Redis response, turning error replies into [`crate::Error::Server`].
#[inline]
pub fn parse_frame_response(frame: Frame) -> Result<Frame, crate::Error> {
    match frame {
        Frame::Error(e) => Err(crate::Error::Server {
            message: String::from_utf8_lossy(&e).into_owned(),
        }),
        _ => Ok(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &'static str) -> Frame {
        Frame::BulkString(Some(Bytes::from(s)))
    }

    #[test]
    fn test_subscribe_cmd() {
        let cmd = subscribe(&[Bytes::from("foo"), Bytes::from("bar")]);
        assert_eq!(
            cmd.into_frame(),
            Frame::Array(vec![bulk("SUBSCRIBE"), bulk("foo"), bulk("bar")])
        );
    }

    #[test]
    fn test_punsubscribe_cmd() {
        let cmd = punsubscribe(&[Bytes::from("foo*")]);
        assert_eq!(
            cmd.into_frame(),
            Frame::Array(vec![bulk("PUNSUBSCRIBE"), bulk("foo*")])
        );
    }

    #[test]
    fn test_unsubscribe_without_channels() {
        assert_eq!(
            unsubscribe(&[]).into_frame(),
            Frame::Array(vec![bulk("UNSUBSCRIBE")])
        );
    }

    #[test]
    fn test_publish_cmd() {
        assert_eq!(
            publish("news", "hello").into_frame(),
            Frame::Array(vec![bulk("PUBLISH"), bulk("news"), bulk("hello")])
        );
    }

    #[test]
    fn test_handshake_cmds() {
        assert_eq!(
            auth_with_username("app", "secret").into_frame(),
            Frame::Array(vec![bulk("AUTH"), bulk("app"), bulk("secret")])
        );
        assert_eq!(
            select(3).into_frame(),
            Frame::Array(vec![bulk("SELECT"), bulk("3")])
        );
        assert_eq!(
            client_setname("worker").into_frame(),
            Frame::Array(vec![bulk("CLIENT"), bulk("SETNAME"), bulk("worker")])
        );
    }

    #[test]
    fn test_parse_frame_response_error() {
        let result = parse_frame_response(Frame::Error(b"WRONGPASS invalid".to_vec()));
        assert!(matches!(result, Err(crate::Error::Server { message }) if message == "WRONGPASS invalid"));
        assert!(parse_frame_response(Frame::SimpleString(b"OK".to_vec())).is_ok());
    }
}
