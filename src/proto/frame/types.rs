use bytes::Bytes;

/// A RESP2 (Redis Serialization Protocol) frame.
///
/// Only the value kinds that appear on a pub/sub connection are modelled:
/// - SimpleString: Status responses like "OK"
/// - Error: Error responses from the server
/// - Integer: Subscription counts and PUBLISH receiver counts
/// - BulkString: Channel names, patterns and payloads
/// - Array: Commands and push messages
/// - Null: NULL value
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null ($-1 or *-1).
    Null,
}

impl Frame {
    /// Returns the payload of a non-null bulk string or simple string.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Frame::BulkString(Some(b)) => Some(b.clone()),
            Frame::SimpleString(s) => Some(Bytes::copy_from_slice(s)),
            _ => None,
        }
    }

    /// Returns the integer value of an `Integer` frame.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the error text of an `Error` frame.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Frame::Error(e) => Some(String::from_utf8_lossy(e).into_owned()),
            _ => None,
        }
    }
}
