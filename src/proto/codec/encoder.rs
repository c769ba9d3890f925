use bytes::{BufMut, BytesMut};

use crate::proto::frame::Frame;

/// A RESP encoder that converts [`Frame`] types to bytes.
///
/// The encoder accumulates data in an internal buffer and can be used
/// to encode multiple frames sequentially before a single write.
///
/// # Example
///
/// ```
/// use submux::proto::codec::Encoder;
/// use submux::proto::frame::Frame;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Frame::Integer(1));
/// assert_eq!(encoder.take().as_ref(), b":1\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a frame into the internal buffer using RESP protocol.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.line(b'+', s),
            Frame::Error(e) => self.line(b'-', e),
            Frame::Integer(n) => self.line(b':', n.to_string().as_bytes()),
            Frame::BulkString(Some(data)) => {
                self.line(b'$', data.len().to_string().as_bytes());
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(None) | Frame::Null => self.buf.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                self.line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
        }
    }

    /// Takes the encoded data from the buffer, leaving it empty.
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }

    fn line(&mut self, tag: u8, body: &[u8]) {
        self.buf.put_u8(tag);
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_encode_simple_values() {
        let mut encoder = Encoder::new();
        encoder.encode(&Frame::SimpleString(b"OK".to_vec()));
        encoder.encode(&Frame::Error(b"ERR".to_vec()));
        encoder.encode(&Frame::Integer(42));
        assert_eq!(encoder.take().as_ref(), b"+OK\r\n-ERR\r\n:42\r\n");
    }

    #[test]
    fn test_encode_null_forms() {
        let mut encoder = Encoder::new();
        encoder.encode(&Frame::BulkString(None));
        encoder.encode(&Frame::Null);
        assert_eq!(encoder.take().as_ref(), b"$-1\r\n$-1\r\n");
    }

    #[test]
    fn test_encode_subscribe_command() {
        let mut encoder = Encoder::new();
        encoder.encode(&Frame::Array(vec![
            Frame::BulkString(Some(Bytes::from("SUBSCRIBE"))),
            Frame::BulkString(Some(Bytes::from("news"))),
        ]));
        assert_eq!(
            encoder.take().as_ref(),
            b"*2\r\n$9\r\nSUBSCRIBE\r\n$4\r\nnews\r\n"
        );
    }

    #[test]
    fn test_take_resets_buffer() {
        let mut encoder = Encoder::new();
        encoder.encode(&Frame::Integer(1));
        let _ = encoder.take();
        assert!(encoder.take().is_empty());
    }
}
