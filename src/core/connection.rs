use std::fmt;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;

const READ_CHUNK: usize = 4096;

/// A connection to a Redis server.
///
/// This struct wraps an underlying stream (usually TCP) and handles RESP
/// frame encoding and decoding. Use it directly for the request/response
/// handshake, then [`split`](Connection::split) it once the connection
/// enters subscribed state and reads and writes become independent.
///
/// # Example
///
/// ```no_run
/// use submux::core::connection::Connection;
/// use submux::core::command;
/// use tokio::net::TcpStream;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let stream = TcpStream::connect("127.0.0.1:6379").await?;
///     let mut conn = Connection::new(stream);
///
///     conn.write_frame(&command::ping().into_frame()).await?;
///     let resp = conn.read_frame().await?;
///     println!("{:?}", resp);
///
///     Ok(())
/// }
/// ```
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection with the given stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
        }
    }

    /// Writes a frame to the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the stream fails
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), io::Error> {
        write_frame(&mut self.stream, &mut self.encoder, frame).await
    }

    /// Reads a frame from the connection.
    ///
    /// Handles partial reads internally and continues reading until a
    /// complete frame is received.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectionClosed`] on EOF, [`crate::Error::Decode`]
    /// on malformed input and [`crate::Error::Io`] on read failures
    pub async fn read_frame(&mut self) -> crate::Result<Frame> {
        read_frame(&mut self.stream, &mut self.decoder).await
    }

    /// Splits the connection into independently owned read and write halves.
    ///
    /// Bytes already buffered by the decoder stay with the reader.
    pub fn split(self) -> (ConnectionReader<S>, ConnectionWriter<S>) {
        let (read, write) = io::split(self.stream);
        (
            ConnectionReader {
                stream: read,
                decoder: self.decoder,
            },
            ConnectionWriter {
                stream: write,
                encoder: self.encoder,
            },
        )
    }
}

impl<S> fmt::Debug for Connection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .finish()
    }
}

/// Read half of a split [`Connection`].
pub struct ConnectionReader<S> {
    stream: ReadHalf<S>,
    decoder: Decoder,
}

impl<S> ConnectionReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the next complete frame.
    pub async fn read_frame(&mut self) -> crate::Result<Frame> {
        read_frame(&mut self.stream, &mut self.decoder).await
    }
}

/// Write half of a split [`Connection`].
pub struct ConnectionWriter<S> {
    stream: WriteHalf<S>,
    encoder: Encoder,
}

impl<S> ConnectionWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Encodes and writes a frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), io::Error> {
        write_frame(&mut self.stream, &mut self.encoder, frame).await
    }
}

async fn write_frame<W>(stream: &mut W, encoder: &mut Encoder, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    encoder.encode(frame);
    let data = encoder.take();
    stream.write_all(&data).await?;
    stream.flush().await
}

async fn read_frame<R>(stream: &mut R, decoder: &mut Decoder) -> crate::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    loop {
        if let Some(frame) = decoder.decode()? {
            return Ok(frame);
        }
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(crate::Error::ConnectionClosed);
        }
        decoder.append(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connection_ping_pong() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let frame = conn.read_frame().await.unwrap();
            assert_eq!(
                frame,
                Frame::Array(vec![Frame::BulkString(Some("PING".into()))])
            );
            conn.write_frame(&Frame::SimpleString(b"PONG".to_vec()))
                .await
                .unwrap();
        };

        let client = async {
            let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let mut conn = Connection::new(stream);
            conn.write_frame(&Frame::Array(vec![Frame::BulkString(Some("PING".into()))]))
                .await
                .unwrap();
            let frame = conn.read_frame().await.unwrap();
            assert_eq!(frame, Frame::SimpleString(b"PONG".to_vec()));
        };

        tokio::join!(server, client);
    }

    #[tokio::test]
    async fn test_split_halves_keep_buffered_frames() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b":1\r\n:2\r\n").await.unwrap();

        let mut conn = Connection::new(client);
        assert_eq!(conn.read_frame().await.unwrap(), Frame::Integer(1));

        let (mut reader, mut writer) = conn.split();
        assert_eq!(reader.read_frame().await.unwrap(), Frame::Integer(2));

        writer
            .write_frame(&Frame::BulkString(Some(Bytes::from("x"))))
            .await
            .unwrap();
        let mut out = [0u8; 7];
        server.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"$1\r\nx\r\n");
    }

    #[tokio::test]
    async fn test_read_frame_eof_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut conn = Connection::new(client);
        assert!(matches!(
            conn.read_frame().await,
            Err(crate::Error::ConnectionClosed)
        ));
    }
}
