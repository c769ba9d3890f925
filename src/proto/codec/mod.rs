//! RESP codec.
//!
//! [`Decoder`] turns incoming bytes into [`Frame`](crate::proto::frame::Frame)s
//! incrementally; [`Encoder`] serializes frames for the wire.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;
