//! # Submux Proto
//!
//! RESP (Redis Serialization Protocol) codec used by the pub/sub connection.
//!
//! ## Modules
//!
//! - [`codec`] - Encoder and decoder for RESP protocol
//! - [`error`] - Error types for protocol operations
//! - [`frame`] - Frame types representing RESP data structures

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;
