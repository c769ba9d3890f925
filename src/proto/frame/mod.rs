//! RESP frame types.
//!
//! This module defines the frame types exchanged on a pub/sub connection:
//! simple strings, errors, integers, bulk strings, arrays and null.

/// Frame type definitions.
pub mod types;

pub use types::Frame;
