//! # Cluster slot routing
//!
//! Maps keys to Redis Cluster hash slots so callers can decide which node
//! (and therefore which pub/sub connection) owns a key.
//!
//! ## Features
//!
//! - **Slot calculation**: CRC16/XMODEM modulo 16384, bit-compatible with the server
//! - **Hash tags**: Only the first non-empty `{...}` section is hashed
//! - **Co-location checks**: [`same_slot`] for multi-key operations
//!
//! Topology discovery and MOVED/ASK handling are left to the caller.
//!
//! ## Example
//!
//! ```
//! use submux::cluster::{key_slot, SLOT_COUNT};
//!
//! let slot = key_slot("{user:42}:inbox");
//! assert!(slot < SLOT_COUNT);
//! assert_eq!(slot, key_slot("{user:42}:outbox"));
//! ```

mod slot;

pub use slot::{key_slot, same_slot, SLOT_COUNT};
