//! Redis Cluster slot calculation.
//!
//! Redis Cluster uses CRC16 to map keys to slots (0-16383).
//! This module provides utilities for calculating slot numbers from keys.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16/XMODEM algorithm used by Redis (poly 0x1021, init 0, no reflection).
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculates the Redis Cluster slot for a given key.
///
/// Redis uses CRC16 modulo 16384 for slot calculation.
/// If the key contains `{...}` with at least one byte between the braces,
/// only the content inside the braces is used for hashing (hash tags).
///
/// Keys are arbitrary bytes; `&str`, `String`, `Bytes` and `&[u8]` all work.
///
/// # Examples
///
/// ```
/// use submux::key_slot;
///
/// assert_eq!(key_slot("foo"), 12182);
/// assert_eq!(key_slot(""), 0);
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// ```
pub fn key_slot(key: impl AsRef<[u8]>) -> u16 {
    let hash_key = hash_tag(key.as_ref());
    CRC16.checksum(hash_key) % SLOT_COUNT
}

/// Returns `true` when every key maps to the same slot.
///
/// Multi-key commands in a cluster only succeed when this holds. An empty
/// or single-key input trivially qualifies.
///
/// # Examples
///
/// ```
/// use submux::same_slot;
///
/// assert!(same_slot(["{order:7}.items", "{order:7}.total"]));
/// assert!(!same_slot(["foo", "bar"]));
/// ```
pub fn same_slot<I, K>(keys: I) -> bool
where
    I: IntoIterator<Item = K>,
    K: AsRef<[u8]>,
{
    let mut slots = keys.into_iter().map(key_slot);
    match slots.next() {
        Some(first) => slots.all(|slot| slot == first),
        None => true,
    }
}

/// Extracts the hash tag from a key.
///
/// - `{user1000}.following` → `user1000`
/// - `foo{bar}{zap}` → `bar` (only the first pair counts)
/// - `foo{}bar` → whole key (empty tag)
/// - `foo{bar` → whole key (unterminated)
fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        let rest = &key[open + 1..];
        if let Some(close) = rest.iter().position(|&b| b == b'}') {
            if close > 0 {
                return &rest[..close];
            }
        }
    }

    key
}
