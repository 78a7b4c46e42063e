//! Content-derived identifiers.
//!
//! Ids are computed over plaintext, never ciphertext: ciphertext is
//! randomised per call and would defeat deduplication.

use ring::digest::{digest, SHA256};

/// Length of a content id in bytes (128 bits).
pub const CONTENT_ID_LEN: usize = 16;

/// SHA-256 of `data`, truncated to 128 bits, as 32 lower-case hex characters.
pub fn derive_content_id(data: &[u8]) -> String {
    let hash = digest(&SHA256, data);
    hex::encode(&hash.as_ref()[..CONTENT_ID_LEN])
}
