//! Ephemeral key material and wrapping-key derivation.
//!
//! This module owns two responsibilities:
//! 1. Holding the per-call symmetric key and its two shares in types that are
//!    opaque, non-cloneable, and zeroised on drop.
//! 2. Deriving the share-wrapping key from a KEM shared secret using
//!    HKDF-SHA256.
//!
//! ## Derivation structure
//!
//! ```text
//! HKDF-SHA256(
//!     ikm  = kem_shared_secret,
//!     salt = None,
//!     info = "{algorithm_version}:share-wrap"
//! )
//! ```
//!
//! The info string is bound to the envelope's algorithm version, so a change
//! of construction is always accompanied by a new version tag.

use ring::hkdf;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN};
use crate::error::{DualVaultError, Result};

// ---------------------------------------------------------------------------
// Symmetric key
// ---------------------------------------------------------------------------

/// The 256-bit data key for one encrypt or decrypt call.
///
/// - Not `Clone`. Exists only within one call.
/// - Zeroised on drop.
/// - Never serialised, never logged (no `Debug` impl).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Draw a fresh random key.
    pub(crate) fn generate() -> Result<Self> {
        Ok(Self {
            bytes: crypto::generate_random_key()?,
        })
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

/// One half of an XOR-split symmetric key. Meaningless in isolation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Share {
    bytes: [u8; KEY_LEN],
}

impl Share {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a share from an unwrapped or KMS-decrypted buffer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| DualVaultError::LengthMismatch {
                left: bytes.len(),
                right: KEY_LEN,
            })?;
        Ok(Self { bytes: arr })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Share(..)")
    }
}

// ---------------------------------------------------------------------------
// Wrapping key
// ---------------------------------------------------------------------------

/// Key that wraps share B. Derived from the KEM shared secret, zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct WrappingKey {
    bytes: [u8; KEY_LEN],
}

impl WrappingKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

/// Derive the share-wrapping key from a KEM shared secret.
///
/// # Security properties
/// - HKDF is one-way: the wrapping key reveals nothing about the shared secret.
/// - The version-bound info string separates this key from any other use of
///   the same secret.
pub(crate) fn derive_wrapping_key(
    shared_secret: &[u8],
    algorithm_version: &str,
) -> Result<WrappingKey> {
    if shared_secret.is_empty() {
        return Err(DualVaultError::InvalidKey);
    }
    let info = format!("{}:share-wrap", algorithm_version);

    // Empty salt: HKDF treats it as a zero-filled salt of hash length.
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
    let prk = salt.extract(shared_secret);

    let info_slices = [info.as_bytes()];
    let okm = prk
        .expand(&info_slices, hkdf::HKDF_SHA256)
        .map_err(|_| DualVaultError::InvalidKey)?;

    let mut derived = [0u8; KEY_LEN];
    okm.fill(&mut derived).map_err(|_| DualVaultError::InvalidKey)?;

    Ok(WrappingKey { bytes: derived })
}
