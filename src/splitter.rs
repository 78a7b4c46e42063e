//! Two-of-two XOR secret splitting.
//!
//! `share_a` is fresh CSPRNG output and `share_b = secret ^ share_a`, so each
//! share alone is uniformly distributed and independent of the secret.
//! `share_a ^ share_b == secret` holds for every pair produced here.

use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::error::{DualVaultError, Result};
use crate::keys::{Share, SymmetricKey};

/// Split a symmetric key into two shares.
pub fn split(secret: &SymmetricKey) -> Result<(Share, Share)> {
    let share_a = crypto::generate_random_key()?;

    let mut share_b = [0u8; KEY_LEN];
    for (out, (s, a)) in share_b
        .iter_mut()
        .zip(secret.as_bytes().iter().zip(share_a.iter()))
    {
        *out = s ^ a;
    }

    Ok((Share::from_bytes(share_a), Share::from_bytes(share_b)))
}

/// XOR two equal-length buffers.
///
/// Pure and total over equal-length inputs; `LengthMismatch` otherwise.
pub fn combine(share_a: &[u8], share_b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if share_a.len() != share_b.len() {
        return Err(DualVaultError::LengthMismatch {
            left: share_a.len(),
            right: share_b.len(),
        });
    }
    Ok(Zeroizing::new(
        share_a.iter().zip(share_b).map(|(a, b)| a ^ b).collect(),
    ))
}

/// Recombine two shares into the symmetric key they were split from.
pub fn combine_shares(share_a: &Share, share_b: &Share) -> Result<SymmetricKey> {
    let combined = combine(share_a.as_bytes(), share_b.as_bytes())?;
    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&combined);
    Ok(SymmetricKey::from_bytes(bytes))
}
