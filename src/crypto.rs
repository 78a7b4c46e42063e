//! Low-level cryptographic operations.
//!
//! This module is the only place in the crate that drives `ring`'s AEAD and
//! random number generator directly. All other modules encrypt, decrypt and
//! draw randomness exclusively through the functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **IV / nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)
//! - **Tag**: 128 bits (16 bytes)

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{DualVaultError, Result};

/// The AEAD algorithm used throughout dualvault.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Size of a symmetric key or share in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Output of a detached-tag encryption: the payload fields of an envelope.
pub(crate) struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Fill `buf` from the system CSPRNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| DualVaultError::RandomnessFailure)
}

/// Generate a fresh random IV. There is no IV caching or counter-based generation.
pub(crate) fn generate_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    fill_random(&mut iv)?;
    Ok(iv)
}

/// Generate 256 bits of random key material.
pub(crate) fn generate_random_key() -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    fill_random(&mut key)?;
    Ok(key)
}

fn less_safe_key(key_bytes: &[u8; KEY_LEN]) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| DualVaultError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `(key, iv)`, returning ciphertext and tag separately.
///
/// The caller owns the IV and must never reuse it with the same key.
pub(crate) fn encrypt_detached(
    key_bytes: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Sealed> {
    let key = less_safe_key(key_bytes)?;
    let nonce = Nonce::assume_unique_for_key(*iv);

    let mut ciphertext = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(nonce, Aad::empty(), &mut ciphertext)
        .map_err(|_| DualVaultError::InvalidKey)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());
    Ok(Sealed {
        ciphertext,
        tag: tag_bytes,
    })
}

/// Decrypt a detached-tag ciphertext.
///
/// If the key, IV, tag or ciphertext is wrong the GCM check fails and the
/// caller receives `Authentication`, never partial plaintext.
pub(crate) fn decrypt_detached(
    key_bytes: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
    what: &'static str,
) -> Result<Vec<u8>> {
    let key = less_safe_key(key_bytes)?;
    let nonce = Nonce::assume_unique_for_key(*iv);

    let mut buf = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    buf.extend_from_slice(ciphertext);
    buf.extend_from_slice(tag);

    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut buf)
        .map_err(|_| DualVaultError::Authentication(what))?;
    Ok(plaintext.to_vec())
}

/// Encrypt with a fresh nonce bundled into the output.
///
/// # Layout of returned bytes
/// ```text
/// [ nonce (12 bytes) ][ ciphertext ][ GCM tag (16 bytes) ]
/// ```
pub(crate) fn seal(key_bytes: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let iv = generate_iv()?;
    let sealed = encrypt_detached(key_bytes, &iv, plaintext)?;

    let mut output = Vec::with_capacity(IV_LEN + sealed.ciphertext.len() + TAG_LEN);
    output.extend_from_slice(&iv);
    output.extend_from_slice(&sealed.ciphertext);
    output.extend_from_slice(&sealed.tag);
    Ok(output)
}

/// Open the layout produced by [`seal`].
pub(crate) fn open(key_bytes: &[u8; KEY_LEN], sealed: &[u8], what: &'static str) -> Result<Vec<u8>> {
    if sealed.len() < IV_LEN + TAG_LEN {
        return Err(DualVaultError::Authentication(what));
    }
    let (iv, rest) = sealed.split_at(IV_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

    let iv: [u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| DualVaultError::Authentication(what))?;
    let tag: [u8; TAG_LEN] = tag
        .try_into()
        .map_err(|_| DualVaultError::Authentication(what))?;
    decrypt_detached(key_bytes, &iv, ciphertext, &tag, what)
}
