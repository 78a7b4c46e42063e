//! Shared fixtures: an in-process stand-in for the remote KMS.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use dualvault::error::BoxError;
use dualvault::{KmsClient, KmsKeyPair};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

pub const KEY_PATH: &str = "projects/leave-app/locations/global/keyRings/docs/cryptoKeys/share-a";

/// Simulates an HSM-backed KMS: one secret per `(key_path, key_version)`
/// that never leaves the struct. Ciphertexts are `nonce || ct || tag`.
pub struct StubKms {
    keys: HashMap<(String, String), [u8; 32]>,
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
}

impl StubKms {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    /// Provision a key version and return its public description.
    pub fn create_key(&mut self, key_version: &str) -> KmsKeyPair {
        let mut secret = [0u8; 32];
        SystemRandom::new().fill(&mut secret).unwrap();
        self.keys
            .insert((KEY_PATH.to_string(), key_version.to_string()), secret);
        KmsKeyPair {
            key_path: KEY_PATH.to_string(),
            key_version: key_version.to_string(),
            public_key: format!(
                "-----BEGIN PUBLIC KEY-----\nstub-{key_version}\n-----END PUBLIC KEY-----\n"
            ),
            algorithm: "RSA_DECRYPT_OAEP_3072_SHA256".to_string(),
        }
    }

    fn key(&self, key_path: &str, key_version: &str) -> Result<LessSafeKey, BoxError> {
        let secret = self
            .keys
            .get(&(key_path.to_string(), key_version.to_string()))
            .ok_or_else(|| format!("NOT_FOUND: {key_path}/cryptoKeyVersions/{key_version}"))?;
        let unbound = UnboundKey::new(&AES_256_GCM, secret).map_err(|_| "bad stub key")?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl KmsClient for StubKms {
    fn asymmetric_encrypt(&self, key: &KmsKeyPair, plaintext: &[u8]) -> Result<Vec<u8>, BoxError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let sealing = self.key(&key.key_path, &key.key_version)?;

        let mut nonce = [0u8; 12];
        SystemRandom::new().fill(&mut nonce).map_err(|_| "rng failure")?;
        let mut out = plaintext.to_vec();
        sealing
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut out)
            .map_err(|_| "seal failure")?;

        let mut ciphertext = nonce.to_vec();
        ciphertext.extend_from_slice(&out);
        Ok(ciphertext)
    }

    fn asymmetric_decrypt(
        &self,
        key_path: &str,
        key_version: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BoxError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let opening = self.key(key_path, key_version)?;
        if ciphertext.len() < 12 {
            return Err("INVALID_ARGUMENT: ciphertext too short".into());
        }
        let (nonce, body) = ciphertext.split_at(12);
        let nonce: [u8; 12] = nonce.try_into().map_err(|_| "bad nonce")?;
        let mut buf = body.to_vec();
        let plaintext = opening
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut buf)
            .map_err(|_| "INVALID_ARGUMENT: decryption failed")?;
        Ok(Zeroizing::new(plaintext.to_vec()))
    }
}

/// KMS whose every call fails, as when the remote service is unreachable.
pub struct UnreachableKms;

impl KmsClient for UnreachableKms {
    fn asymmetric_encrypt(&self, _: &KmsKeyPair, _: &[u8]) -> Result<Vec<u8>, BoxError> {
        Err("UNAVAILABLE: connection reset".into())
    }

    fn asymmetric_decrypt(&self, _: &str, _: &str, _: &[u8]) -> Result<Zeroizing<Vec<u8>>, BoxError> {
        Err("UNAVAILABLE: connection reset".into())
    }
}
