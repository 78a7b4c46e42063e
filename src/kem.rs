//! Post-quantum KEM collaborator.
//!
//! The [`Kem`] trait is the call contract the rest of the crate relies on:
//! key-pair generation, encapsulation and decapsulation over raw byte
//! buffers. [`Kyber768`] is the production backend (NIST ML-KEM-768
//! equivalent via `pqcrypto-kyber`).
//!
//! ## Key sizes (Kyber768)
//!
//! - Public key: 1,184 bytes
//! - Private key: 2,400 bytes
//! - Ciphertext: 1,088 bytes
//! - Shared secret: 32 bytes

use pqcrypto_kyber::kyber768;
use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _};
use zeroize::Zeroizing;

use crate::error::BoxError;

/// A freshly generated KEM key pair as raw bytes.
pub struct KemKeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Zeroizing<Vec<u8>>,
}

/// Call contract for a key encapsulation mechanism.
///
/// Byte sizes are fixed by the algorithm and validated by the key manager on
/// import. Implementations report failures as boxed errors; the caller tags
/// them as collaborator failures.
pub trait Kem: Send + Sync {
    /// Algorithm tag written into serialized key pairs.
    const ALGORITHM: &'static str;
    const PUBLIC_KEY_LEN: usize;
    const PRIVATE_KEY_LEN: usize;
    const CIPHERTEXT_LEN: usize;

    fn generate_keypair(&self) -> Result<KemKeyPair, BoxError>;

    /// Returns `(ciphertext, shared_secret)`.
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), BoxError>;

    fn decapsulate(
        &self,
        private_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BoxError>;
}

/// Kyber768 backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kyber768;

impl Kem for Kyber768 {
    const ALGORITHM: &'static str = "KYBER768";
    const PUBLIC_KEY_LEN: usize = kyber768::public_key_bytes();
    const PRIVATE_KEY_LEN: usize = kyber768::secret_key_bytes();
    const CIPHERTEXT_LEN: usize = kyber768::ciphertext_bytes();

    fn generate_keypair(&self) -> Result<KemKeyPair, BoxError> {
        let (pk, sk) = kyber768::keypair();
        Ok(KemKeyPair {
            public_key: pk.as_bytes().to_vec(),
            private_key: Zeroizing::new(sk.as_bytes().to_vec()),
        })
    }

    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), BoxError> {
        let pk = kyber768::PublicKey::from_bytes(public_key)
            .map_err(|e| format!("invalid Kyber public key: {:?}", e))?;
        let (ss, ct) = kyber768::encapsulate(&pk);
        Ok((ct.as_bytes().to_vec(), Zeroizing::new(ss.as_bytes().to_vec())))
    }

    fn decapsulate(
        &self,
        private_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BoxError> {
        let sk = kyber768::SecretKey::from_bytes(private_key)
            .map_err(|e| format!("invalid Kyber private key: {:?}", e))?;
        let ct = kyber768::Ciphertext::from_bytes(ciphertext)
            .map_err(|e| format!("invalid Kyber ciphertext: {:?}", e))?;
        let ss = kyber768::decapsulate(&ct, &sk);
        Ok(Zeroizing::new(ss.as_bytes().to_vec()))
    }
}
