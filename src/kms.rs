//! Classical KMS collaborator.
//!
//! The private half of the KMS key pair lives in an HSM behind a remote
//! service and never materialises in this process. Everything this crate
//! needs from it goes through [`KmsClient`]; transport, credentials and
//! retry policy belong to the implementation the caller injects.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::BoxError;

/// Public half of an HSM-backed asymmetric key, plus its resource coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmsKeyPair {
    /// Resource path of the key, e.g. `projects/p/locations/l/keyRings/r/cryptoKeys/k`.
    pub key_path: String,
    pub key_version: String,
    /// PEM-encoded public key.
    pub public_key: String,
    /// Algorithm name as reported by the KMS.
    pub algorithm: String,
}

/// Asymmetric encrypt/decrypt contract of the remote KMS.
///
/// Failures are fatal for the current operation. Implementations must not
/// retry internally on behalf of this crate.
pub trait KmsClient: Send + Sync {
    /// Encrypt `plaintext` to the public half of `key`.
    fn asymmetric_encrypt(&self, key: &KmsKeyPair, plaintext: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// Decrypt `ciphertext` with the HSM-held private key at `key_path`/`key_version`.
    fn asymmetric_decrypt(
        &self,
        key_path: &str,
        key_version: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BoxError>;
}
