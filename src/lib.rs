//! # dualvault
//!
//! Dual-key envelope encryption for sensitive uploads at rest.
//!
//! Each payload is encrypted under a one-time AES-256-GCM key. That key is
//! split into two XOR shares: one is encrypted by an HSM-backed KMS key, the
//! other is wrapped under a Kyber768 KEM secret. Recovering the plaintext
//! needs both, so compromise of either cryptosystem alone exposes nothing.
//!
//! ## Public API
//!
//! - [`KeyManager`] / [`KeyRing`]: Kyber key-pair lifecycle and rotation.
//! - [`HybridCipher`]: `encrypt`, `decrypt`, `reencrypt`.
//! - [`envelope`]: wire format, integrity check, audit-safe metadata.
//! - [`derive_content_id`]: plaintext-derived ids.
//! - [`splitter`]: the XOR secret splitter.
//! - [`KmsClient`] / [`Kem`]: the two injected collaborators.
//!
//! Key material never leaves the crate except through an explicit
//! key-pair export.

pub(crate) mod crypto;
pub mod audit;
pub mod config;
pub mod content;
pub mod envelope;
pub mod error;
pub mod hybrid;
pub mod kem;
pub mod key_manager;
pub(crate) mod keys;
pub mod kms;
pub mod splitter;

pub use config::DualVaultConfig;
pub use content::derive_content_id;
pub use envelope::{
    can_decrypt_envelope, get_envelope_metadata, verify_envelope_integrity, Envelope,
    EnvelopeMetadata, ALGORITHM_VERSION,
};
pub use error::{DualVaultError, EncryptStage, Result};
pub use hybrid::HybridCipher;
pub use kem::{Kem, Kyber768};
pub use key_manager::{ExportedKeyPair, KeyManager, KeyRing, KyberKeyPair, KyberPublicKey};
pub use keys::{Share, SymmetricKey};
pub use kms::{KmsClient, KmsKeyPair};
