//! Error types for dualvault.
//!
//! Every variant is a distinct failure mode of the dual-key protocol.
//! Messages signal *what* failed without echoing key material, shares,
//! IVs or tags.

use std::fmt;

use thiserror::Error;

/// Boxed error returned by an external collaborator (KMS or KEM backend).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The step of `encrypt` that failed. Carried by [`DualVaultError::Encryption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptStage {
    /// The Kyber public key was rejected before any work was done.
    KeyValidity,
    /// Generating the symmetric key or IV.
    KeyGeneration,
    /// AES-256-GCM over the plaintext.
    PayloadEncryption,
    /// Splitting the symmetric key into shares.
    SecretSplit,
    /// Delegating share A to the KMS.
    KmsEncrypt,
    /// KEM encapsulation against the Kyber public key.
    KemEncapsulate,
    /// Deriving the wrapping key and wrapping share B.
    ShareWrap,
}

impl fmt::Display for EncryptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeyValidity => "key-validity",
            Self::KeyGeneration => "key-generation",
            Self::PayloadEncryption => "payload-encryption",
            Self::SecretSplit => "secret-split",
            Self::KmsEncrypt => "kms-encrypt",
            Self::KemEncapsulate => "kem-encapsulate",
            Self::ShareWrap => "share-wrap",
        };
        f.write_str(name)
    }
}

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Kms,
    Kem,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kms => f.write_str("kms"),
            Self::Kem => f.write_str("kem"),
        }
    }
}

/// The single error type for all dualvault operations.
#[derive(Debug, Error)]
pub enum DualVaultError {
    /// The envelope is malformed or carries an unsupported algorithm version.
    #[error("invalid envelope: {0}")]
    Validation(String),

    /// The supplied Kyber key pair is not the one the envelope was sealed to.
    #[error("key mismatch: envelope sealed to {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    /// No key pair with this id is held by the key ring.
    #[error("unknown key id: {0}")]
    UnknownKey(String),

    /// A GCM tag check failed. Always fatal.
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    /// The KEM backend could not produce a key pair.
    #[error("key generation failed: {0}")]
    Generation(String),

    /// A serialized key pair could not be imported.
    #[error("invalid key format: {0}")]
    Format(String),

    /// Two buffers that must be of equal length were not.
    #[error("length mismatch: {left} vs {right} bytes")]
    LengthMismatch { left: usize, right: usize },

    /// The KMS or KEM backend returned an error.
    #[error("{collaborator} collaborator failed: {source}")]
    Collaborator {
        collaborator: Collaborator,
        #[source]
        source: BoxError,
    },

    /// `encrypt` aborted. No partial envelope was produced.
    #[error("encryption failed at {stage}: {source}")]
    Encryption {
        stage: EncryptStage,
        #[source]
        source: Box<DualVaultError>,
    },

    /// The Kyber key pair is past its `expires_at` and may not seal new data.
    #[error("key {0} has expired")]
    KeyExpired(String),

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// A symmetric key was rejected by the cipher.
    #[error("invalid key")]
    InvalidKey,

    /// Configuration could not be loaded or is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DualVaultError {
    /// Attach the failing `encrypt` stage to an error.
    pub(crate) fn at_stage(self, stage: EncryptStage) -> Self {
        Self::Encryption {
            stage,
            source: Box::new(self),
        }
    }

    pub(crate) fn kms(source: BoxError) -> Self {
        Self::Collaborator {
            collaborator: Collaborator::Kms,
            source,
        }
    }

    pub(crate) fn kem(source: BoxError) -> Self {
        Self::Collaborator {
            collaborator: Collaborator::Kem,
            source,
        }
    }

    /// The stage at which `encrypt` failed, if this is an encryption error.
    pub fn stage(&self) -> Option<EncryptStage> {
        match self {
            Self::Encryption { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DualVaultError>;
