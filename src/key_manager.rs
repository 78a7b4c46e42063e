//! Kyber key-pair lifecycle: generation, export/import and rotation.
//!
//! Expiry gates new encryptions only. Envelopes sealed under an expired key
//! stay decryptable, so retired pairs are kept in a [`KeyRing`] keyed by id.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::DualVaultConfig;
use crate::envelope::Envelope;
use crate::error::{DualVaultError, Result};
use crate::kem::{Kem, Kyber768};

// ---------------------------------------------------------------------------
// Key pair
// ---------------------------------------------------------------------------

/// A post-quantum key pair with its validity window.
///
/// The private key is owned by whichever party decrypts and never crosses
/// the trust boundary except through [`KeyManager::export_key_pair`].
#[derive(Clone)]
pub struct KyberKeyPair {
    key_id: String,
    public_key: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl KyberKeyPair {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    pub(crate) fn private_key_bytes(&self) -> &[u8] {
        &self.private_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The freely distributable half, tagged with its key id.
    pub fn public_key(&self) -> KyberPublicKey {
        KyberPublicKey {
            key_id: self.key_id.clone(),
            public_key: self.public_key.clone(),
            expires_at: self.expires_at,
        }
    }

    /// Byte-for-byte equality, private key included.
    pub fn same_material_as(&self, other: &KyberKeyPair) -> bool {
        self.key_id == other.key_id
            && self.public_key == other.public_key
            && *self.private_key == *other.private_key
            && self.created_at == other.created_at
            && self.expires_at == other.expires_at
    }
}

impl std::fmt::Debug for KyberKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KyberKeyPair")
            .field("key_id", &self.key_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Public half of a [`KyberKeyPair`]. Safe to hand to any encrypting party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KyberPublicKey {
    pub key_id: String,
    pub public_key: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl KyberPublicKey {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Serialized key pair. Round-trips through any JSON serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedKeyPair {
    /// Base64 public key.
    pub public_key: String,
    /// Base64 private key.
    pub private_key: String,
    pub key_id: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Key manager
// ---------------------------------------------------------------------------

/// Generates, exports and imports key pairs through a KEM backend.
#[derive(Debug, Clone)]
pub struct KeyManager<K: Kem = Kyber768> {
    kem: K,
    config: DualVaultConfig,
}

impl KeyManager<Kyber768> {
    pub fn new() -> Self {
        Self::with_kem(Kyber768, DualVaultConfig::default())
    }

    pub fn with_config(config: DualVaultConfig) -> Self {
        Self::with_kem(Kyber768, config)
    }
}

impl Default for KeyManager<Kyber768> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Kem> KeyManager<K> {
    pub fn with_kem(kem: K, config: DualVaultConfig) -> Self {
        Self { kem, config }
    }

    pub fn config(&self) -> &DualVaultConfig {
        &self.config
    }

    /// Generate a key pair valid for the configured default window.
    pub fn generate_default_key_pair(&self) -> Result<KyberKeyPair> {
        self.generate_key_pair(self.config.default_validity_days)
    }

    /// Generate a key pair valid for `validity_days` from now.
    pub fn generate_key_pair(&self, validity_days: u32) -> Result<KyberKeyPair> {
        if validity_days == 0 {
            return Err(DualVaultError::Generation(
                "validity must be at least one day".into(),
            ));
        }
        let pair = self
            .kem
            .generate_keypair()
            .map_err(|e| DualVaultError::Generation(e.to_string()))?;

        let created_at = Utc::now();
        let expires_at = expiry_after(created_at, validity_days)?;
        let key_id = format!("{}-{}", self.config.key_id_prefix, Uuid::new_v4());

        info!(key_id = %key_id, %expires_at, algorithm = K::ALGORITHM, "generated key pair");
        Ok(KyberKeyPair {
            key_id,
            public_key: pair.public_key,
            private_key: pair.private_key,
            created_at,
            expires_at,
        })
    }

    /// Serialize a key pair, private key included.
    pub fn export_key_pair(&self, pair: &KyberKeyPair) -> ExportedKeyPair {
        debug!(key_id = %pair.key_id, "exporting key pair");
        ExportedKeyPair {
            public_key: STANDARD.encode(&pair.public_key),
            private_key: STANDARD.encode(&*pair.private_key),
            key_id: pair.key_id.clone(),
            algorithm: K::ALGORITHM.to_string(),
            created_at: Some(pair.created_at),
            expires_at: Some(pair.expires_at),
        }
    }

    /// Rebuild a key pair from its serialized form.
    ///
    /// Rejects a foreign algorithm tag and any key whose decoded length
    /// differs from the KEM's fixed sizes.
    pub fn import_key_pair(&self, serialized: &ExportedKeyPair) -> Result<KyberKeyPair> {
        if serialized.algorithm != K::ALGORITHM {
            return Err(DualVaultError::Format(format!(
                "unsupported algorithm {:?}, expected {}",
                serialized.algorithm,
                K::ALGORITHM
            )));
        }
        if serialized.key_id.is_empty() {
            return Err(DualVaultError::Format("empty key id".into()));
        }

        let public_key = decode_exact(&serialized.public_key, K::PUBLIC_KEY_LEN, "public key")?;
        let private_key = Zeroizing::new(decode_exact(
            &serialized.private_key,
            K::PRIVATE_KEY_LEN,
            "private key",
        )?);

        let created_at = serialized.created_at.unwrap_or_else(Utc::now);
        let expires_at = match serialized.expires_at {
            Some(at) => at,
            None => expiry_after(created_at, self.config.default_validity_days)?,
        };
        if expires_at < created_at {
            return Err(DualVaultError::Format("expiresAt precedes createdAt".into()));
        }

        debug!(key_id = %serialized.key_id, "imported key pair");
        Ok(KyberKeyPair {
            key_id: serialized.key_id.clone(),
            public_key,
            private_key,
            created_at,
            expires_at,
        })
    }

    /// Import from the JSON text produced by serializing an export.
    pub fn import_key_pair_json(&self, json: &str) -> Result<KyberKeyPair> {
        let serialized: ExportedKeyPair =
            serde_json::from_str(json).map_err(|e| DualVaultError::Format(e.to_string()))?;
        self.import_key_pair(&serialized)
    }
}

fn expiry_after(created_at: DateTime<Utc>, validity_days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(validity_days))
        .and_then(|d| created_at.checked_add_signed(d))
        .ok_or_else(|| DualVaultError::Generation("validity window out of range".into()))
}

fn decode_exact(encoded: &str, expected: usize, what: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| DualVaultError::Format(format!("{what} is not valid base64: {e}")))?;
    if bytes.len() != expected {
        return Err(DualVaultError::Format(format!(
            "{what} must be {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Key ring
// ---------------------------------------------------------------------------

/// `{key_id -> KyberKeyPair}` lookup held by the decrypting application.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    pairs: BTreeMap<String, KyberKeyPair>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, replacing any pair with the same id.
    pub fn insert(&mut self, pair: KyberKeyPair) {
        self.pairs.insert(pair.key_id.clone(), pair);
    }

    pub fn get(&self, key_id: &str) -> Option<&KyberKeyPair> {
        self.pairs.get(key_id)
    }

    /// Drop a retired pair. Envelopes sealed to it become undecryptable.
    pub fn remove(&mut self, key_id: &str) -> Option<KyberKeyPair> {
        self.pairs.remove(key_id)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The newest pair still valid at `now`, used for new encryptions.
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<&KyberKeyPair> {
        self.pairs
            .values()
            .filter(|p| !p.is_expired_at(now))
            .max_by_key(|p| p.created_at)
    }

    pub fn current(&self) -> Option<&KyberKeyPair> {
        self.current_at(Utc::now())
    }

    /// The pair an envelope was sealed to, expired or not.
    pub fn key_for(&self, envelope: &Envelope) -> Result<&KyberKeyPair> {
        self.get(&envelope.kyber_key_id)
            .ok_or_else(|| DualVaultError::UnknownKey(envelope.kyber_key_id.clone()))
    }
}
