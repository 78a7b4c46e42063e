//! The persisted envelope, its wire codec and structural verification.
//!
//! An [`Envelope`] is immutable once created. Re-keying produces a new one.
//!
//! ## Wire format
//!
//! A JSON object with exactly eleven camelCase fields. Binary fields are
//! standard base64. `kyberCiphertext` is
//! `"<base64 KEM ciphertext>:<base64 wrapped share>"`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{IV_LEN, TAG_LEN};
use crate::error::{DualVaultError, Result};

/// The algorithm version this build seals and accepts.
pub const ALGORITHM_VERSION: &str = "KMS-KYBER768-DUAL-v1.0";

/// Separator between the two segments of `kyberCiphertext`.
pub const KYBER_DELIMITER: char = ':';

/// The complete serializable unit produced by one encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Envelope {
    pub id: String,
    /// Base64 AES-256-GCM ciphertext (tag detached).
    pub encrypted_data: String,
    /// Base64 96-bit IV.
    pub iv: String,
    /// Base64 128-bit GCM tag.
    pub auth_tag: String,
    /// Base64 share A, encrypted by the KMS.
    pub kms_encrypted_share: String,
    /// `<base64 KEM ciphertext>:<base64 wrapped share B>`.
    pub kyber_ciphertext: String,
    pub kms_key_path: String,
    pub kms_key_version: String,
    pub kyber_key_id: String,
    pub encrypted_at: DateTime<Utc>,
    pub algorithm_version: String,
}

/// Provenance of an envelope with every ciphertext and key-material field removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub id: String,
    pub kms_key_path: String,
    pub kms_key_version: String,
    pub kyber_key_id: String,
    pub algorithm_version: String,
    pub encrypted_at: DateTime<Utc>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DualVaultError::Validation(e.to_string()))
    }

    /// Parse the wire form. Missing, unknown or mistyped fields are `Validation` errors.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DualVaultError::Validation(e.to_string()))
    }

    pub fn metadata(&self) -> EnvelopeMetadata {
        get_envelope_metadata(self)
    }
}

/// Join the two binary segments of `kyberCiphertext`.
pub(crate) fn encode_kyber_ciphertext(kem_ciphertext: &[u8], wrapped_share: &[u8]) -> String {
    format!(
        "{}{}{}",
        STANDARD.encode(kem_ciphertext),
        KYBER_DELIMITER,
        STANDARD.encode(wrapped_share)
    )
}

/// Split `kyberCiphertext` into `(kem_ciphertext, wrapped_share)`.
pub fn decode_kyber_ciphertext(value: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let (kem, wrapped) = split_kyber_segments(value).ok_or_else(|| {
        DualVaultError::Validation("kyberCiphertext must be two non-empty segments".into())
    })?;
    let kem = STANDARD
        .decode(kem)
        .map_err(|_| DualVaultError::Validation("kyberCiphertext KEM segment".into()))?;
    let wrapped = STANDARD
        .decode(wrapped)
        .map_err(|_| DualVaultError::Validation("kyberCiphertext share segment".into()))?;
    Ok((kem, wrapped))
}

/// Exactly one delimiter, two non-empty segments.
fn split_kyber_segments(value: &str) -> Option<(&str, &str)> {
    let (kem, wrapped) = value.split_once(KYBER_DELIMITER)?;
    if kem.is_empty() || wrapped.is_empty() || wrapped.contains(KYBER_DELIMITER) {
        return None;
    }
    Some((kem, wrapped))
}

/// Decode a base64 field that must hold exactly `N` bytes.
pub(crate) fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N]> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|_| DualVaultError::Validation(format!("{field} is not valid base64")))?;
    bytes
        .try_into()
        .map_err(|_| DualVaultError::Validation(format!("{field} must be {N} bytes")))
}

pub(crate) fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|_| DualVaultError::Validation(format!("{field} is not valid base64")))
}

/// Whether `tag` has the shape `^[A-Z0-9-]+-v\d+\.\d+$`.
pub fn is_well_formed_version_tag(tag: &str) -> bool {
    let Some((name, version)) = tag.rsplit_once("-v") else {
        return false;
    };
    let name_ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    let Some((major, minor)) = version.split_once('.') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    name_ok && digits(major) && digits(minor)
}

fn check_structure(envelope: &Envelope) -> Result<()> {
    let required = [
        ("id", &envelope.id),
        ("kmsEncryptedShare", &envelope.kms_encrypted_share),
        ("kmsKeyPath", &envelope.kms_key_path),
        ("kmsKeyVersion", &envelope.kms_key_version),
        ("kyberKeyId", &envelope.kyber_key_id),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(DualVaultError::Validation(format!("{field} is empty")));
    }

    if envelope.algorithm_version != ALGORITHM_VERSION {
        return Err(DualVaultError::Validation(format!(
            "unsupported algorithm version {:?}",
            envelope.algorithm_version
        )));
    }

    // Empty plaintext encrypts to empty ciphertext, so only the encoding is checked.
    decode_field(&envelope.encrypted_data, "encryptedData")?;
    decode_fixed::<IV_LEN>(&envelope.iv, "iv")?;
    decode_fixed::<TAG_LEN>(&envelope.auth_tag, "authTag")?;
    decode_field(&envelope.kms_encrypted_share, "kmsEncryptedShare")?;
    decode_kyber_ciphertext(&envelope.kyber_ciphertext)?;
    Ok(())
}

/// Cheap structural and version check. Never fails, only answers.
///
/// A `true` result does not prove cryptographic validity. That is only
/// established by the GCM tag check during decryption.
pub fn verify_envelope_integrity(envelope: &Envelope) -> bool {
    check_structure(envelope).is_ok()
}

/// Like [`verify_envelope_integrity`], returning the reason on failure.
pub fn validate_envelope(envelope: &Envelope) -> Result<()> {
    check_structure(envelope)
}

/// Verify the raw wire form, including field presence and types.
pub fn verify_envelope_json(json: &str) -> bool {
    Envelope::from_json(json)
        .map(|e| verify_envelope_integrity(&e))
        .unwrap_or(false)
}

/// Provenance fields only. Safe to log and audit.
pub fn get_envelope_metadata(envelope: &Envelope) -> EnvelopeMetadata {
    EnvelopeMetadata {
        id: envelope.id.clone(),
        kms_key_path: envelope.kms_key_path.clone(),
        kms_key_version: envelope.kms_key_version.clone(),
        kyber_key_id: envelope.kyber_key_id.clone(),
        algorithm_version: envelope.algorithm_version.clone(),
        encrypted_at: envelope.encrypted_at,
    }
}

/// Whether `key_id` names the Kyber key the envelope was sealed to.
///
/// Says nothing about whether that key can actually decapsulate.
pub fn can_decrypt_envelope(envelope: &Envelope, key_id: &str) -> bool {
    envelope.kyber_key_id == key_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            id: "0123456789abcdef0123456789abcdef".into(),
            encrypted_data: STANDARD.encode(b"ciphertext"),
            iv: STANDARD.encode([1u8; IV_LEN]),
            auth_tag: STANDARD.encode([2u8; TAG_LEN]),
            kms_encrypted_share: STANDARD.encode([3u8; 64]),
            kyber_ciphertext: encode_kyber_ciphertext(&[4u8; 32], &[5u8; 60]),
            kms_key_path: "projects/p/locations/global/keyRings/r/cryptoKeys/k".into(),
            kms_key_version: "1".into(),
            kyber_key_id: "kyber-1".into(),
            encrypted_at: Utc::now(),
            algorithm_version: ALGORITHM_VERSION.into(),
        }
    }

    #[test]
    fn test_well_formed_envelope_verifies() {
        assert!(verify_envelope_integrity(&sample()));
    }

    #[test]
    fn test_version_mismatch_fails() {
        let mut env = sample();
        env.algorithm_version = "KMS-KYBER768-DUAL-v0.9".into();
        assert!(verify_envelope_integrity(&sample()));
        assert!(!verify_envelope_integrity(&env));
    }

    #[test]
    fn test_kyber_ciphertext_shape() {
        let (kem, wrapped) = decode_kyber_ciphertext(&sample().kyber_ciphertext).unwrap();
        assert_eq!(kem, vec![4u8; 32]);
        assert_eq!(wrapped, vec![5u8; 60]);

        for bad in ["", "abcd", ":abcd", "abcd:", "ab:cd:ef", ":"] {
            let mut env = sample();
            env.kyber_ciphertext = bad.into();
            assert!(!verify_envelope_integrity(&env), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_wrong_iv_and_tag_lengths_fail() {
        let mut env = sample();
        env.iv = STANDARD.encode([1u8; 16]);
        assert!(!verify_envelope_integrity(&env));

        let mut env = sample();
        env.auth_tag = "!!!".into();
        assert!(!verify_envelope_integrity(&env));
    }

    #[test]
    fn test_empty_provenance_field_fails() {
        let mut env = sample();
        env.kms_key_version = String::new();
        let err = validate_envelope(&env).unwrap_err();
        assert!(err.to_string().contains("kmsKeyVersion"));
    }

    #[test]
    fn test_version_tag_shape() {
        assert!(is_well_formed_version_tag(ALGORITHM_VERSION));
        assert!(is_well_formed_version_tag("AES-v10.2"));
        assert!(!is_well_formed_version_tag("kms-kyber-v1.0"));
        assert!(!is_well_formed_version_tag("KMS-KYBER768-DUAL-v1"));
        assert!(!is_well_formed_version_tag("-v1.0"));
        assert!(!is_well_formed_version_tag("KMS-v1.x"));
    }

    #[test]
    fn test_json_requires_exactly_eleven_fields() {
        let env = sample();
        let json = env.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 11);
        assert!(verify_envelope_json(&json));

        let mut missing = value.clone();
        missing.as_object_mut().unwrap().remove("authTag");
        assert!(!verify_envelope_json(&missing.to_string()));

        let mut extra = value;
        extra["plaintextHint"] = "leak".into();
        assert!(Envelope::from_json(&extra.to_string()).is_err());
    }

    #[test]
    fn test_can_decrypt_envelope_compares_ids_only() {
        let env = sample();
        assert!(can_decrypt_envelope(&env, "kyber-1"));
        assert!(!can_decrypt_envelope(&env, "kyber-2"));
    }
}
