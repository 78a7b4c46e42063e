mod common;

use chrono::{Duration, Utc};
use common::StubKms;
use dualvault::error::BoxError;
use dualvault::kem::KemKeyPair;
use dualvault::{
    can_decrypt_envelope, DualVaultConfig, DualVaultError, EncryptStage, ExportedKeyPair,
    HybridCipher, Kem, KeyManager, KeyRing, Kyber768,
};
use zeroize::Zeroizing;

#[test]
fn test_export_import_round_trip_through_json() {
    let manager = KeyManager::new();
    let original = manager.generate_key_pair(365).unwrap();

    let exported = manager.export_key_pair(&original);
    assert_eq!(exported.algorithm, "KYBER768");
    assert_eq!(exported.key_id, original.key_id());

    let json = serde_json::to_string(&exported).unwrap();
    let parsed: ExportedKeyPair = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, exported);

    let imported = manager.import_key_pair(&parsed).unwrap();
    assert!(imported.same_material_as(&original));
    assert_eq!(imported.public_key().key_id, original.public_key().key_id);

    let from_text = manager.import_key_pair_json(&json).unwrap();
    assert!(from_text.same_material_as(&original));
}

#[test]
fn test_imported_pair_decrypts_envelope_sealed_to_original() {
    let mut kms = StubKms::new();
    let kms_key = kms.create_key("1");
    let manager = KeyManager::new();
    let original = manager.generate_default_key_pair().unwrap();
    let cipher = HybridCipher::new();

    let envelope = cipher
        .encrypt(b"archived note", &kms, &kms_key, &original.public_key())
        .unwrap();

    let imported = manager
        .import_key_pair(&manager.export_key_pair(&original))
        .unwrap();
    assert_eq!(&cipher.decrypt(&envelope, &kms, &imported).unwrap()[..], b"archived note");
}

#[test]
fn test_wrong_key_id_is_key_mismatch() {
    let mut kms = StubKms::new();
    let kms_key = kms.create_key("1");
    let manager = KeyManager::new();
    let sealed_to = manager.generate_default_key_pair().unwrap();
    let other = manager.generate_default_key_pair().unwrap();
    let cipher = HybridCipher::new();

    let envelope = cipher
        .encrypt(b"note", &kms, &kms_key, &sealed_to.public_key())
        .unwrap();

    assert!(can_decrypt_envelope(&envelope, sealed_to.key_id()));
    assert!(!can_decrypt_envelope(&envelope, other.key_id()));

    match cipher.decrypt(&envelope, &kms, &other) {
        Err(DualVaultError::KeyMismatch { expected, actual }) => {
            assert_eq!(expected, sealed_to.key_id());
            assert_eq!(actual, other.key_id());
        }
        result => panic!("expected KeyMismatch, got {result:?}"),
    }
    // The mismatch is caught before any collaborator is consulted.
    assert_eq!(kms.decrypt_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_expired_key_gates_encryption_only() {
    let mut kms = StubKms::new();
    let kms_key = kms.create_key("1");
    let manager = KeyManager::new();
    let pair = manager.generate_key_pair(1).unwrap();
    let cipher = HybridCipher::new();

    let envelope = cipher.encrypt(b"before expiry", &kms, &kms_key, &pair.public_key()).unwrap();

    // Re-import the same material with a window that has already closed.
    let mut exported = manager.export_key_pair(&pair);
    exported.created_at = Some(Utc::now() - Duration::days(30));
    exported.expires_at = Some(Utc::now() - Duration::days(1));
    let expired = manager.import_key_pair(&exported).unwrap();
    assert!(expired.is_expired_at(Utc::now()));

    let err = cipher
        .encrypt(b"after expiry", &kms, &kms_key, &expired.public_key())
        .unwrap_err();
    assert_eq!(err.stage(), Some(EncryptStage::KeyValidity));

    let plaintext = cipher.decrypt(&envelope, &kms, &expired).unwrap();
    assert_eq!(&plaintext[..], b"before expiry");
}

#[test]
fn test_rotation_with_key_ring_and_reencrypt() {
    let mut kms = StubKms::new();
    let kms_v1 = kms.create_key("1");
    let kms_v2 = kms.create_key("2");
    let manager = KeyManager::with_config(DualVaultConfig {
        key_id_prefix: "leave-docs".into(),
        ..DualVaultConfig::default()
    });
    let cipher = HybridCipher::new();

    let mut ring = KeyRing::new();
    let old = manager.generate_key_pair(30).unwrap();
    ring.insert(old.clone());
    assert!(old.key_id().starts_with("leave-docs-"));

    let original = cipher.encrypt(b"rotate me", &kms, &kms_v1, &old.public_key()).unwrap();

    let new = manager.generate_key_pair(365).unwrap();
    ring.insert(new.clone());
    assert_eq!(ring.current().unwrap().key_id(), new.key_id());

    // Historical envelopes stay decryptable through the ring.
    assert_eq!(&cipher.decrypt_with_ring(&original, &kms, &ring).unwrap()[..], b"rotate me");

    let rekeyed = cipher
        .reencrypt(&original, &kms, &old, &kms_v2, &new.public_key())
        .unwrap();
    assert_eq!(rekeyed.id, original.id);
    assert_eq!(rekeyed.kyber_key_id, new.key_id());
    assert_eq!(rekeyed.kms_key_version, "2");
    assert_ne!(rekeyed.encrypted_data, original.encrypted_data);
    assert_eq!(original.kyber_key_id, old.key_id());

    ring.remove(old.key_id());
    assert_eq!(&cipher.decrypt_with_ring(&rekeyed, &kms, &ring).unwrap()[..], b"rotate me");
    assert!(matches!(
        cipher.decrypt_with_ring(&original, &kms, &ring),
        Err(DualVaultError::UnknownKey(id)) if id == old.key_id()
    ));
}

/// KEM backend that cannot produce key pairs.
struct BrokenKem;

impl Kem for BrokenKem {
    const ALGORITHM: &'static str = "KYBER768";
    const PUBLIC_KEY_LEN: usize = Kyber768::PUBLIC_KEY_LEN;
    const PRIVATE_KEY_LEN: usize = Kyber768::PRIVATE_KEY_LEN;
    const CIPHERTEXT_LEN: usize = Kyber768::CIPHERTEXT_LEN;

    fn generate_keypair(&self) -> Result<KemKeyPair, BoxError> {
        Err("entropy pool exhausted".into())
    }

    fn encapsulate(&self, _: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), BoxError> {
        Err("backend offline".into())
    }

    fn decapsulate(&self, _: &[u8], _: &[u8]) -> Result<Zeroizing<Vec<u8>>, BoxError> {
        Err("backend offline".into())
    }
}

#[test]
fn test_backend_failure_is_generation_error() {
    let manager = KeyManager::with_kem(BrokenKem, DualVaultConfig::default());
    match manager.generate_key_pair(365) {
        Err(DualVaultError::Generation(msg)) => assert!(msg.contains("entropy pool exhausted")),
        result => panic!("expected Generation error, got {result:?}"),
    }
}

#[test]
fn test_kem_failure_during_encrypt_names_stage() {
    let mut kms = StubKms::new();
    let kms_key = kms.create_key("1");
    let pair = KeyManager::new().generate_default_key_pair().unwrap();

    let err = HybridCipher::with_kem(BrokenKem)
        .encrypt(b"note", &kms, &kms_key, &pair.public_key())
        .unwrap_err();
    assert_eq!(err.stage(), Some(EncryptStage::KemEncapsulate));
    assert!(err.to_string().contains("backend offline"));
}
