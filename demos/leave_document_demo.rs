//! Minimal example: protecting an uploaded medical note for a leave request.
//!
//! Run with: `RUST_LOG=dualvault=debug cargo run --example leave_document_demo`
//!
//! - A Kyber768 key pair is generated and held in a key ring
//! - The upload is sealed into an envelope (KMS share + Kyber share)
//! - Only audit-safe metadata is logged and written to a JSON-lines file
//! - The retrieval path opens the envelope with both collaborators

use std::path::PathBuf;

use dualvault::audit::{AuditLog, AuditOperation, FileAuditSink};
use dualvault::error::BoxError;
use dualvault::{HybridCipher, KeyManager, KeyRing, KmsClient, KmsKeyPair};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Local stand-in for the HSM-backed KMS. A real deployment injects a client
/// for its cloud KMS here.
struct DemoKms {
    key: LessSafeKey,
}

impl DemoKms {
    fn new() -> Result<Self, BoxError> {
        let mut secret = [0u8; 32];
        SystemRandom::new().fill(&mut secret).map_err(|_| "rng failure")?;
        let unbound = UnboundKey::new(&AES_256_GCM, &secret).map_err(|_| "bad key")?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }
}

impl KmsClient for DemoKms {
    fn asymmetric_encrypt(&self, _: &KmsKeyPair, plaintext: &[u8]) -> Result<Vec<u8>, BoxError> {
        let mut nonce = [0u8; 12];
        SystemRandom::new().fill(&mut nonce).map_err(|_| "rng failure")?;
        let mut out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut out)
            .map_err(|_| "seal failure")?;
        let mut ciphertext = nonce.to_vec();
        ciphertext.extend_from_slice(&out);
        Ok(ciphertext)
    }

    fn asymmetric_decrypt(&self, _: &str, _: &str, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, BoxError> {
        if ciphertext.len() < 12 {
            return Err("ciphertext too short".into());
        }
        let (nonce, body) = ciphertext.split_at(12);
        let nonce: [u8; 12] = nonce.try_into().map_err(|_| "bad nonce")?;
        let mut buf = body.to_vec();
        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut buf)
            .map_err(|_| "decryption failed")?;
        Ok(Zeroizing::new(plaintext.to_vec()))
    }
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Setup
    let kms = DemoKms::new()?;
    let kms_key = KmsKeyPair {
        key_path: "projects/leave-app/locations/global/keyRings/docs/cryptoKeys/share-a".into(),
        key_version: "1".into(),
        public_key: "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n".into(),
        algorithm: "RSA_DECRYPT_OAEP_3072_SHA256".into(),
    };
    let manager = KeyManager::new();
    let mut key_ring = KeyRing::new();
    key_ring.insert(manager.generate_key_pair(365)?);
    let current = key_ring.current().ok_or("no valid key pair")?.public_key();
    let cipher = HybridCipher::new();

    let audit_path = PathBuf::from(std::env::temp_dir()).join("dualvault_audit.jsonl");
    let mut audit = AuditLog::new();
    audit.add_forward_sink(Box::new(FileAuditSink::new(&audit_path)?));

    // 2. Upload handler
    let upload = b"doctor-note-2025-01-15.pdf contents";
    let envelope = cipher.encrypt(upload, &kms, &kms_key, &current)?;
    audit.record(AuditOperation::Encrypt, &envelope);
    println!("Stored envelope {} ({} bytes of JSON)", envelope.id, envelope.to_json()?.len());

    // 3. Retrieval handler
    let plaintext = cipher.decrypt_with_ring(&envelope, &kms, &key_ring)?;
    audit.record(AuditOperation::Decrypt, &envelope);
    assert_eq!(&plaintext[..], upload);
    println!("Recovered {} bytes", plaintext.len());

    // 4. Audit handler
    for record in audit.iter() {
        println!(
            "  {:?} {} kyber={} kms={}@{}",
            record.operation,
            record.metadata.id,
            record.metadata.kyber_key_id,
            record.metadata.kms_key_path,
            record.metadata.kms_key_version
        );
    }
    println!("Full audit also written to: {}", audit_path.display());

    Ok(())
}
