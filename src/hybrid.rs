//! Dual-key encrypt/decrypt orchestration.
//!
//! Encryption:
//! 1. Draw a random data key `K` and IV, AES-256-GCM the plaintext.
//! 2. Split `K` into share A and share B.
//! 3. Share A goes to the KMS (classical, HSM-backed).
//! 4. Share B is wrapped under a key derived from a Kyber768 encapsulation.
//! 5. Everything is assembled into an [`Envelope`].
//!
//! Decryption reverses the flow and always needs both collaborators. There
//! is no single-key fallback path.
//!
//! Nothing is cached between calls. The data key and shares exist only
//! within the scope of one call and are zeroised on drop.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::content::derive_content_id;
use crate::crypto::{self, IV_LEN, TAG_LEN};
use crate::envelope::{
    self, decode_field, decode_fixed, decode_kyber_ciphertext, Envelope, ALGORITHM_VERSION,
};
use crate::error::{DualVaultError, EncryptStage, Result};
use crate::kem::{Kem, Kyber768};
use crate::key_manager::{KeyRing, KyberKeyPair, KyberPublicKey};
use crate::keys::{self, Share, SymmetricKey};
use crate::kms::{KmsClient, KmsKeyPair};
use crate::splitter;

/// Encrypts plaintext into envelopes and back, through a KEM backend.
#[derive(Debug, Clone, Default)]
pub struct HybridCipher<K: Kem = Kyber768> {
    kem: K,
}

impl HybridCipher<Kyber768> {
    pub fn new() -> Self {
        Self { kem: Kyber768 }
    }
}

impl<K: Kem> HybridCipher<K> {
    pub fn with_kem(kem: K) -> Self {
        Self { kem }
    }

    /// Encrypt `plaintext`. The envelope id is the plaintext's content id.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        kms: &dyn KmsClient,
        kms_key: &KmsKeyPair,
        kyber_key: &KyberPublicKey,
    ) -> Result<Envelope> {
        self.seal_envelope(plaintext, derive_content_id(plaintext), kms, kms_key, kyber_key)
    }

    /// Encrypt `plaintext` under a caller-supplied envelope id.
    pub fn encrypt_with_id(
        &self,
        plaintext: &[u8],
        id: &str,
        kms: &dyn KmsClient,
        kms_key: &KmsKeyPair,
        kyber_key: &KyberPublicKey,
    ) -> Result<Envelope> {
        if id.trim().is_empty() {
            return Err(DualVaultError::Validation("envelope id is empty".into()));
        }
        self.seal_envelope(plaintext, id.to_string(), kms, kms_key, kyber_key)
    }

    fn seal_envelope(
        &self,
        plaintext: &[u8],
        id: String,
        kms: &dyn KmsClient,
        kms_key: &KmsKeyPair,
        kyber_key: &KyberPublicKey,
    ) -> Result<Envelope> {
        debug!(
            envelope_id = %id,
            kyber_key_id = %kyber_key.key_id,
            kms_key_path = %kms_key.key_path,
            len = plaintext.len(),
            "encrypting"
        );

        let now = Utc::now();
        if kyber_key.is_expired_at(now) {
            return Err(DualVaultError::KeyExpired(kyber_key.key_id.clone())
                .at_stage(EncryptStage::KeyValidity));
        }
        if kyber_key.public_key.len() != K::PUBLIC_KEY_LEN {
            return Err(DualVaultError::Format(format!(
                "Kyber public key must be {} bytes, got {}",
                K::PUBLIC_KEY_LEN,
                kyber_key.public_key.len()
            ))
            .at_stage(EncryptStage::KeyValidity));
        }

        // Phase 1: payload
        let data_key = SymmetricKey::generate().map_err(|e| e.at_stage(EncryptStage::KeyGeneration))?;
        let iv = crypto::generate_iv().map_err(|e| e.at_stage(EncryptStage::KeyGeneration))?;
        let sealed = crypto::encrypt_detached(data_key.as_bytes(), &iv, plaintext)
            .map_err(|e| e.at_stage(EncryptStage::PayloadEncryption))?;

        // Phase 2: split
        let (share_a, share_b) =
            splitter::split(&data_key).map_err(|e| e.at_stage(EncryptStage::SecretSplit))?;
        drop(data_key);

        // Phase 3: classical share
        let kms_encrypted_share = kms
            .asymmetric_encrypt(kms_key, share_a.as_bytes())
            .map_err(|e| DualVaultError::kms(e).at_stage(EncryptStage::KmsEncrypt))?;
        drop(share_a);

        // Phase 4: post-quantum share
        let (kem_ciphertext, shared_secret) = self
            .kem
            .encapsulate(&kyber_key.public_key)
            .map_err(|e| DualVaultError::kem(e).at_stage(EncryptStage::KemEncapsulate))?;
        let wrapping_key = keys::derive_wrapping_key(&shared_secret, ALGORITHM_VERSION)
            .map_err(|e| e.at_stage(EncryptStage::ShareWrap))?;
        let wrapped_share = crypto::seal(wrapping_key.as_bytes(), share_b.as_bytes())
            .map_err(|e| e.at_stage(EncryptStage::ShareWrap))?;

        // Phase 5: assemble
        let envelope = Envelope {
            id,
            encrypted_data: STANDARD.encode(&sealed.ciphertext),
            iv: STANDARD.encode(iv),
            auth_tag: STANDARD.encode(sealed.tag),
            kms_encrypted_share: STANDARD.encode(&kms_encrypted_share),
            kyber_ciphertext: envelope::encode_kyber_ciphertext(&kem_ciphertext, &wrapped_share),
            kms_key_path: kms_key.key_path.clone(),
            kms_key_version: kms_key.key_version.clone(),
            kyber_key_id: kyber_key.key_id.clone(),
            encrypted_at: now,
            algorithm_version: ALGORITHM_VERSION.to_string(),
        };

        info!(
            envelope_id = %envelope.id,
            kyber_key_id = %envelope.kyber_key_id,
            kms_key_version = %envelope.kms_key_version,
            algorithm_version = %envelope.algorithm_version,
            "envelope sealed"
        );
        Ok(envelope)
    }

    /// Decrypt an envelope with the KMS and the matching Kyber key pair.
    ///
    /// A GCM failure is returned as `Authentication` and is never softened.
    pub fn decrypt(
        &self,
        envelope: &Envelope,
        kms: &dyn KmsClient,
        kyber_key: &KyberKeyPair,
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.open_envelope(envelope, kms, kyber_key).map_err(|e| {
            warn!(envelope_id = %envelope.id, error = %e, "decryption failed");
            e
        })
    }

    /// Decrypt using whichever pair in `ring` the envelope was sealed to.
    pub fn decrypt_with_ring(
        &self,
        envelope: &Envelope,
        kms: &dyn KmsClient,
        ring: &KeyRing,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let kyber_key = ring.key_for(envelope)?;
        self.decrypt(envelope, kms, kyber_key)
    }

    /// Re-key an envelope: decrypt with the old keys and seal the plaintext
    /// into a new envelope under the new keys. The original is untouched and
    /// the new envelope keeps its id.
    pub fn reencrypt(
        &self,
        envelope: &Envelope,
        kms: &dyn KmsClient,
        old_kyber_key: &KyberKeyPair,
        new_kms_key: &KmsKeyPair,
        new_kyber_key: &KyberPublicKey,
    ) -> Result<Envelope> {
        let plaintext = self.decrypt(envelope, kms, old_kyber_key)?;
        let rekeyed =
            self.seal_envelope(&plaintext, envelope.id.clone(), kms, new_kms_key, new_kyber_key)?;
        info!(
            envelope_id = %rekeyed.id,
            from_kyber_key_id = %envelope.kyber_key_id,
            to_kyber_key_id = %rekeyed.kyber_key_id,
            "envelope re-keyed"
        );
        Ok(rekeyed)
    }

    fn open_envelope(
        &self,
        envelope: &Envelope,
        kms: &dyn KmsClient,
        kyber_key: &KyberKeyPair,
    ) -> Result<Zeroizing<Vec<u8>>> {
        // Phase 1: structure
        envelope::validate_envelope(envelope)?;
        if kyber_key.key_id() != envelope.kyber_key_id {
            return Err(DualVaultError::KeyMismatch {
                expected: envelope.kyber_key_id.clone(),
                actual: kyber_key.key_id().to_string(),
            });
        }

        // Phase 2: post-quantum share
        let (kem_ciphertext, wrapped_share) = decode_kyber_ciphertext(&envelope.kyber_ciphertext)?;
        let shared_secret = self
            .kem
            .decapsulate(kyber_key.private_key_bytes(), &kem_ciphertext)
            .map_err(DualVaultError::kem)?;
        let wrapping_key = keys::derive_wrapping_key(&shared_secret, &envelope.algorithm_version)?;
        let share_b = Zeroizing::new(crypto::open(
            wrapping_key.as_bytes(),
            &wrapped_share,
            "kyber share",
        )?);
        let share_b = Share::from_slice(&share_b)?;

        // Phase 3: classical share
        let kms_ciphertext = decode_field(&envelope.kms_encrypted_share, "kmsEncryptedShare")?;
        let share_a = kms
            .asymmetric_decrypt(&envelope.kms_key_path, &envelope.kms_key_version, &kms_ciphertext)
            .map_err(DualVaultError::kms)?;
        let share_a = Share::from_slice(&share_a)?;

        // Phase 4: payload
        let data_key = splitter::combine_shares(&share_a, &share_b)?;
        let iv = decode_fixed::<IV_LEN>(&envelope.iv, "iv")?;
        let tag = decode_fixed::<TAG_LEN>(&envelope.auth_tag, "authTag")?;
        let ciphertext = decode_field(&envelope.encrypted_data, "encryptedData")?;
        let plaintext =
            crypto::decrypt_detached(data_key.as_bytes(), &iv, &ciphertext, &tag, "payload")?;

        debug!(envelope_id = %envelope.id, len = plaintext.len(), "envelope opened");
        Ok(Zeroizing::new(plaintext))
    }
}
