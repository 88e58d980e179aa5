//! Per-tenant envelope encryption (spec §4.4, §6 "Encryption envelope layout").
//!
//! Layout: `salt(32B) || nonce(12B) || AES-256-GCM-sealed(plaintext)`. A
//! process-wide master key is combined with the tenant id and a fresh
//! per-call salt via PBKDF2-SHA256 to derive the data key, so no two
//! ciphertexts for the same tenant share a key even though they share a
//! master secret.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use meshcore_core::errors::CryptoError;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::instrument;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Envelope encryption service, keyed by a single master secret for the
/// process lifetime (spec §4.4).
pub struct EncryptionService {
    master_key_hash: [u8; 32],
    pbkdf2_iterations: u32,
}

impl EncryptionService {
    pub fn new(master_key: &str, pbkdf2_iterations: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master_key.as_bytes());
        Self {
            master_key_hash: hasher.finalize().into(),
            pbkdf2_iterations,
        }
    }

    fn derive_tenant_key(&self, tenant_id: &str, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut ikm = Vec::with_capacity(self.master_key_hash.len() + tenant_id.len());
        ikm.extend_from_slice(&self.master_key_hash);
        ikm.extend_from_slice(tenant_id.as_bytes());

        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(&ikm, salt, self.pbkdf2_iterations, &mut key);
        key
    }

    /// Seals `plaintext` under a key derived for `tenant_id`. Returns the
    /// full envelope (`salt || nonce || ciphertext`).
    #[instrument(skip(self, plaintext), fields(tenant_id))]
    pub fn encrypt(&self, plaintext: &[u8], tenant_id: &str) -> Result<Vec<u8>, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = self.derive_tenant_key(tenant_id, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Seal(e.to_string()))?;

        let mut envelope = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// Opens an envelope produced by [`Self::encrypt`] for the same
    /// `tenant_id`. Fails with [`CryptoError::Open`] on tenant mismatch or
    /// corruption (GCM tag mismatch).
    #[instrument(skip(self, envelope), fields(tenant_id))]
    pub fn decrypt(&self, envelope: &[u8], tenant_id: &str) -> Result<Vec<u8>, CryptoError> {
        if envelope.len() < SALT_LEN + NONCE_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "envelope too short: {} bytes",
                envelope.len()
            )));
        }

        let (salt, rest) = envelope.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_tenant_key(tenant_id, salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Open)
    }

    /// Rotates a ciphertext in place: decrypts under the current tenant
    /// key then re-encrypts under a fresh salt, preserving `tenant_id`
    /// binding (spec §4.4 "Rotation").
    pub fn rotate(&self, envelope: &[u8], tenant_id: &str) -> Result<Vec<u8>, CryptoError> {
        let plaintext = self.decrypt(envelope, tenant_id)?;
        self.encrypt(&plaintext, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_same_tenant() {
        let svc = EncryptionService::new("test-master-key-for-testing", 1000);
        let envelope = svc.encrypt(b"my-secret-token", "tenant-123").unwrap();
        let plaintext = svc.decrypt(&envelope, "tenant-123").unwrap();
        assert_eq!(plaintext, b"my-secret-token");
    }

    #[test]
    fn rejects_wrong_tenant() {
        let svc = EncryptionService::new("test-master-key-for-testing", 1000);
        let envelope = svc.encrypt(b"my-secret-token", "tenant-123").unwrap();
        assert!(svc.decrypt(&envelope, "tenant-999").is_err());
    }

    #[test]
    fn envelope_layout_matches_spec() {
        let svc = EncryptionService::new("k", 1000);
        let envelope = svc.encrypt(b"x", "t").unwrap();
        // salt(32) + nonce(12) + ciphertext(1) + tag(16)
        assert_eq!(envelope.len(), 32 + 12 + 1 + 16);
    }

    #[test]
    fn rotation_preserves_plaintext_under_new_salt() {
        let svc = EncryptionService::new("k", 1000);
        let original = svc.encrypt(b"rotate-me", "tenant-1").unwrap();
        let rotated = svc.rotate(&original, "tenant-1").unwrap();
        assert_ne!(original, rotated);
        assert_eq!(svc.decrypt(&rotated, "tenant-1").unwrap(), b"rotate-me");
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let svc = EncryptionService::new("k", 1000);
        assert!(svc.decrypt(b"too-short", "tenant-1").is_err());
    }

    proptest::proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_bytes(data: Vec<u8>, tenant in "[a-z0-9-]{1,40}") {
            let svc = EncryptionService::new("proptest-master-key", 100);
            let envelope = svc.encrypt(&data, &tenant).unwrap();
            let decrypted = svc.decrypt(&envelope, &tenant).unwrap();
            proptest::prop_assert_eq!(decrypted, data);
        }
    }
}
