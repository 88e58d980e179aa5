/// Errors from the per-tenant envelope Encryption Service (spec §4.4).
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Seal(String),

    #[error("decryption failed: tenant key mismatch or corrupted envelope")]
    Open,

    #[error("malformed ciphertext envelope: {0}")]
    MalformedEnvelope(String),
}
