//! Encrypted at-rest storage for per-user API credentials.
//!
//! Each encryption draws a fresh random nonce, stored alongside the
//! ciphertext and authentication tag in one self-describing blob:
//! `enc:v1:<base64(nonce || ciphertext+tag)>`.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::HeraldError;

const BLOB_PREFIX: &str = "enc:v1:";
const NONCE_BYTES: usize = 12;

/// Encrypts and decrypts per-user credentials with AES-256-GCM.
///
/// Key material is process-wide, loaded once at startup. Rotating the
/// passphrase invalidates all previously stored blobs; affected users fall
/// back to the default credentials until they re-activate their own.
#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl CredentialVault {
    /// Derive key material from a configured passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, HeraldError> {
        let trimmed = passphrase.trim();
        if trimmed.len() < 8 {
            return Err(HeraldError::Config(
                "vault passphrase must be at least 8 characters".into(),
            ));
        }
        let digest = Sha256::digest(trimmed.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self { key })
    }

    /// Encrypt a plaintext credential into a self-describing blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, HeraldError> {
        if plaintext.trim().is_empty() {
            return Err(HeraldError::Credential("credential must not be empty".into()));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| HeraldError::Credential("key material has invalid length".into()))?;

        let mut nonce = [0u8; NONCE_BYTES];
        use aes_gcm::aead::rand_core::RngCore as _;
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| HeraldError::Credential("encryption failed".into()))?;

        let mut payload = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{BLOB_PREFIX}{}", BASE64.encode(payload)))
    }

    /// Decrypt a stored blob.
    ///
    /// Returns `None` on malformed or tampered input — callers treat that as
    /// "no credential available", never as a fatal error.
    pub fn decrypt(&self, blob: &str) -> Option<String> {
        let payload = blob.strip_prefix(BLOB_PREFIX)?;
        let raw = BASE64.decode(payload).ok()?;
        if raw.len() <= NONCE_BYTES {
            return None;
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_BYTES);
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVault([REDACTED])")
    }
}
