//! AES-256-GCM helper for fields stored at rest.
//!
//! Ciphertext is `base64(nonce || ciphertext+tag)` so it fits a TEXT column.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key not set")]
    KeyNotSet,
    #[error("invalid encryption key: expected 32 bytes, got {0}")]
    InvalidKey(usize),
    #[error("ciphertext is not valid base64")]
    Encoding,
    #[error("ciphertext too short")]
    Truncated,
    #[error("cipher failure: {0}")]
    Cipher(String),
}

/// Process-wide field cipher. Built once from configuration and shared.
///
/// `FieldCipher::default()` has no key; every non-empty operation on it fails
/// with [`CryptoError::KeyNotSet`].
#[derive(Default)]
pub struct FieldCipher {
    key: Option<Zeroizing<[u8; KEY_SIZE]>>,
}

impl FieldCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(key.len()))?;
        Ok(Self {
            key: Some(Zeroizing::new(key)),
        })
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        let key: &[u8; KEY_SIZE] = self.key.as_deref().ok_or(CryptoError::KeyNotSet)?;
        Ok(Aes256Gcm::new(key.into()))
    }

    pub fn encrypt(&self, plain: &str) -> Result<String, CryptoError> {
        if plain.is_empty() {
            return Ok(String::new());
        }
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_bytes())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        debug!(length = plain.len(), "field encrypted");
        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }
        let cipher = self.cipher()?;

        let data = STANDARD.decode(encoded).map_err(|_| CryptoError::Encoding)?;
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::Truncated);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;
        String::from_utf8(plain).map_err(|_| CryptoError::Cipher("plaintext is not utf-8".into()))
    }

    pub fn encrypt_opt(&self, plain: Option<&str>) -> Result<Option<String>, CryptoError> {
        plain.map(|p| self.encrypt(p)).transpose()
    }

    pub fn decrypt_opt(&self, encoded: Option<&str>) -> Result<Option<String>, CryptoError> {
        encoded.map(|e| self.decrypt(e)).transpose()
    }

    /// Opt-in lenient variant: any failure becomes an empty string.
    pub fn encrypt_or_empty(&self, plain: &str) -> String {
        self.encrypt(plain).unwrap_or_else(|e| {
            warn!(error = %e, "encryption failed, returning empty string");
            String::new()
        })
    }

    /// Opt-in lenient variant: any failure becomes an empty string.
    pub fn decrypt_or_empty(&self, encoded: &str) -> String {
        self.decrypt(encoded).unwrap_or_else(|e| {
            warn!(error = %e, "decryption failed, returning empty string");
            String::new()
        })
    }
}
