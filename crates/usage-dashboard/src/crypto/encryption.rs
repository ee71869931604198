//! AES-GCM encryption for stored API keys.
//!
//! Ciphertexts carry their 12-byte nonce as a prefix so each value can be
//! decrypted on its own.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;

use crate::error::{AppError, AppResult};

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits / 32 bytes).
const KEY_SIZE: usize = 32;

/// Encryptor for API keys.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    /// Create a new encryptor from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64 or has the wrong length.
    pub fn from_base64(key_base64: &str) -> AppResult<Self> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| AppError::Encryption(format!("Invalid base64 key: {}", e)))?;

        Self::from_bytes(&key_bytes)
    }

    /// Create a new encryptor from raw key bytes.
    pub fn from_bytes(key_bytes: &[u8]) -> AppResult<Self> {
        if key_bytes.len() != KEY_SIZE {
            return Err(AppError::Encryption(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key_bytes)
            .map_err(|e| AppError::Encryption(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Generate a new random key and return it as base64.
    pub fn generate_key_base64() -> String {
        let mut key = vec![0u8; KEY_SIZE];
        rand::thread_rng().fill(&mut key[..]);
        BASE64.encode(key)
    }

    /// Encrypt data and return the ciphertext with prepended nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypt data with prepended nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails or data is too short.
    pub fn decrypt(&self, ciphertext_with_nonce: &[u8]) -> AppResult<Vec<u8>> {
        if ciphertext_with_nonce.len() < NONCE_SIZE {
            return Err(AppError::Encryption(
                "Ciphertext too short (missing nonce)".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Encryption(format!("Decryption failed: {}", e)))
    }

    /// Encrypt an API key.
    pub fn encrypt_secret(&self, secret: &str) -> AppResult<Vec<u8>> {
        self.encrypt(secret.as_bytes())
    }

    /// Decrypt an API key previously sealed with [`Encryptor::encrypt_secret`].
    pub fn decrypt_secret(&self, ciphertext_with_nonce: &[u8]) -> AppResult<String> {
        let plaintext = self.decrypt(ciphertext_with_nonce)?;
        String::from_utf8(plaintext)
            .map_err(|e| AppError::Encryption(format!("Decrypted key is not UTF-8: {}", e)))
    }
}
