//! AES-256-GCM encryption of token values before they reach the credential store.

use aes_gcm::{
    AeadCore, Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

use crate::error::CryptoError;

const NONCE_LEN: usize = 12;

/// Symmetric cipher for token values, built once from the process-wide key.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Builds a cipher from a base64 encoded 32 byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidKey(format!("got {} bytes", b.len())))?;
        Ok(Self::new(&key))
    }

    /// Encrypts `plaintext` and returns `base64(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, sealed: &str) -> Result<String, CryptoError> {
        let data = STANDARD
            .decode(sealed)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt(
                "ciphertext too short: missing nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher([REDACTED])")
    }
}

/// Generates a fresh random key, base64 encoded, suitable for `TOKEN_ENCRYPTION_KEY`.
pub fn generate_key() -> String {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    STANDARD.encode(key)
}
