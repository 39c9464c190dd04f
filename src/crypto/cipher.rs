use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use secrecy::{ExposeSecret, Secret};

const NONCE_LENGTH: usize = 24;

/// Encrypts single text columns with XChaCha20-Poly1305.
///
/// The stored value is `base64(nonce || ciphertext)`, with a fresh random
/// nonce per call, so encrypting the same text twice gives different output.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: XChaCha20Poly1305,
}

impl FieldCipher {
    /// Create a cipher from a base64 encoded 32 byte key.
    pub fn new(key: &Secret<String>) -> Result<Self, CipherError> {
        let key = STANDARD
            .decode(key.expose_secret())
            .map_err(CipherError::InvalidEncoding)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;

        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut payload = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let payload = STANDARD
            .decode(stored)
            .map_err(CipherError::InvalidEncoding)?;
        if payload.len() < NONCE_LENGTH {
            return Err(CipherError::Truncated);
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decryption)?;

        String::from_utf8(plaintext).map_err(CipherError::NotUtf8)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

#[derive(thiserror::Error)]
pub enum CipherError {
    #[error("Value is not valid base64")]
    InvalidEncoding(#[source] base64::DecodeError),
    #[error("Encryption key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Encrypted value is shorter than its nonce")]
    Truncated,
    #[error("Failed to encrypt value")]
    Encryption,
    #[error("Failed to decrypt value")]
    Decryption,
    #[error("Decrypted value is not valid UTF8")]
    NotUtf8(#[source] std::string::FromUtf8Error),
}
