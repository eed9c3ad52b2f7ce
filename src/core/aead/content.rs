//! Per-document content encryption.
//!
//! The body is AES-128-GCM with a random 96-bit nonce prepended:
//! `nonce (12) | ciphertext | tag (16)`. This is the layout a browser-side
//! WebCrypto decryptor expects.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CipherError, Result};

/// Content key length in bytes.
pub const KEY_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A fresh AES-128-GCM key for one document. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    /// Draw a new key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Rebuild a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::IntegrityFailure` if the length is wrong, since
    /// keys only arrive this way after authenticated decryption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CipherError::IntegrityFailure.into());
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Base64 of the raw key, as carried in a wrapped key payload.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.0))
    }

    /// Parse the base64 form produced by [`ContentKey::to_base64`].
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(encoded)
                .map_err(|_| CipherError::IntegrityFailure)?,
        );
        Self::from_bytes(&bytes)
    }

    fn cipher(&self) -> Aes128Gcm {
        Aes128Gcm::new((&self.0).into())
    }

    /// Encrypt `plaintext` under a random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::EncryptionFailed("content encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a body produced by [`ContentKey::encrypt`].
    ///
    /// # Errors
    ///
    /// Any failure, including a body too short to hold nonce and tag, is
    /// reported as `CipherError::IntegrityFailure`.
    pub fn decrypt(&self, body: &[u8]) -> Result<Vec<u8>> {
        if body.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::IntegrityFailure.into());
        }
        let (nonce, ciphertext) = body.split_at(NONCE_LEN);

        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::IntegrityFailure.into())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey([REDACTED])")
    }
}
