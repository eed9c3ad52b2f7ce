//! In-process KMS stand-in.
//!
//! Wraps blobs with AES-256-GCM under a key derived from the reference
//! label, so two stubs with the same label interoperate and a different
//! label fails like a wrong master key would. Not for production use.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::trace;
use zeroize::Zeroizing;

use super::{KmsClient, KmsProvider};
use crate::error::{CipherError, Result};

const NONCE_LEN: usize = 12;

pub struct StubKms {
    label: String,
    cipher: Aes256Gcm,
}

impl StubKms {
    /// Stub master key named by `label`.
    pub fn new(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"docseal-test-kms:");
        hasher.update(label.as_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&hasher.finalize());
        let key: &[u8; 32] = &key;

        Self {
            label: label.to_string(),
            cipher: Aes256Gcm::new(key.into()),
        }
    }
}

impl fmt::Debug for StubKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubKms").field("label", &self.label).finish()
    }
}

impl KmsClient for StubKms {
    fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        trace!(label = %self.label, plaintext_len = plaintext.len(), "stub kms wrap");

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::EncryptionFailed("stub kms wrap failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unwrap(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        trace!(label = %self.label, ciphertext_len = ciphertext.len(), "stub kms unwrap");

        if ciphertext.len() < NONCE_LEN {
            return Err(CipherError::IntegrityFailure.into());
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map(Zeroizing::new)
            .map_err(|_| CipherError::IntegrityFailure.into())
    }

    fn provider(&self) -> KmsProvider {
        KmsProvider::Stub
    }
}
