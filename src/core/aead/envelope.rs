//! KMS envelope encryption.
//!
//! Blob layout:
//!
//! ```text
//! u32 BE wrapped_len | wrapped DEK | IV (16) | AES-128-CTR ciphertext | HMAC-SHA256 tag (32)
//! ```
//!
//! The DEK is 48 random bytes (AES key followed by HMAC key), generated per
//! call and wrapped by the KMS. The tag covers `IV | ciphertext`.

use std::sync::Arc;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tracing::trace;
use zeroize::Zeroizing;

use crate::core::kms::KmsClient;
use crate::error::{CipherError, Result};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const AES_KEY_LEN: usize = 16;
const HMAC_KEY_LEN: usize = 32;
const DEK_LEN: usize = AES_KEY_LEN + HMAC_KEY_LEN;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 32;
const LEN_PREFIX: usize = 4;
const MAX_WRAPPED_LEN: usize = 8192;

/// AEAD whose data keys are protected by a KMS master key.
#[derive(Debug, Clone)]
pub struct EnvelopeAead {
    kms: Arc<dyn KmsClient>,
}

impl EnvelopeAead {
    pub fn new(kms: Arc<dyn KmsClient>) -> Self {
        Self { kms }
    }

    /// The KMS client backing this AEAD.
    pub fn kms(&self) -> &Arc<dyn KmsClient> {
        &self.kms
    }

    /// Encrypt `plaintext` under a fresh data key.
    ///
    /// # Errors
    ///
    /// Propagates KMS failures from wrapping the data key.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut dek = Zeroizing::new([0u8; DEK_LEN]);
        rand::thread_rng().fill_bytes(dek.as_mut_slice());

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let (aes_key, mac_key) = dek.split_at(AES_KEY_LEN);

        let mut ciphertext = plaintext.to_vec();
        let mut cipher = Aes128Ctr::new_from_slices(aes_key, &iv)
            .map_err(|e| CipherError::EncryptionFailed(format!("invalid data key: {}", e)))?;
        cipher.apply_keystream(&mut ciphertext);

        let tag = compute_tag(mac_key, &iv, &ciphertext)?;

        let wrapped = self.kms.wrap(dek.as_slice())?;
        if wrapped.is_empty() || wrapped.len() > MAX_WRAPPED_LEN {
            return Err(CipherError::EncryptionFailed(format!(
                "KMS returned a wrapped key of unexpected length {}",
                wrapped.len()
            ))
            .into());
        }

        let mut blob =
            Vec::with_capacity(LEN_PREFIX + wrapped.len() + IV_LEN + ciphertext.len() + TAG_LEN);
        blob.extend_from_slice(&(wrapped.len() as u32).to_be_bytes());
        blob.extend_from_slice(&wrapped);
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        blob.extend_from_slice(&tag);

        trace!(
            plaintext_len = plaintext.len(),
            blob_len = blob.len(),
            "envelope sealed"
        );
        Ok(blob)
    }

    /// Decrypt a blob produced by [`EnvelopeAead::seal`].
    ///
    /// # Errors
    ///
    /// - `CipherError::MalformedBlob` if the blob cannot be split
    /// - `CipherError::IntegrityFailure` if the tag does not verify
    /// - KMS errors from unwrapping the data key
    pub fn open(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let (wrapped, payload) = split_blob(blob)?;

        let dek = self.kms.unwrap(wrapped)?;
        if dek.len() != DEK_LEN {
            return Err(CipherError::MalformedBlob(format!(
                "unwrapped data key has length {}, expected {}",
                dek.len(),
                DEK_LEN
            ))
            .into());
        }
        let (aes_key, mac_key) = dek.split_at(AES_KEY_LEN);

        let (iv, rest) = payload.split_at(IV_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
            .map_err(|_| CipherError::MalformedBlob("invalid data key".to_string()))?;
        mac.update(iv);
        mac.update(ciphertext);
        mac.verify_slice(tag)
            .map_err(|_| CipherError::IntegrityFailure)?;

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        let mut cipher = Aes128Ctr::new_from_slices(aes_key, iv)
            .map_err(|_| CipherError::MalformedBlob("invalid data key".to_string()))?;
        cipher.apply_keystream(plaintext.as_mut_slice());

        trace!(plaintext_len = plaintext.len(), "envelope opened");
        Ok(plaintext)
    }
}

fn compute_tag(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| CipherError::EncryptionFailed(format!("invalid data key: {}", e)))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Split a blob into the wrapped DEK and the `IV | ciphertext | tag` payload.
fn split_blob(blob: &[u8]) -> Result<(&[u8], &[u8])> {
    if blob.len() < LEN_PREFIX {
        return Err(CipherError::MalformedBlob("truncated length prefix".to_string()).into());
    }
    let (prefix, rest) = blob.split_at(LEN_PREFIX);
    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let wrapped_len = u32::from_be_bytes(len_bytes) as usize;

    if wrapped_len == 0 || wrapped_len > MAX_WRAPPED_LEN {
        return Err(CipherError::MalformedBlob(format!(
            "wrapped key length {} out of range",
            wrapped_len
        ))
        .into());
    }
    if rest.len() < wrapped_len + IV_LEN + TAG_LEN {
        return Err(CipherError::MalformedBlob("blob too short".to_string()).into());
    }

    Ok(rest.split_at(wrapped_len))
}
