//! Hybrid public-key encryption of small payloads.
//!
//! Uses the binary age format with X25519 recipients. Decryption tries
//! every supplied identity, which is how rotated keysets keep opening
//! envelopes built under an older primary key.

use std::io::{Read, Write};

use age::x25519;
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::{CipherError, Result};

/// Encrypt `plaintext` to a single recipient.
pub fn encrypt(plaintext: &[u8], recipient: &x25519::Recipient) -> Result<Vec<u8>> {
    trace!(plaintext_len = plaintext.len(), "hybrid encrypting");

    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
    writer
        .write_all(plaintext)
        .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
    writer
        .finish()
        .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

    trace!(ciphertext_len = encrypted.len(), "hybrid encrypted");
    Ok(encrypted)
}

/// Decrypt with whichever of `identities` matches.
///
/// # Errors
///
/// Every failure (no matching identity, malformed header, bad tag) is
/// reported as `CipherError::IntegrityFailure`.
pub fn decrypt<'a, I>(ciphertext: &[u8], identities: I) -> Result<Zeroizing<Vec<u8>>>
where
    I: IntoIterator<Item = &'a x25519::Identity>,
{
    trace!(ciphertext_len = ciphertext.len(), "hybrid decrypting");

    let decryptor = age::Decryptor::new(ciphertext).map_err(|_| CipherError::IntegrityFailure)?;
    let mut reader = decryptor
        .decrypt(identities.into_iter().map(|i| i as &dyn age::Identity))
        .map_err(|_| CipherError::IntegrityFailure)?;

    let mut plaintext = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut plaintext)
        .map_err(|_| CipherError::IntegrityFailure)?;

    Ok(plaintext)
}
