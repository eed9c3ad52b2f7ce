use std::collections::BTreeMap;

use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{DocumentEnvelope, KeyPayload};
use crate::core::aead::ContentKey;
use crate::core::fetch::KeyFetcher;
use crate::core::hybrid;
use crate::core::recipient::RecipientDirectory;
use crate::error::{CipherError, PolicyError, Result};

/// Builds envelopes for the recipients of a [`RecipientDirectory`].
pub struct EnvelopeBuilder<'a> {
    fetcher: &'a dyn KeyFetcher,
}

impl<'a> EnvelopeBuilder<'a> {
    pub fn new(fetcher: &'a dyn KeyFetcher) -> Self {
        Self { fetcher }
    }

    /// Encrypt `body` once and wrap its content key for every recipient.
    ///
    /// Every public key is resolved before anything is encrypted, and any
    /// failure aborts the build, so a returned envelope always covers the
    /// whole directory (plus the fallback recipient).
    ///
    /// # Errors
    ///
    /// - `PolicyError::EmptyAccessRequirements` if no requirement is given
    /// - `PolicyError::PublicKeyRetrievalFailed` if any recipient key is
    ///   unavailable
    pub fn build<I, S>(
        &self,
        body: &[u8],
        access_requirements: I,
        directory: &RecipientDirectory,
    ) -> Result<DocumentEnvelope>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let access_requirements: Vec<String> =
            access_requirements.into_iter().map(Into::into).collect();
        if access_requirements.is_empty() {
            return Err(PolicyError::EmptyAccessRequirements.into());
        }

        let entries = directory.resolve(self.fetcher)?;

        let cek = ContentKey::generate();
        let ciphertext = cek.encrypt(body)?;

        let payload = KeyPayload {
            access_requirements: access_requirements.clone(),
            key: cek.to_base64().to_string(),
        };
        let payload = Zeroizing::new(serde_json::to_vec(&payload).map_err(|e| {
            CipherError::EncryptionFailed(format!("failed to encode key payload: {}", e))
        })?);

        let mut recipients = BTreeMap::new();
        for entry in entries {
            let recipient = entry.public_key.primary_recipient().map_err(|e| {
                PolicyError::PublicKeyRetrievalFailed {
                    domain: entry.domain.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let wrapped = hybrid::encrypt(&payload, &recipient)?;
            debug!(domain = %entry.domain, wrapped_len = wrapped.len(), "content key wrapped");
            recipients.insert(entry.domain, wrapped);
        }

        info!(
            body_len = body.len(),
            recipients = recipients.len(),
            requirements = access_requirements.len(),
            "document envelope built"
        );

        DocumentEnvelope::from_parts(ciphertext, access_requirements, recipients)
    }
}
