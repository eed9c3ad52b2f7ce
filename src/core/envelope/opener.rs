use tracing::{debug, warn};

use super::{DocumentEnvelope, KeyPayload};
use crate::core::aead::ContentKey;
use crate::core::hybrid;
use crate::core::keys::PrivateKeyset;
use crate::core::recipient::Domain;
use crate::error::{CipherError, PolicyError, Result};

/// Recovers document bodies from envelopes.
///
/// Holds nothing. The private keyset is passed per call so its lifetime
/// stays with the caller that recovered it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeOpener;

impl EnvelopeOpener {
    pub fn new() -> Self {
        Self
    }

    /// Decrypt the body for `requester_domain`.
    ///
    /// Looks up the requester's wrapped key, falling back to the reserved
    /// fallback recipient. Access requirements are not evaluated here.
    ///
    /// # Errors
    ///
    /// - `PolicyError::RecipientNotAuthorized` if neither the requester nor
    ///   the fallback entry yields a key for `private`
    /// - `CipherError::IntegrityFailure` for any decryption failure on the
    ///   requester's own entry, a requirements mismatch, or a bad body
    pub fn open(
        &self,
        envelope: &DocumentEnvelope,
        requester_domain: &str,
        private: &PrivateKeyset,
    ) -> Result<Vec<u8>> {
        let requester = Domain::parse(requester_domain)
            .map_err(|_| not_authorized(requester_domain))?;

        let (wrapped, own_entry) = match envelope.wrapped_key(&requester) {
            Some(wrapped) => (wrapped, true),
            None => {
                let fallback = envelope
                    .wrapped_key(&Domain::fallback())
                    .ok_or_else(|| not_authorized(requester.as_str()))?;
                debug!(domain = %requester, "no entry for requester, trying fallback recipient");
                (fallback, false)
            }
        };

        let payload = match hybrid::decrypt(wrapped, private.identities()) {
            Ok(payload) => payload,
            Err(e) if own_entry => {
                warn!(domain = %requester, "wrapped content key did not decrypt");
                return Err(e);
            }
            Err(_) => return Err(not_authorized(requester.as_str())),
        };

        let payload: KeyPayload =
            serde_json::from_slice(&payload).map_err(|_| CipherError::IntegrityFailure)?;
        if payload.access_requirements != envelope.access_requirements() {
            warn!(domain = %requester, "access requirements do not match wrapped key");
            return Err(CipherError::IntegrityFailure.into());
        }

        let cek = ContentKey::from_base64(&payload.key)?;
        let body = cek.decrypt(envelope.body())?;

        debug!(domain = %requester, body_len = body.len(), "document envelope opened");
        Ok(body)
    }
}

fn not_authorized(domain: &str) -> crate::error::Error {
    PolicyError::RecipientNotAuthorized(domain.to_string()).into()
}
