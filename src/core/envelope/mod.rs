//! Multi-recipient document envelopes.
//!
//! One body ciphertext, one content key, and that content key wrapped once
//! per recipient domain together with the access requirements it grants.

mod builder;
mod opener;

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use builder::EnvelopeBuilder;
pub use opener::EnvelopeOpener;

use crate::core::recipient::Domain;
use crate::error::{DocumentError, PolicyError, Result};

/// A built document envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEnvelope {
    body: Vec<u8>,
    access_requirements: Vec<String>,
    recipients: BTreeMap<Domain, Vec<u8>>,
}

impl DocumentEnvelope {
    /// Assemble an envelope from already-encrypted parts.
    ///
    /// # Errors
    ///
    /// - `PolicyError::EmptyAccessRequirements` for an empty requirement list
    /// - `PolicyError::InvalidRecipientSet` for an empty recipient map
    pub fn from_parts(
        body: Vec<u8>,
        access_requirements: Vec<String>,
        recipients: BTreeMap<Domain, Vec<u8>>,
    ) -> Result<Self> {
        if access_requirements.is_empty() {
            return Err(PolicyError::EmptyAccessRequirements.into());
        }
        if recipients.is_empty() {
            return Err(PolicyError::InvalidRecipientSet("envelope has no recipients".to_string()).into());
        }
        Ok(Self {
            body,
            access_requirements,
            recipients,
        })
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<String>, BTreeMap<Domain, Vec<u8>>) {
        (self.body, self.access_requirements, self.recipients)
    }

    /// `nonce | AES-128-GCM ciphertext | tag`.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn access_requirements(&self) -> &[String] {
        &self.access_requirements
    }

    pub fn recipients(&self) -> &BTreeMap<Domain, Vec<u8>> {
        &self.recipients
    }

    /// The wrapped content key for `domain`, if it is a recipient.
    pub fn wrapped_key(&self, domain: &Domain) -> Option<&[u8]> {
        self.recipients.get(domain).map(Vec::as_slice)
    }

    /// Drop a recipient's wrapped key. Returns whether it was present.
    ///
    /// Other recipients are unaffected; the body is not re-encrypted.
    pub fn remove_recipient(&mut self, domain: &str) -> bool {
        match Domain::parse(domain) {
            Ok(domain) if self.recipients.len() > 1 => self.recipients.remove(&domain).is_some(),
            _ => false,
        }
    }

    /// The JSON envelope artifact.
    pub fn to_json(&self) -> Result<String> {
        let doc = EnvelopeDocument {
            access_requirements: self.access_requirements.clone(),
            body: BASE64.encode(&self.body),
            recipients: self
                .recipients
                .iter()
                .map(|(d, k)| (d.to_string(), BASE64.encode(k)))
                .collect(),
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| DocumentError::InvalidEnvelope(e.to_string()).into())
    }

    /// Parse the JSON envelope artifact.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: EnvelopeDocument = serde_json::from_str(json)
            .map_err(|e| DocumentError::InvalidEnvelope(e.to_string()))?;
        let body = decode(&doc.body, "body")?;
        Self::from_encoded(body, doc.access_requirements, doc.recipients)
    }

    /// Build from base64-encoded wrapped keys keyed by domain strings.
    pub(crate) fn from_encoded(
        body: Vec<u8>,
        access_requirements: Vec<String>,
        recipients: BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut wrapped = BTreeMap::new();
        for (domain, key) in recipients {
            let domain = Domain::parse(&domain)?;
            let key = decode(&key, domain.as_str())?;
            if wrapped.insert(domain.clone(), key).is_some() {
                return Err(PolicyError::InvalidRecipientSet(format!(
                    "duplicate recipient domain '{}'",
                    domain
                ))
                .into());
            }
        }
        Self::from_parts(body, access_requirements, wrapped)
    }
}

fn decode(value: &str, field: &str) -> Result<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| DocumentError::InvalidEnvelope(format!("{} is not base64: {}", field, e)).into())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeDocument {
    access_requirements: Vec<String>,
    body: String,
    recipients: BTreeMap<String, String>,
}

/// Plaintext of a wrapped content key.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KeyPayload {
    pub access_requirements: Vec<String>,
    pub key: String,
}
