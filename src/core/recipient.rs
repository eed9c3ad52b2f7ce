//! Recipient domains and the directory of their public keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::constants::{DEFAULT_FALLBACK_KEY_URL, FALLBACK_DOMAIN};
use crate::core::fetch::KeyFetcher;
use crate::core::keys::PublicKeyset;
use crate::error::{PolicyError, Result};

/// A normalized recipient domain: trimmed, lower-case, `[a-z0-9.-_]+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Normalize and validate a domain name.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::InvalidDomain` for empty input or characters
    /// outside `[a-z0-9.-_]` after lower-casing.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(invalid(raw, "domain cannot be empty"));
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_')))
        {
            return Err(invalid(raw, &format!("invalid character '{}'", c)));
        }

        Ok(Self(normalized))
    }

    /// The reserved fallback domain.
    pub fn fallback() -> Self {
        Self(FALLBACK_DOMAIN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_DOMAIN
    }
}

fn invalid(raw: &str, reason: &str) -> crate::error::Error {
    PolicyError::InvalidDomain {
        domain: raw.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Domain {
    type Error = crate::error::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a recipient's public keyset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocation {
    /// Already-parsed keyset.
    Inline(PublicKeyset),
    /// `http(s)://` or `file://` URL, or a filesystem path.
    Url(String),
}

/// A recipient domain with its resolved public keyset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEntry {
    pub domain: Domain,
    pub public_key: PublicKeyset,
}

/// Recipient domains and where to find their public keys.
///
/// Domains are unique after normalization; [`RecipientDirectory::insert`]
/// is the only way in.
#[derive(Debug, Clone, Default)]
pub struct RecipientDirectory {
    entries: BTreeMap<Domain, KeyLocation>,
}

impl RecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(domain, location)` string pairs.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid or duplicate domain.
    pub fn from_locations<I, D, L>(locations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (D, L)>,
        D: AsRef<str>,
        L: Into<String>,
    {
        let mut directory = Self::new();
        for (domain, location) in locations {
            directory.insert(domain.as_ref(), KeyLocation::Url(location.into()))?;
        }
        Ok(directory)
    }

    /// Add a recipient.
    ///
    /// # Errors
    ///
    /// - `PolicyError::InvalidDomain` if `domain` does not normalize
    /// - `PolicyError::InvalidRecipientSet` if the normalized domain is
    ///   already present
    pub fn insert(&mut self, domain: &str, location: KeyLocation) -> Result<Domain> {
        let domain = Domain::parse(domain)?;
        if self.entries.contains_key(&domain) {
            return Err(PolicyError::InvalidRecipientSet(format!(
                "duplicate recipient domain '{}'",
                domain
            ))
            .into());
        }
        self.entries.insert(domain.clone(), location);
        Ok(domain)
    }

    /// Drop a recipient. Returns whether it was present.
    pub fn remove(&mut self, domain: &str) -> bool {
        match Domain::parse(domain) {
            Ok(domain) => self.entries.remove(&domain).is_some(),
            Err(_) => false,
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        Domain::parse(domain)
            .map(|d| self.entries.contains_key(&d))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch every public keyset, synthesizing the fallback recipient
    /// from [`DEFAULT_FALLBACK_KEY_URL`] if absent.
    ///
    /// All-or-nothing: the first failure aborts the whole resolution.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::PublicKeyRetrievalFailed` naming the domain
    /// whose keyset could not be fetched or parsed.
    pub fn resolve(&self, fetcher: &dyn KeyFetcher) -> Result<Vec<RecipientEntry>> {
        let mut locations: Vec<(Domain, KeyLocation)> = self
            .entries
            .iter()
            .map(|(d, l)| (d.clone(), l.clone()))
            .collect();

        if !self.entries.contains_key(&Domain::fallback()) {
            warn!(
                domain = FALLBACK_DOMAIN,
                url = DEFAULT_FALLBACK_KEY_URL,
                "no key configured for fallback domain, using default key URL"
            );
            locations.push((
                Domain::fallback(),
                KeyLocation::Url(DEFAULT_FALLBACK_KEY_URL.to_string()),
            ));
        }

        let mut resolved = Vec::with_capacity(locations.len());
        for (domain, location) in locations {
            let public_key = match location {
                KeyLocation::Inline(keyset) => keyset,
                KeyLocation::Url(url) => {
                    debug!(domain = %domain, url = %url, "fetching public keyset");
                    fetcher.fetch(&url).map_err(|e| PolicyError::PublicKeyRetrievalFailed {
                        domain: domain.to_string(),
                        reason: e.to_string(),
                    })?
                }
            };
            resolved.push(RecipientEntry { domain, public_key });
        }

        debug!(recipients = resolved.len(), "recipient keys resolved");
        Ok(resolved)
    }
}
