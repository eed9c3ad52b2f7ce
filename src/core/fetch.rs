//! Public keyset retrieval.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::core::constants::FETCH_TIMEOUT_SECS;
use crate::core::keys::PublicKeyset;
use crate::error::{Error, KeyError, Result};

/// Resolves a key location to a parsed public keyset.
pub trait KeyFetcher {
    fn fetch(&self, location: &str) -> Result<PublicKeyset>;
}

/// Fetches `http(s)://` URLs with a blocking GET and reads `file://` URLs
/// and bare paths from disk.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    client: reqwest::blocking::Client,
}

impl HttpKeyFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| fetch_error("http client", e))?;
        Ok(Self { client })
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(url, format!("server returned {}", status)));
        }

        let body = response.bytes().map_err(|e| fetch_error(url, e))?;
        Ok(body.to_vec())
    }
}

impl KeyFetcher for HttpKeyFetcher {
    fn fetch(&self, location: &str) -> Result<PublicKeyset> {
        debug!(location, "fetching public keyset");

        let bytes = if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch_http(location)?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            std::fs::read(Path::new(path)).map_err(|e| fetch_error(location, e))?
        };

        PublicKeyset::from_json(&bytes)
    }
}

fn fetch_error(location: &str, reason: impl std::fmt::Display) -> Error {
    KeyError::Fetch {
        location: location.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
