//! KMS client adapters.
//!
//! A [`KmsClient`] wraps and unwraps small byte blobs (data-encryption keys)
//! under a master key that never leaves the KMS. Clients are constructed
//! explicitly with [`connect`] and passed to whatever needs them.
//!
//! - `aws`: AWS KMS (feature-gated)
//! - `gcp`: GCP Cloud KMS via the gcloud CLI (feature-gated)
//! - `stub`: in-process stand-in for tests (`test-kms` feature)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, KmsError, Result};

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "gcp")]
pub mod gcp;

#[cfg(any(test, feature = "test-kms"))]
pub mod stub;

const AWS_SCHEME: &str = "aws-kms://";
const GCP_SCHEME: &str = "gcp-kms://";
const STUB_SCHEME: &str = "test-kms://";

/// Trait for KMS wrap/unwrap operations.
///
/// Every call is a round-trip to the KMS. Implementations keep no
/// connection or plaintext key between calls and never retry.
pub trait KmsClient: Send + Sync + fmt::Debug {
    /// Encrypt `plaintext` under the configured master key.
    fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob previously produced by [`KmsClient::wrap`].
    fn unwrap(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// Provider backing this client.
    fn provider(&self) -> KmsProvider;
}

/// Supported KMS providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmsProvider {
    Aws,
    Gcp,
    Stub,
}

impl KmsProvider {
    /// Provider display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Stub => "stub",
        }
    }
}

/// Reference to a KMS master key.
///
/// Accepted forms:
///
/// - `aws-kms://arn:aws:kms:<region>:<account>:key/<id>` (or `alias/<name>`)
/// - `gcp-kms://projects/<p>/locations/<l>/keyRings/<r>/cryptoKeys/<k>`
/// - the same two without the scheme prefix
/// - `test-kms://<label>` with the `test-kms` feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReference {
    Aws { arn: String, region: String },
    Gcp { resource: String },
    Stub { label: String },
}

impl KeyReference {
    /// Parse a key reference string.
    ///
    /// # Errors
    ///
    /// Returns `KmsError::InvalidKeyReference` if the string matches no
    /// supported provider format.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if let Some(label) = raw.strip_prefix(STUB_SCHEME) {
            return Self::parse_stub(label);
        }

        let bare = raw
            .strip_prefix(AWS_SCHEME)
            .or_else(|| raw.strip_prefix(GCP_SCHEME))
            .unwrap_or(raw);

        if bare.starts_with("arn:") {
            return Self::parse_aws(bare);
        }
        if bare.starts_with("projects/") {
            return Self::parse_gcp(bare);
        }

        Err(invalid(format!(
            "{}. Expected {}arn:aws:kms:... or {}projects/.../cryptoKeys/...",
            raw, AWS_SCHEME, GCP_SCHEME
        )))
    }

    fn parse_aws(arn: &str) -> Result<Self> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || !parts[1].starts_with("aws") || parts[2] != "kms" {
            return Err(invalid(format!("not an AWS KMS key ARN: {}", arn)));
        }

        let region = parts[3];
        let account = parts[4];
        let resource = parts[5];

        if region.is_empty() {
            return Err(invalid(format!("missing region in {}", arn)));
        }
        if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(format!("invalid account id in {}", arn)));
        }
        let named = resource
            .strip_prefix("key/")
            .or_else(|| resource.strip_prefix("alias/"));
        if !matches!(named, Some(name) if !name.is_empty()) {
            return Err(invalid(format!(
                "expected key/<id> or alias/<name> in {}",
                arn
            )));
        }

        Ok(Self::Aws {
            arn: arn.to_string(),
            region: region.to_string(),
        })
    }

    fn parse_gcp(resource: &str) -> Result<Self> {
        let parts: Vec<&str> = resource.split('/').collect();

        if parts.len() != 8
            || parts[0] != "projects"
            || parts[2] != "locations"
            || parts[4] != "keyRings"
            || parts[6] != "cryptoKeys"
            || [1, 3, 5, 7].iter().any(|&i| parts[i].is_empty())
        {
            return Err(invalid(format!(
                "invalid GCP KMS resource name format: {}",
                resource
            )));
        }

        Ok(Self::Gcp {
            resource: resource.to_string(),
        })
    }

    #[cfg(any(test, feature = "test-kms"))]
    fn parse_stub(label: &str) -> Result<Self> {
        if label.is_empty() {
            return Err(invalid("empty test-kms label".to_string()));
        }
        Ok(Self::Stub {
            label: label.to_string(),
        })
    }

    #[cfg(not(any(test, feature = "test-kms")))]
    fn parse_stub(_label: &str) -> Result<Self> {
        Err(invalid(
            "test-kms references require building with --features test-kms".to_string(),
        ))
    }

    /// Provider that owns this key.
    pub fn provider(&self) -> KmsProvider {
        match self {
            Self::Aws { .. } => KmsProvider::Aws,
            Self::Gcp { .. } => KmsProvider::Gcp,
            Self::Stub { .. } => KmsProvider::Stub,
        }
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws { arn, .. } => write!(f, "{}{}", AWS_SCHEME, arn),
            Self::Gcp { resource } => write!(f, "{}{}", GCP_SCHEME, resource),
            Self::Stub { label } => write!(f, "{}{}", STUB_SCHEME, label),
        }
    }
}

impl FromStr for KeyReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(reason: String) -> Error {
    KmsError::InvalidKeyReference(reason).into()
}

/// Explicit credential material. Anything left unset falls back to the
/// provider's ambient discovery (environment, profiles, gcloud auth).
#[derive(Clone, Default)]
pub struct Credentials {
    /// GCP service-account JSON file.
    pub credentials_file: Option<PathBuf>,
    /// AWS shared-config profile name.
    pub profile: Option<String>,
    /// AWS static access keys.
    pub static_keys: Option<StaticKeys>,
}

/// Static AWS access keys.
#[derive(Clone)]
pub struct StaticKeys {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Option<Zeroizing<String>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("credentials_file", &self.credentials_file)
            .field("profile", &self.profile)
            .field(
                "static_keys",
                &self.static_keys.as_ref().map(|k| k.access_key_id.as_str()),
            )
            .finish()
    }
}

/// Construct the client for `reference`.
///
/// # Errors
///
/// - `KmsError::InvalidKeyReference` if the provider is not compiled in
/// - `KmsError::Credentials` if credentials cannot be loaded
pub fn connect(reference: &KeyReference, credentials: &Credentials) -> Result<Arc<dyn KmsClient>> {
    debug!(
        provider = reference.provider().name(),
        key = %reference,
        "connecting to KMS"
    );

    match reference {
        KeyReference::Aws { arn, region } => connect_aws(arn, region, credentials),
        KeyReference::Gcp { resource } => connect_gcp(resource, credentials),
        KeyReference::Stub { label } => connect_stub(label),
    }
}

#[cfg(feature = "aws")]
fn connect_aws(arn: &str, region: &str, credentials: &Credentials) -> Result<Arc<dyn KmsClient>> {
    Ok(Arc::new(aws::AwsKms::connect(arn, region, credentials)?))
}

#[cfg(not(feature = "aws"))]
fn connect_aws(_arn: &str, _region: &str, _credentials: &Credentials) -> Result<Arc<dyn KmsClient>> {
    Err(not_compiled(KmsProvider::Aws))
}

#[cfg(feature = "gcp")]
fn connect_gcp(resource: &str, credentials: &Credentials) -> Result<Arc<dyn KmsClient>> {
    Ok(Arc::new(gcp::GcpKms::connect(resource, credentials)?))
}

#[cfg(not(feature = "gcp"))]
fn connect_gcp(_resource: &str, _credentials: &Credentials) -> Result<Arc<dyn KmsClient>> {
    Err(not_compiled(KmsProvider::Gcp))
}

#[cfg(any(test, feature = "test-kms"))]
fn connect_stub(label: &str) -> Result<Arc<dyn KmsClient>> {
    Ok(Arc::new(stub::StubKms::new(label)))
}

#[cfg(not(any(test, feature = "test-kms")))]
fn connect_stub(_label: &str) -> Result<Arc<dyn KmsClient>> {
    Err(invalid(
        "test-kms references require building with --features test-kms".to_string(),
    ))
}

#[allow(dead_code)]
fn not_compiled(provider: KmsProvider) -> Error {
    invalid(format!(
        "{} KMS not compiled. Rebuild with: cargo install docseal --features {}",
        provider.name(),
        provider.name()
    ))
}
