//! Configuration file management.
//!
//! Handles reading, writing, and validating `docseal.toml`. Relative paths
//! in the file are resolved against the directory that contains it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::constants;
use crate::core::kms::{Credentials, KeyReference};
use crate::core::recipient::RecipientDirectory;
use crate::error::{ConfigError, Result};

/// Project configuration stored in `docseal.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// KMS master key protecting the private keyset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms: Option<KmsConfig>,
    /// Where the key artifacts live
    #[serde(default)]
    pub keys: KeyPaths,
    /// Recipient domain to public keyset location (URL or path)
    #[serde(default)]
    pub recipients: BTreeMap<String, String>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// KMS section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Master key reference.
    ///
    /// - AWS: `aws-kms://arn:aws:kms:us-east-1:123456789012:key/abc-123`
    /// - GCP: `gcp-kms://projects/p/locations/global/keyRings/r/cryptoKeys/k`
    pub key: String,
    /// GCP service-account credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathBuf>,
    /// AWS shared-config profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Key artifact paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPaths {
    pub private: PathBuf,
    pub public: PathBuf,
}

impl Default for KeyPaths {
    fn default() -> Self {
        Self {
            private: PathBuf::from(constants::PRIVATE_KEYSET_FILE),
            public: PathBuf::from(constants::PUBLIC_KEYSET_FILE),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate configuration from `path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file doesn't exist,
    /// `ConfigError::Parse` if the TOML is malformed, or a validation error.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        debug!(
            recipients = config.recipients.len(),
            kms = config.kms.is_some(),
            "config loaded"
        );

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving config");

        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate the configuration contents
    ///
    /// Checks:
    /// - The KMS key reference parses
    /// - Recipient domains are valid and unique after normalization
    /// - Recipient locations are non-empty
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::MissingField`.
    pub fn validate(&self) -> Result<()> {
        debug!("validating config");

        if let Some(kms) = &self.kms {
            if kms.key.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "kms.key" }.into());
            }
            KeyReference::parse(&kms.key).map_err(|e| ConfigError::InvalidValue {
                field: "kms.key",
                reason: e.to_string(),
            })?;
        }

        for (domain, location) in &self.recipients {
            if location.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "recipients",
                    reason: format!("empty key location for '{}'", domain),
                }
                .into());
            }
        }

        RecipientDirectory::from_locations(&self.recipients).map_err(|e| {
            ConfigError::InvalidValue {
                field: "recipients",
                reason: e.to_string(),
            }
        })?;

        Ok(())
    }

    /// The configured master key reference, if any.
    pub fn key_reference(&self) -> Result<Option<KeyReference>> {
        self.kms
            .as_ref()
            .map(|k| KeyReference::parse(&k.key))
            .transpose()
    }

    /// Explicit credential selection from the KMS section.
    pub fn credentials(&self) -> Credentials {
        match &self.kms {
            Some(kms) => Credentials {
                credentials_file: kms.credentials.as_ref().map(|p| self.resolve(p)),
                profile: kms.profile.clone(),
                static_keys: None,
            },
            None => Credentials::default(),
        }
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.resolve(&self.keys.private)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.resolve(&self.keys.public)
    }

    /// Recipient directory from the `[recipients]` table.
    ///
    /// URLs pass through unchanged; relative paths resolve against the
    /// config file's directory like every other path in it.
    pub fn recipient_directory(&self) -> Result<RecipientDirectory> {
        RecipientDirectory::from_locations(
            self.recipients
                .iter()
                .map(|(domain, location)| (domain, self.resolve_location(location))),
        )
    }

    fn resolve_location(&self, location: &str) -> String {
        if location.contains("://") {
            return location.to_string();
        }
        self.resolve(Path::new(location))
            .to_string_lossy()
            .into_owned()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
