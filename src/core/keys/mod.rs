//! Document key pair management.
//!
//! The private keyset only ever leaves memory sealed by the
//! [`EnvelopeAead`], i.e. encrypted under a data key that the KMS wraps.
//! The public keyset is exported in cleartext for publishers to fetch.

mod keyset;

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

pub use keyset::{DocumentKeyPair, PrivateKeyset, PublicKey, PublicKeyset};

use crate::core::aead::EnvelopeAead;
use crate::error::{KeyError, Result};

/// An envelope-encrypted private keyset.
///
/// Persisted as base64 text. Safe to store anywhere: opening it requires
/// the KMS master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedKeyset(Vec<u8>);

impl ProtectedKeyset {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Parse base64 text, ignoring surrounding whitespace.
    pub fn from_base64(text: &str) -> Result<Self> {
        BASE64
            .decode(text.trim())
            .map(Self)
            .map_err(|e| KeyError::InvalidKeyset(format!("protected keyset is not base64: {}", e)).into())
    }

    /// Write the base64 form to `path` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::AlreadyExists` if `path` exists and `force` is false.
    pub fn save(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(KeyError::AlreadyExists(path.to_path_buf()).into());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, format!("{}\n", self.to_base64()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "protected keyset saved");
        Ok(())
    }

    /// Read a keyset written by [`ProtectedKeyset::save`].
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading protected keyset");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = fs::metadata(path) {
                let mode = metadata.permissions().mode() & 0o777;
                if mode & 0o077 != 0 {
                    warn!(
                        path = %path.display(),
                        mode = %format!("{:o}", mode),
                        "protected keyset is readable by other users"
                    );
                }
            }
        }

        let text = fs::read_to_string(path)?;
        Self::from_base64(&text)
    }
}

/// Generates, protects, exports and recovers document key pairs.
#[derive(Debug, Clone)]
pub struct KeyManager {
    aead: EnvelopeAead,
}

impl KeyManager {
    pub fn new(aead: EnvelopeAead) -> Self {
        Self { aead }
    }

    /// Fresh key pair from the OS CSPRNG. Nothing is persisted.
    pub fn generate(&self) -> DocumentKeyPair {
        DocumentKeyPair::generate()
    }

    /// Add a fresh primary key to `pair`, keeping older keys for decryption.
    pub fn rotate(&self, pair: &mut DocumentKeyPair) -> u32 {
        pair.rotate()
    }

    /// Seal the private keyset under the envelope AEAD.
    ///
    /// # Errors
    ///
    /// Propagates KMS failures; the plaintext keyset is never written out.
    pub fn protect(&self, private: &PrivateKeyset) -> Result<ProtectedKeyset> {
        let plaintext = private.to_canonical_bytes()?;
        let sealed = self.aead.seal(&plaintext)?;
        debug!(
            keys = private.len(),
            provider = self.aead.kms().provider().name(),
            "private keyset protected"
        );
        Ok(ProtectedKeyset(sealed))
    }

    /// The public keyset as pretty JSON.
    pub fn export_public(&self, pair: &DocumentKeyPair) -> Result<Vec<u8>> {
        pair.public().to_json()
    }

    /// Open a protected keyset.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::RecoveryFailed` wrapping the underlying KMS,
    /// integrity or parse failure.
    pub fn recover(&self, protected: &ProtectedKeyset) -> Result<PrivateKeyset> {
        let recovered = self
            .aead
            .open(protected.as_bytes())
            .and_then(|plaintext| PrivateKeyset::from_canonical_bytes(&plaintext));

        match recovered {
            Ok(private) => {
                debug!(keys = private.len(), "private keyset recovered");
                Ok(private)
            }
            Err(e) => Err(KeyError::RecoveryFailed(Box::new(e)).into()),
        }
    }

    /// Recover and rebuild the full pair.
    pub fn recover_pair(&self, protected: &ProtectedKeyset) -> Result<DocumentKeyPair> {
        self.recover(protected).map(DocumentKeyPair::from_private)
    }
}
