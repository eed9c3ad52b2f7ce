//! Keygen command - create a document key pair.

use std::path::PathBuf;

use tracing::info;

use crate::cli::{connect_kms, output, KmsArgs};
use crate::core::aead::EnvelopeAead;
use crate::core::config::Config;
use crate::core::keys::KeyManager;
use crate::error::{KeyError, Result};

/// Generate a key pair, protect the private keyset and write both halves.
pub fn execute(
    config: &Config,
    kms: &KmsArgs,
    private: Option<PathBuf>,
    public: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let private_path = private.unwrap_or_else(|| config.private_key_path());
    let public_path = public.unwrap_or_else(|| config.public_key_path());

    // Both paths are checked before the KMS is touched.
    if !force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                return Err(KeyError::AlreadyExists(path.clone()).into());
            }
        }
    }

    let client = connect_kms(config, kms)?;
    let provider = client.provider();
    let manager = KeyManager::new(EnvelopeAead::new(client));

    let pair = manager.generate();
    let protected = manager.protect(pair.private())?;
    let public_json = manager.export_public(&pair)?;

    protected.save(&private_path, force)?;
    std::fs::write(&public_path, public_json)?;

    info!(
        key_id = pair.public().primary_key_id(),
        provider = provider.name(),
        "generated document key pair"
    );

    output::success(&format!(
        "generated key pair (protected with {})",
        provider.name()
    ));
    output::kv("private", output::path(private_path.display()));
    output::kv("public", output::path(public_path.display()));
    output::hint("publish the public keyset where recipients can fetch it");
    Ok(())
}
