//! Decrypt command - open a sealed document as a recipient domain.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::{connect_kms, output, read_envelope, KmsArgs};
use crate::core::aead::EnvelopeAead;
use crate::core::carrier;
use crate::core::config::Config;
use crate::core::envelope::EnvelopeOpener;
use crate::core::keys::{KeyManager, ProtectedKeyset};
use crate::error::{DocumentError, Result};

/// Recover the private keyset through the KMS and open `input` as `domain`.
///
/// A sealed carrier comes back as the restored HTML document; envelope
/// JSON comes back as the bare decrypted content.
pub fn execute(
    config: &Config,
    kms: &KmsArgs,
    input: &Path,
    output_path: Option<&Path>,
    domain: &str,
    private: Option<PathBuf>,
) -> Result<()> {
    let (text, envelope, is_json) = read_envelope(input)?;

    let private_path = private.unwrap_or_else(|| config.private_key_path());
    let protected = ProtectedKeyset::load(&private_path)?;
    let manager = KeyManager::new(EnvelopeAead::new(connect_kms(config, kms)?));
    let keyset = manager.recover(&protected)?;

    let body = EnvelopeOpener::new().open(&envelope, domain, &keyset)?;
    let content = String::from_utf8(body).map_err(|_| DocumentError::InvalidUtf8)?;

    let rendered = if is_json {
        content
    } else {
        carrier::restore(&text, &content)?
    };

    match output_path {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            output::success(&format!(
                "decrypted {} as {}",
                output::path(input.display()),
                domain
            ));
            output::kv("output", output::path(path.display()));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }

    info!(domain, input = %input.display(), "document decrypted");
    Ok(())
}
