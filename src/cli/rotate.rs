//! Rotate command - add a new primary document key.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::{connect_kms, output, KmsArgs};
use crate::core::aead::EnvelopeAead;
use crate::core::config::Config;
use crate::core::keys::{KeyManager, ProtectedKeyset};
use crate::error::Result;

/// Recover the key pair, rotate it and write both halves back.
///
/// Older keys stay in the private keyset so documents sealed before the
/// rotation still open, unless `prune` drops them.
pub fn execute(
    config: &Config,
    kms: &KmsArgs,
    private: Option<PathBuf>,
    public: Option<PathBuf>,
    prune: bool,
) -> Result<()> {
    let private_path = private.unwrap_or_else(|| config.private_key_path());
    let public_path = public.unwrap_or_else(|| config.public_key_path());

    let protected = ProtectedKeyset::load(&private_path)?;
    let manager = KeyManager::new(EnvelopeAead::new(connect_kms(config, kms)?));

    output::progress("recovering private keyset");
    let mut pair = match manager.recover_pair(&protected) {
        Ok(pair) => {
            output::progress_done(true);
            pair
        }
        Err(e) => {
            output::progress_done(false);
            return Err(e);
        }
    };

    let previous = pair.public().primary_key_id();
    let key_id = manager.rotate(&mut pair);

    let mut pruned = 0usize;
    if prune {
        for old in pair.private().key_ids() {
            if old != key_id {
                pair.remove(old)?;
                pruned += 1;
            }
        }
    }

    let protected = manager.protect(pair.private())?;
    write_halves(&private_path, &public_path, &protected, &manager.export_public(&pair)?)?;

    info!(previous, key_id, pruned, "rotated document key pair");

    output::success(&format!("rotated primary key {} -> {}", previous, key_id));
    output::kv("keys", pair.private().len());
    if pruned > 0 {
        output::warn(&format!(
            "removed {} old key(s); documents sealed to them no longer open",
            pruned
        ));
    }
    output::hint(&format!(
        "republish {} so new documents use the new key",
        output::path(public_path.display())
    ));
    Ok(())
}

/// Stage both halves next to their targets, then rename them into place.
/// A failed write leaves the existing pair untouched.
fn write_halves(
    private_path: &Path,
    public_path: &Path,
    protected: &ProtectedKeyset,
    public_json: &[u8],
) -> Result<()> {
    let private_tmp = staged(private_path);
    let public_tmp = staged(public_path);

    protected.save(&private_tmp, true)?;
    if let Err(e) = fs::write(&public_tmp, public_json) {
        let _ = fs::remove_file(&private_tmp);
        return Err(e.into());
    }

    fs::rename(&private_tmp, private_path)?;
    fs::rename(&public_tmp, public_path)?;
    Ok(())
}

fn staged(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::core::kms::stub::StubKms;

    fn sample_keyset() -> ProtectedKeyset {
        let manager = KeyManager::new(EnvelopeAead::new(Arc::new(StubKms::new("rotate"))));
        let pair = manager.generate();
        manager.protect(pair.private()).unwrap()
    }

    #[test]
    fn test_write_halves_replaces_both() {
        let tmp = TempDir::new().unwrap();
        let private_path = tmp.path().join("private.b64");
        let public_path = tmp.path().join("public.json");
        fs::write(&private_path, "old").unwrap();
        fs::write(&public_path, "old").unwrap();

        let protected = sample_keyset();
        write_halves(&private_path, &public_path, &protected, b"{}").unwrap();

        assert_eq!(ProtectedKeyset::load(&private_path).unwrap(), protected);
        assert_eq!(fs::read_to_string(&public_path).unwrap(), "{}");
        assert!(!staged(&private_path).exists());
        assert!(!staged(&public_path).exists());
    }

    #[test]
    fn test_failed_public_write_keeps_old_private() {
        let tmp = TempDir::new().unwrap();
        let private_path = tmp.path().join("private.b64");
        fs::write(&private_path, "old").unwrap();
        fs::write(tmp.path().join("blocker"), "").unwrap();
        let public_path = tmp.path().join("blocker").join("public.json");

        let protected = sample_keyset();
        assert!(write_halves(&private_path, &public_path, &protected, b"{}").is_err());

        assert_eq!(fs::read_to_string(&private_path).unwrap(), "old");
        assert!(!staged(&private_path).exists());
    }

    #[test]
    fn test_staged_name() {
        assert_eq!(
            staged(Path::new("keys/private.b64")),
            PathBuf::from("keys/private.b64.tmp")
        );
    }
}
