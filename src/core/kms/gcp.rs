//! Google Cloud KMS client.
//!
//! Drives the `gcloud` CLI in a subprocess per call. Enable with
//! `--features gcp`.
//!
//! ## Requirements
//!
//! - `gcloud` CLI installed and authenticated, or a service-account JSON
//!   file passed as explicit credentials
//! - `cloudkms.cryptoKeyVersions.useToEncrypt` and `useToDecrypt` on the key

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{Credentials, KmsClient, KmsProvider};
use crate::error::{CipherError, Error, KmsError, Result};

const CREDENTIAL_OVERRIDE_ENV: &str = "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE";

/// GCP Cloud KMS client for a single crypto key.
pub struct GcpKms {
    /// Full resource name: projects/*/locations/*/keyRings/*/cryptoKeys/*
    resource: String,
    credentials_file: Option<PathBuf>,
}

impl GcpKms {
    /// Check that gcloud is installed and can authenticate, and return a
    /// client for `resource`.
    ///
    /// # Errors
    ///
    /// Returns `KmsError::Credentials` if gcloud is missing, the credentials
    /// file is unusable, or no access token can be obtained.
    pub fn connect(resource: &str, credentials: &Credentials) -> Result<Self> {
        if credentials.profile.is_some() || credentials.static_keys.is_some() {
            return Err(KmsError::Credentials(
                "profiles and static keys apply to AWS only; use a credentials file for GCP"
                    .to_string(),
            )
            .into());
        }

        if let Some(path) = &credentials.credentials_file {
            check_credentials_file(path)?;
        }

        let kms = Self {
            resource: resource.to_string(),
            credentials_file: credentials.credentials_file.clone(),
        };

        kms.check_gcloud()?;
        kms.check_auth()?;

        debug!(resource = %kms.resource, "GCP KMS credentials resolved");
        Ok(kms)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("gcloud");
        if let Some(path) = &self.credentials_file {
            cmd.env(CREDENTIAL_OVERRIDE_ENV, path);
        }
        cmd
    }

    fn check_gcloud(&self) -> Result<()> {
        let status = self
            .command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(KmsError::Credentials(
                "gcloud CLI not found. Install it from https://cloud.google.com/sdk/docs/install"
                    .to_string(),
            )
            .into()),
        }
    }

    fn check_auth(&self) -> Result<()> {
        let output = self
            .command()
            .args(["auth", "print-access-token"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| KmsError::Credentials(format!("failed to run gcloud: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KmsError::Credentials(format!(
                "gcloud is not authenticated: {}",
                stderr.trim()
            ))
            .into());
        }
        Ok(())
    }

    fn resource_parts(&self) -> Result<(&str, &str, &str, &str)> {
        let parts: Vec<&str> = self.resource.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "keyRings", ring, "cryptoKeys", key] => {
                Ok((*project, *location, *ring, *key))
            }
            _ => Err(KmsError::InvalidKeyReference(format!(
                "invalid GCP KMS resource name format: {}",
                self.resource
            ))
            .into()),
        }
    }

    /// Run `gcloud kms <operation>` with `input` on stdin, returning stdout.
    fn run(&self, operation: &str, input: &[u8]) -> Result<Vec<u8>> {
        let (project, location, ring, key) = self.resource_parts()?;
        let (input_flag, output_flag) = match operation {
            "encrypt" => ("--plaintext-file", "--ciphertext-file"),
            _ => ("--ciphertext-file", "--plaintext-file"),
        };

        let mut child = self
            .command()
            .args([
                "kms",
                operation,
                "--project",
                project,
                "--location",
                location,
                "--keyring",
                ring,
                "--key",
                key,
                input_flag,
                "-",
                output_flag,
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KmsError::Unavailable(format!("failed to spawn gcloud: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .map_err(|e| KmsError::Unavailable(format!("failed to write to gcloud: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| KmsError::Unavailable(format!("gcloud command failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify(operation, stderr.trim()));
        }

        Ok(output.stdout)
    }
}

impl fmt::Debug for GcpKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpKms")
            .field("resource", &self.resource)
            .field("credentials_file", &self.credentials_file)
            .finish()
    }
}

impl KmsClient for GcpKms {
    fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        trace!(resource = %self.resource, plaintext_len = plaintext.len(), "wrapping with GCP KMS");
        let ciphertext = self.run("encrypt", plaintext)?;
        trace!(ciphertext_len = ciphertext.len(), "wrapped with GCP KMS");
        Ok(ciphertext)
    }

    fn unwrap(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        trace!(resource = %self.resource, ciphertext_len = ciphertext.len(), "unwrapping with GCP KMS");
        self.run("decrypt", ciphertext).map(Zeroizing::new)
    }

    fn provider(&self) -> KmsProvider {
        KmsProvider::Gcp
    }
}

/// The file must exist and hold a JSON object naming its credential `type`.
fn check_credentials_file(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        KmsError::Credentials(format!("cannot read {}: {}", path.display(), e))
    })?;

    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        KmsError::Credentials(format!("{} is not valid JSON: {}", path.display(), e))
    })?;

    match value.get("type").and_then(|t| t.as_str()) {
        Some(_) => Ok(()),
        None => Err(KmsError::Credentials(format!(
            "{} is not a credentials file (missing \"type\")",
            path.display()
        ))
        .into()),
    }
}

fn classify(operation: &str, stderr: &str) -> Error {
    if stderr.contains("PERMISSION_DENIED") {
        return KmsError::AccessDenied(format!("{}: {}", operation, stderr)).into();
    }
    if operation == "decrypt"
        && (stderr.contains("Decryption failed") || stderr.contains("INVALID_ARGUMENT"))
    {
        return CipherError::IntegrityFailure.into();
    }
    KmsError::Unavailable(format!("gcloud kms {} failed: {}", operation, stderr)).into()
}
