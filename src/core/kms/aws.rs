//! AWS KMS client.
//!
//! Enable with `--features aws`. Credentials come from the default provider
//! chain (environment, shared config, IMDS) unless a profile or static keys
//! are configured. The region is taken from the key ARN.

use std::fmt;

use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{Credentials, KmsClient, KmsProvider};
use crate::error::{CipherError, Error, KmsError, Result};

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDeniedException",
    "IncorrectKeyException",
    "DisabledException",
    "KMSInvalidStateException",
];

/// AWS KMS client for a single master key.
///
/// Holds only the key ARN, region and credential selection. Every call
/// builds its own runtime and SDK client.
pub struct AwsKms {
    arn: String,
    region: String,
    credentials: Credentials,
}

impl AwsKms {
    /// Validate that credentials resolve and return a client for `arn`.
    ///
    /// # Errors
    ///
    /// Returns `KmsError::Credentials` if no credentials can be loaded.
    pub fn connect(arn: &str, region: &str, credentials: &Credentials) -> Result<Self> {
        if credentials.credentials_file.is_some() {
            return Err(KmsError::Credentials(
                "a credentials file applies to GCP only; use a profile or static keys for AWS"
                    .to_string(),
            )
            .into());
        }

        let kms = Self {
            arn: arn.to_string(),
            region: region.to_string(),
            credentials: credentials.clone(),
        };

        kms.block_on(async {
            let config = kms.load_config().await;
            let provider = config.credentials_provider().ok_or_else(|| {
                KmsError::Credentials("no AWS credentials provider configured".to_string())
            })?;
            provider
                .provide_credentials()
                .await
                .map_err(|e| KmsError::Credentials(DisplayErrorContext(&e).to_string()))?;
            Ok::<_, Error>(())
        })?;

        debug!(region = %kms.region, "AWS KMS credentials resolved");
        Ok(kms)
    }

    fn block_on<F, T>(&self, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| KmsError::Unavailable(format!("failed to create runtime: {}", e)))?;
        rt.block_on(future)
    }

    async fn load_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(profile) = &self.credentials.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(keys) = &self.credentials.static_keys {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                keys.access_key_id.clone(),
                keys.secret_access_key.as_str().to_string(),
                keys.session_token.as_ref().map(|t| t.as_str().to_string()),
                None,
                "docseal-static",
            ));
        }

        loader.load().await
    }

    async fn client(&self) -> aws_sdk_kms::Client {
        aws_sdk_kms::Client::new(&self.load_config().await)
    }
}

impl fmt::Debug for AwsKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsKms")
            .field("arn", &self.arn)
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl KmsClient for AwsKms {
    fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        trace!(arn = %self.arn, plaintext_len = plaintext.len(), "wrapping with AWS KMS");

        self.block_on(async {
            let output = self
                .client()
                .await
                .encrypt()
                .key_id(&self.arn)
                .plaintext(Blob::new(plaintext))
                .send()
                .await
                .map_err(|e| classify(e, "encrypt"))?;

            let blob = output
                .ciphertext_blob()
                .ok_or_else(|| KmsError::Unavailable("no ciphertext returned".to_string()))?;

            trace!(ciphertext_len = blob.as_ref().len(), "wrapped with AWS KMS");
            Ok::<_, Error>(blob.as_ref().to_vec())
        })
    }

    fn unwrap(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        trace!(arn = %self.arn, ciphertext_len = ciphertext.len(), "unwrapping with AWS KMS");

        self.block_on(async {
            let output = self
                .client()
                .await
                .decrypt()
                .key_id(&self.arn)
                .ciphertext_blob(Blob::new(ciphertext))
                .send()
                .await
                .map_err(|e| classify(e, "decrypt"))?;

            let plaintext = output
                .plaintext()
                .ok_or_else(|| KmsError::Unavailable("no plaintext returned".to_string()))?;

            Ok::<_, Error>(Zeroizing::new(plaintext.as_ref().to_vec()))
        })
    }

    fn provider(&self) -> KmsProvider {
        KmsProvider::Aws
    }
}

fn classify<E, R>(err: SdkError<E, R>, operation: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);

    match code.as_deref() {
        Some("InvalidCiphertextException") => CipherError::IntegrityFailure.into(),
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => {
            KmsError::AccessDenied(format!("{} rejected: {}", operation, code)).into()
        }
        _ => KmsError::Unavailable(format!(
            "{} failed: {}",
            operation,
            DisplayErrorContext(&err)
        ))
        .into(),
    }
}
