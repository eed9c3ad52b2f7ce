//! Skip guards for tests against real cloud KMS keys.
//!
//! Each macro returns early from the test unless the matching
//! `DOCSEAL_TEST_*` variable holds a key reference of the right scheme and
//! the provider has credentials to use it.

/// Skip unless `DOCSEAL_TEST_KMS_KEY` is an `aws-kms://` reference and AWS
/// credentials (static keys or a profile) are present.
#[macro_export]
macro_rules! skip_without_aws {
    () => {
        match std::env::var("DOCSEAL_TEST_KMS_KEY") {
            Ok(key) if key.starts_with("aws-kms://arn:aws:kms:") => {}
            Ok(key) => {
                eprintln!(
                    "SKIPPED: DOCSEAL_TEST_KMS_KEY={} is not aws-kms://arn:aws:kms:<region>:<account>:key/<id>",
                    key
                );
                return;
            }
            Err(_) => {
                eprintln!("SKIPPED: DOCSEAL_TEST_KMS_KEY not set");
                return;
            }
        }
        if std::env::var("AWS_ACCESS_KEY_ID").is_err() && std::env::var("AWS_PROFILE").is_err() {
            eprintln!("SKIPPED: no AWS credentials (AWS_ACCESS_KEY_ID or AWS_PROFILE)");
            return;
        }
    };
}

/// Skip unless `DOCSEAL_TEST_GCP_KEY` is a `gcp-kms://` reference and
/// gcloud can mint an access token.
#[macro_export]
macro_rules! skip_without_gcp {
    () => {
        match std::env::var("DOCSEAL_TEST_GCP_KEY") {
            Ok(key) if key.starts_with("gcp-kms://projects/") => {}
            Ok(key) => {
                eprintln!(
                    "SKIPPED: DOCSEAL_TEST_GCP_KEY={} is not gcp-kms://projects/<p>/locations/<l>/keyRings/<r>/cryptoKeys/<k>",
                    key
                );
                return;
            }
            Err(_) => {
                eprintln!("SKIPPED: DOCSEAL_TEST_GCP_KEY not set");
                return;
            }
        }
        let authenticated = std::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !authenticated {
            eprintln!("SKIPPED: gcloud missing or not authenticated");
            return;
        }
    };
}
