//! Encrypt command - seal the content section of an HTML document.

use std::path::Path;

use tracing::info;

use crate::cli::output;
use crate::core::carrier;
use crate::core::config::Config;
use crate::core::constants::LOCAL_DOMAIN;
use crate::core::envelope::EnvelopeBuilder;
use crate::core::fetch::HttpKeyFetcher;
use crate::core::recipient::{KeyLocation, RecipientDirectory};
use crate::error::{PolicyError, Result};

/// Encrypt `input` for the configured recipients plus any `--recipient`
/// flags, which override config entries for the same domain.
pub fn execute(
    config: &Config,
    input: &Path,
    output_path: &Path,
    access_requirements: Vec<String>,
    recipients: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let directory = merge_recipients(config, recipients)?;

    let html = std::fs::read_to_string(input)?;
    let content = carrier::extract_content(&html)?;

    let fetcher = HttpKeyFetcher::new()?;
    output::progress("fetching recipient keys");
    let built = EnvelopeBuilder::new(&fetcher).build(
        content.as_bytes(),
        access_requirements,
        &directory,
    );
    output::progress_done(built.is_ok());
    let envelope = built?;

    let sealed = if json {
        envelope.to_json()?
    } else {
        carrier::seal(&html, &envelope)?
    };
    std::fs::write(output_path, sealed)?;

    info!(
        input = %input.display(),
        recipients = envelope.recipients().len(),
        "document encrypted"
    );

    output::success(&format!(
        "encrypted {} for {} recipient(s)",
        output::path(input.display()),
        envelope.recipients().len()
    ));
    output::kv("output", output::path(output_path.display()));
    Ok(())
}

/// Config recipients with `--recipient` flags layered on top. Flag paths
/// stay relative to the working directory.
fn merge_recipients(
    config: &Config,
    flags: Vec<(String, String)>,
) -> Result<RecipientDirectory> {
    let mut directory = config.recipient_directory()?;
    for (domain, location) in flags {
        directory.remove(&domain);
        directory.insert(&domain, KeyLocation::Url(location))?;
    }

    if !directory.contains(LOCAL_DOMAIN) {
        return Err(PolicyError::InvalidRecipientSet(format!(
            "a key location for '{}' is required",
            LOCAL_DOMAIN
        ))
        .into());
    }

    Ok(directory)
}
