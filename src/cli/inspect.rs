//! Inspect command - show what a sealed document was sealed for.

use std::path::Path;

use serde::Serialize;

use crate::cli::{output, read_envelope};
use crate::error::{DocumentError, Result};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    access_requirements: &'a [String],
    recipients: Vec<&'a str>,
    body_len: usize,
}

/// Print access requirements and recipient domains. Needs no keys.
pub fn execute(input: &Path, json: bool) -> Result<()> {
    let (_, envelope, _) = read_envelope(input)?;

    let summary = Summary {
        access_requirements: envelope.access_requirements(),
        recipients: envelope.recipients().keys().map(|d| d.as_str()).collect(),
        body_len: envelope.body().len(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|e| DocumentError::InvalidEnvelope(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }

    output::header(&format!("{}", input.display()));
    output::kv("body", format!("{} bytes", summary.body_len));
    println!();
    output::header("access requirements");
    for requirement in summary.access_requirements {
        output::list_item(requirement);
    }
    println!();
    output::header("recipients");
    for domain in &summary.recipients {
        output::list_item(domain);
    }
    Ok(())
}
