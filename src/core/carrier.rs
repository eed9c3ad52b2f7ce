//! HTML carrier documents.
//!
//! An envelope travels inside the page it protects: the body ciphertext
//! replaces the content of the first
//! `<section subscriptions-section="content" encrypted>` element, and the
//! wrapped keys go into a `<script type="application/json" cryptokeys>`
//! block in `<head>`. Nothing else in the document is parsed or touched.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants::{KEY_BLOCK_OPEN, SECTION_OPEN};
use crate::core::envelope::DocumentEnvelope;
use crate::error::{DocumentError, Result};

const SECTION_TAG: &str = "<section";
const SECTION_CLOSE: &str = "</section";
const SCRIPT_CLOSE: &str = "</script>";
const HEAD_CLOSE: &str = "</head>";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyBlock {
    access_requirements: Vec<String>,
    encrypted_keys: BTreeMap<String, String>,
}

/// The plaintext inside the content section.
pub fn extract_content(html: &str) -> Result<&str> {
    let (start, end) = locate_section(html)?;
    Ok(&html[start..end])
}

/// Embed `envelope` into `html`, replacing the section content with the
/// body ciphertext and writing (or replacing) the key block.
///
/// # Errors
///
/// `DocumentError` if the content section or `</head>` is missing.
pub fn seal(html: &str, envelope: &DocumentEnvelope) -> Result<String> {
    let (start, end) = locate_section(html)?;
    let mut out = String::with_capacity(html.len() + envelope.body().len() * 2);
    out.push_str(&html[..start]);
    out.push_str(&BASE64.encode(envelope.body()));
    out.push_str(&html[end..]);

    let out = strip_key_block(&out);

    let head = find_ascii_ci(&out, HEAD_CLOSE, 0).ok_or(DocumentError::MissingHead)?;
    let block = render_key_block(envelope)?;

    let mut sealed = String::with_capacity(out.len() + block.len() + 1);
    sealed.push_str(&out[..head]);
    sealed.push_str(&block);
    sealed.push('\n');
    sealed.push_str(&out[head..]);

    debug!(
        html_len = html.len(),
        sealed_len = sealed.len(),
        recipients = envelope.recipients().len(),
        "envelope embedded in carrier"
    );
    Ok(sealed)
}

/// Read the envelope back out of a sealed carrier.
pub fn extract(html: &str) -> Result<DocumentEnvelope> {
    let (start, end) = locate_section(html)?;
    let body: String = html[start..end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let body = BASE64
        .decode(body)
        .map_err(|e| DocumentError::InvalidEnvelope(format!("section is not base64: {}", e)))?;

    let (block_start, block_end) = locate_key_block(html)?;
    let json = &html[block_start + KEY_BLOCK_OPEN.len()..block_end - SCRIPT_CLOSE.len()];
    let block: KeyBlock = serde_json::from_str(json.trim())
        .map_err(|e| DocumentError::InvalidEnvelope(format!("invalid key block: {}", e)))?;

    DocumentEnvelope::from_encoded(body, block.access_requirements, block.encrypted_keys)
}

/// Put decrypted content back into the section and drop the key block.
pub fn restore(html: &str, plaintext: &str) -> Result<String> {
    let (start, end) = locate_section(html)?;
    let mut out = String::with_capacity(html.len() + plaintext.len());
    out.push_str(&html[..start]);
    out.push_str(plaintext);
    out.push_str(&html[end..]);
    Ok(strip_key_block(&out))
}

fn render_key_block(envelope: &DocumentEnvelope) -> Result<String> {
    let block = KeyBlock {
        access_requirements: envelope.access_requirements().to_vec(),
        encrypted_keys: envelope
            .recipients()
            .iter()
            .map(|(d, k)| (d.to_string(), BASE64.encode(k)))
            .collect(),
    };
    let json = serde_json::to_string(&block)
        .map_err(|e| DocumentError::InvalidEnvelope(e.to_string()))?;

    // Keep the JSON from closing the script element early.
    let json = json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026");

    Ok(format!("{}{}{}", KEY_BLOCK_OPEN, json, SCRIPT_CLOSE))
}

/// Byte range of the first content section's inner HTML.
fn locate_section(html: &str) -> Result<(usize, usize)> {
    let open = find_ascii_ci(html, SECTION_OPEN, 0).ok_or(DocumentError::MissingSection)?;
    let inner_start = html[open..]
        .find('>')
        .map(|i| open + i + 1)
        .ok_or(DocumentError::UnterminatedSection)?;

    let mut depth = 1usize;
    let mut pos = inner_start;
    loop {
        let next_open = find_tag(html, SECTION_TAG, pos);
        let next_close =
            find_tag(html, SECTION_CLOSE, pos).ok_or(DocumentError::UnterminatedSection)?;

        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + SECTION_TAG.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Ok((inner_start, next_close));
                }
                pos = next_close + SECTION_CLOSE.len();
            }
        }
    }
}

/// Byte range of the key block, from its opening tag through `</script>`.
fn locate_key_block(html: &str) -> Result<(usize, usize)> {
    let start = find_ascii_ci(html, KEY_BLOCK_OPEN, 0).ok_or(DocumentError::MissingKeyBlock)?;
    let close = find_ascii_ci(html, SCRIPT_CLOSE, start + KEY_BLOCK_OPEN.len())
        .ok_or(DocumentError::MissingKeyBlock)?;
    Ok((start, close + SCRIPT_CLOSE.len()))
}

fn strip_key_block(html: &str) -> String {
    match locate_key_block(html) {
        Ok((start, mut end)) => {
            if html[end..].starts_with('\n') {
                end += 1;
            }
            format!("{}{}", &html[..start], &html[end..])
        }
        Err(_) => html.to_string(),
    }
}

/// Find `tag` where it is followed by whitespace, `>` or `/`, so that
/// `<section` does not match `<sections`.
fn find_tag(html: &str, tag: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = find_ascii_ci(html, tag, pos) {
        let next = html.as_bytes().get(i + tag.len()).copied();
        match next {
            Some(b) if b.is_ascii_whitespace() || b == b'>' || b == b'/' => return Some(i),
            None => return None,
            _ => pos = i + tag.len(),
        }
    }
    None
}

/// ASCII case-insensitive search for `needle` in `haystack[from..]`.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from > hay.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|i| from + i)
}
