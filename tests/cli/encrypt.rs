//! Tests for `docseal encrypt`. Encryption only needs public keys, so
//! these run without any KMS.

use crate::support::*;
use predicates::prelude::*;

use docseal::core::carrier;
use docseal::core::envelope::{DocumentEnvelope, EnvelopeOpener};
use docseal::core::keys::DocumentKeyPair;

struct Keys {
    local: DocumentKeyPair,
    google: DocumentKeyPair,
}

fn publish(t: &Test) -> Keys {
    let local = DocumentKeyPair::generate();
    let google = DocumentKeyPair::generate();
    std::fs::write(t.path("local.json"), local.public().to_json().unwrap()).unwrap();
    std::fs::write(t.path("google.json"), google.public().to_json().unwrap()).unwrap();
    Keys { local, google }
}

#[test]
fn test_encrypt_html() {
    let t = Test::new();
    let keys = publish(&t);
    t.write("page.html", PAGE);

    let output = t
        .cmd()
        .args([
            "encrypt",
            "--input",
            "page.html",
            "--output",
            "sealed.html",
            "--access-requirement",
            "subscriber",
            "--recipient",
            "local,local.json",
            "--recipient",
            "google.com,google.json",
        ])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "2 recipient(s)");

    let sealed = t.read("sealed.html");
    assert!(!sealed.contains("Subscribers only."));

    let envelope = carrier::extract(&sealed).unwrap();
    assert_eq!(envelope.access_requirements(), ["subscriber"]);
    let body = EnvelopeOpener::new()
        .open(&envelope, "local", keys.local.private())
        .unwrap();
    assert_eq!(body, PAGE_CONTENT.as_bytes());

    let body = EnvelopeOpener::new()
        .open(&envelope, "other.example", keys.google.private())
        .unwrap();
    assert_eq!(body, PAGE_CONTENT.as_bytes());
}

#[test]
fn test_encrypt_json_with_config_recipients() {
    let t = Test::new();
    let keys = publish(&t);
    t.write("page.html", PAGE);
    t.write(
        "docseal.toml",
        "[recipients]\nlocal = \"local.json\"\n\"google.com\" = \"google.json\"\n",
    );

    let output = t
        .cmd()
        .args([
            "encrypt", "-i", "page.html", "-o", "doc.json", "-a", "subscriber", "-a", "premium",
            "--json",
        ])
        .output()
        .unwrap();
    assert_success(&output);

    let envelope = DocumentEnvelope::from_json(&t.read("doc.json")).unwrap();
    assert_eq!(envelope.access_requirements(), ["subscriber", "premium"]);
    assert_eq!(
        EnvelopeOpener::new()
            .open(&envelope, "local", keys.local.private())
            .unwrap(),
        PAGE_CONTENT.as_bytes()
    );
}

#[test]
fn test_encrypt_config_paths_relative_to_config_file() {
    let t = Test::new();
    let local = DocumentKeyPair::generate();
    let google = DocumentKeyPair::generate();
    t.write("proj/pub.json", &String::from_utf8(local.public().to_json().unwrap()).unwrap());
    t.write("proj/g.json", &String::from_utf8(google.public().to_json().unwrap()).unwrap());
    t.write(
        "proj/docseal.toml",
        "[recipients]\nlocal = \"pub.json\"\n\"google.com\" = \"g.json\"\n",
    );
    t.write("proj/page.html", PAGE);

    t.cmd()
        .args([
            "--config",
            "proj/docseal.toml",
            "encrypt",
            "-i",
            "proj/page.html",
            "-o",
            "sealed.html",
            "-a",
            "subscriber",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 recipient(s)"));

    let envelope = carrier::extract(&t.read("sealed.html")).unwrap();
    assert_eq!(
        EnvelopeOpener::new()
            .open(&envelope, "local", local.private())
            .unwrap(),
        PAGE_CONTENT.as_bytes()
    );
}

#[test]
fn test_encrypt_requires_local_recipient() {
    let t = Test::new();
    publish(&t);
    t.write("page.html", PAGE);

    let output = t
        .cmd()
        .args([
            "encrypt", "-i", "page.html", "-o", "out.html", "-a", "subscriber", "-r",
            "google.com,google.json",
        ])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "'local'");
    assert!(!t.path("out.html").exists());
}

#[test]
fn test_encrypt_requires_access_requirement() {
    let t = Test::new();
    publish(&t);
    t.write("page.html", PAGE);

    let output = t
        .cmd()
        .args(["encrypt", "-i", "page.html", "-o", "out.html", "-r", "local,local.json"])
        .output()
        .unwrap();
    assert_failure(&output);
}

#[test]
fn test_encrypt_unreachable_key() {
    let t = Test::new();
    publish(&t);
    t.write("page.html", PAGE);

    let output = t
        .cmd()
        .args([
            "encrypt", "-i", "page.html", "-o", "out.html", "-a", "subscriber", "-r",
            "local,missing.json", "-r", "google.com,google.json",
        ])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "public key retrieval failed for 'local'");
    assert!(!t.path("out.html").exists());
}

#[test]
fn test_encrypt_page_without_section() {
    let t = Test::new();
    publish(&t);
    t.write("page.html", "<html><head></head><body>free</body></html>");

    let output = t
        .cmd()
        .args([
            "encrypt", "-i", "page.html", "-o", "out.html", "-a", "subscriber", "-r",
            "local,local.json", "-r", "google.com,google.json",
        ])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "no content section");
}
