//! Key lifecycle through the CLI: keygen, encrypt, decrypt, rotate.
//!
//! Uses the in-process stub KMS, so requires `--features test-kms`.

#![cfg(feature = "test-kms")]

use crate::support::*;

use docseal::core::keys::{DocumentKeyPair, PublicKeyset};

const KMS: &str = "test-kms://cli";

/// Project with a generated key pair and a published fallback key.
fn project() -> Test {
    let t = Test::new();
    t.write(
        "docseal.toml",
        &format!(
            "[kms]\nkey = \"{}\"\n\n[keys]\nprivate = \"keys/private.b64\"\npublic = \"keys/public.json\"\n\n[recipients]\nlocal = \"keys/public.json\"\n\"google.com\" = \"google.json\"\n",
            KMS
        ),
    );
    std::fs::create_dir_all(t.path("keys")).unwrap();
    let google = DocumentKeyPair::generate();
    std::fs::write(t.path("google.json"), google.public().to_json().unwrap()).unwrap();

    let output = t.cmd().arg("keygen").output().unwrap();
    assert_success(&output);
    t.write("page.html", PAGE);
    t
}

fn encrypt(t: &Test, output: &str) {
    let out = t
        .cmd()
        .args(["encrypt", "-i", "page.html", "-o", output, "-a", "subscriber"])
        .output()
        .unwrap();
    assert_success(&out);
}

#[test]
fn test_keygen_writes_both_halves() {
    let t = project();

    let public = PublicKeyset::from_json(t.read("keys/public.json").as_bytes()).unwrap();
    assert_eq!(public.keys().len(), 1);

    let private = t.read("keys/private.b64");
    assert_no_secret_key(&private);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(t.path("keys/private.b64"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_keygen_refuses_overwrite() {
    let t = project();
    let before = t.read("keys/private.b64");

    let output = t.cmd().arg("keygen").output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");
    assert_eq!(t.read("keys/private.b64"), before);

    let output = t.cmd().args(["keygen", "--force"]).output().unwrap();
    assert_success(&output);
    assert_ne!(t.read("keys/private.b64"), before);
}

#[test]
fn test_encrypt_decrypt_html() {
    let t = project();
    encrypt(&t, "sealed.html");

    let output = t
        .cmd()
        .args(["decrypt", "-i", "sealed.html", "-o", "restored.html"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(t.read("restored.html"), PAGE);
}

#[test]
fn test_decrypt_to_stdout() {
    let t = project();
    encrypt(&t, "sealed.html");

    let output = t
        .cmd()
        .args(["decrypt", "--input", "sealed.html"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), PAGE);
}

#[test]
fn test_decrypt_as_unlisted_domain() {
    let t = project();
    encrypt(&t, "sealed.html");

    // Falls back to the google.com entry, which this key pair cannot open.
    let output = t
        .cmd()
        .args(["decrypt", "-i", "sealed.html", "--domain", "reader.example"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "recipient not authorized");
}

#[test]
fn test_decrypt_with_other_master_key() {
    let t = project();
    encrypt(&t, "sealed.html");

    let output = t
        .cmd()
        .args(["decrypt", "-i", "sealed.html", "--kms", "test-kms://someone-else"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to recover private keyset");
    assert_stderr_contains(&output, "integrity check failed");
}

#[test]
fn test_rotate_keeps_old_documents() {
    let t = project();
    encrypt(&t, "before.html");
    let old_public = t.read("keys/public.json");

    let output = t.cmd().arg("rotate").output().unwrap();
    assert_success(&output);
    assert_ne!(t.read("keys/public.json"), old_public);

    encrypt(&t, "after.html");
    for doc in ["before.html", "after.html"] {
        let output = t.cmd().args(["decrypt", "-i", doc]).output().unwrap();
        assert_success(&output);
        assert_eq!(stdout(&output), PAGE);
    }
}

#[test]
fn test_rotate_prune_drops_old_key() {
    let t = project();
    encrypt(&t, "before.html");

    let output = t.cmd().args(["rotate", "--prune"]).output().unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "removed 1 old key(s)");

    let output = t.cmd().args(["decrypt", "-i", "before.html"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "integrity check failed");
}
