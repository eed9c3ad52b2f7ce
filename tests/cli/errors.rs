//! Tests for error handling and CLI flags.

use crate::support::*;

#[test]
fn test_help() {
    let t = Test::new();

    let output = t.cmd().arg("--help").output().unwrap();
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("keygen"));
    assert!(out.contains("encrypt"));
    assert!(out.contains("decrypt"));
}

#[test]
fn test_version_flag() {
    let t = Test::new();

    let output = t.cmd().arg("--version").output().unwrap();
    assert_success(&output);
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();

    let output = t.cmd().arg("unknown-command").output().unwrap();
    assert_failure(&output);
}

#[test]
fn test_keygen_without_kms_key() {
    let t = Test::new();

    let output = t.cmd().arg("keygen").output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "kms.key");
    assert_stderr_contains(&output, "--kms");
    assert!(!t.path("private_keyset.b64").exists());
}

#[test]
fn test_invalid_kms_reference() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["keygen", "--kms", "vault://nope"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid KMS key reference");
}

#[test]
fn test_invalid_config_file() {
    let t = Test::new();
    t.write("docseal.toml", "[kms]\nkey = \"not-a-key\"\n");

    let output = t.cmd().args(["inspect", "missing.html"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "kms.key");
}

#[test]
fn test_config_from_env() {
    let t = Test::new();
    t.write("conf/custom.toml", "[kms\n");

    let output = t
        .cmd()
        .env("DOCSEAL_CONFIG", t.path("conf/custom.toml"))
        .args(["inspect", "missing.html"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse config");
}

#[test]
fn test_decrypt_invalid_envelope_json() {
    let t = Test::new();
    t.write("doc.json", "{}");

    let output = t
        .cmd()
        .args(["decrypt", "--input", "doc.json", "--kms", "test-kms://x"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid envelope");
}

#[cfg(not(feature = "test-kms"))]
#[test]
fn test_stub_kms_needs_feature() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["keygen", "--kms", "test-kms://ci"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "--features test-kms");
}
