//! Test assertion helpers.

use std::process::Output;

use docseal::error::{Error, PolicyError};
use predicates::prelude::*;

/// Assert that a command output was successful.
pub fn assert_success(output: &Output) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("Command failed:\n{}", stderr);
    }
}

/// Assert that a command output failed.
pub fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "Expected command to fail but it succeeded"
    );
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Assert stderr contains a string.
pub fn assert_stderr_contains(output: &Output, expected: &str) {
    let err = stderr(output);
    assert!(
        predicate::str::contains(expected).eval(err.as_str()),
        "stderr missing '{}', got: {}",
        expected,
        err
    );
}

/// Assert the result failed authentication.
pub fn assert_integrity_failure<T: std::fmt::Debug>(result: docseal::Result<T>) {
    match result {
        Err(e) if e.is_integrity_failure() => {}
        other => panic!("expected integrity failure, got {:?}", other),
    }
}

/// Assert the result was refused because the requester is not a recipient.
pub fn assert_not_authorized<T: std::fmt::Debug>(result: docseal::Result<T>) {
    match result {
        Err(Error::Policy(PolicyError::RecipientNotAuthorized(_))) => {}
        other => panic!("expected RecipientNotAuthorized, got {:?}", other),
    }
}

/// Assert that no age secret key leaked into `text`.
pub fn assert_no_secret_key(text: &str) {
    assert!(
        !text.contains("AGE-SECRET-KEY"),
        "secret key material found in output: {}",
        text
    );
}
