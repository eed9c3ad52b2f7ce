//! Test support utilities for docseal integration tests.
//!
//! Provides an isolated working directory, an in-memory KMS, a static key
//! fetcher and output assertions.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test environment with an isolated temp directory.
///
/// Child processes use `.current_dir()` so tests can run in parallel.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// A `docseal` command rooted in the test directory with the
    /// environment overrides cleared.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("docseal").expect("failed to find docseal binary");
        cmd.current_dir(self.dir.path());
        cmd.env_remove("DOCSEAL_CONFIG");
        cmd.env_remove("DOCSEAL_KMS_KEY");
        cmd.env_remove("DOCSEAL_LOG");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Absolute path of `name` inside the test directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("failed to write test file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("failed to read test file")
    }
}
