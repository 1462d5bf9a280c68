//! Shared helpers for pubwatch-common integration tests.

#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub use pubwatch_common::testing::init_test_logging;

#[macro_export]
macro_rules! test_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "test", $($arg)*);
    };
}

/// Requirements document used across the integration tests: one snap in
/// two channels for two architectures, one package for two releases on
/// one architecture.
pub const RELEASE_REQUIREMENTS: &str = r#"
required-snaps:
  - name: checkbox22
    channels: [latest/edge, latest/beta]
    architectures: [amd64, arm64]
required-packages:
  - channel: edge
    source: checkbox-ng
    package: python3-checkbox-ng
    versions: ["22.04", "24.04"]
    architectures: [amd64]
"#;

/// Write `content` to a temporary `.yaml` file that lives as long as the
/// returned handle.
pub fn write_requirements(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp requirements file");
    file.write_all(content.as_bytes())
        .expect("write temp requirements file");
    file
}
