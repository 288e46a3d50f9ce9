//! Shared test utilities for the s3prune library crate.
//!
//! This module provides canonical helper functions used across multiple
//! test modules, eliminating duplication and ensuring consistency.

use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::types::{Artifact, StoragePath};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit tests.
///
/// Key defaults: `batch_size=1000`, `max_keys=1000`, all retention
/// periods zero, no group patterns, no client or tracing config.
pub(crate) fn make_test_config(bucket: &str, prefix: &str) -> Config {
    Config {
        target: StoragePath::S3 {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        },
        ..Config::default()
    }
}

/// Create an [`Artifact`] dated at the given epoch seconds.
pub(crate) fn make_artifact(name: &str, epoch_secs: i64) -> Artifact {
    Artifact::new(
        name,
        chrono::DateTime::from_timestamp(epoch_secs, 0).unwrap(),
    )
}

/// Create an [`Artifact`] dated at UTC midnight of the given day.
pub(crate) fn make_dated_artifact(name: &str, year: i32, month: u32, day: u32) -> Artifact {
    Artifact::new(name, Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
}
