//! Artifact date resolution from embedded name timestamps.
//!
//! Backup tools commonly embed a Unix epoch-seconds timestamp in the
//! object key (e.g. `pg-dump-mytool-1726750074.dmp`). When the operator
//! selects `--date-source name`, the retention plan uses this timestamp
//! instead of the object's last-modified metadata.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use std::sync::LazyLock;

use crate::types::error::PruneError;

/// A run of exactly 10 ASCII digits bounded by a non-digit or the string
/// boundary. The lookarounds reject longer digit runs (millisecond
/// epochs, zero-padded counters) that merely contain 10 digits.
static TIMESTAMP_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<!\d)\d{10}(?!\d)").unwrap());

/// Resolve an artifact's effective date from its name.
///
/// Fails with [`PruneError::MissingTimestamp`] when the name contains no
/// timestamp token and [`PruneError::AmbiguousTimestamp`] when it
/// contains more than one. Both are fatal for the whole run: silently
/// skipping the artifact would leave it outside retention forever.
pub fn resolve_date(name: &str) -> Result<DateTime<Utc>> {
    let mut matches = TIMESTAMP_TOKEN.find_iter(name);

    let first = match matches.next() {
        Some(m) => m?,
        None => {
            return Err(anyhow!(PruneError::MissingTimestamp {
                name: name.to_string(),
            }));
        }
    };

    let extra = matches.count();
    if extra > 0 {
        return Err(anyhow!(PruneError::AmbiguousTimestamp {
            name: name.to_string(),
            count: extra + 1,
        }));
    }

    let epoch_seconds: i64 = first
        .as_str()
        .parse()
        .expect("a 10-digit run always fits in i64");

    DateTime::from_timestamp(epoch_seconds, 0).ok_or_else(|| {
        anyhow!(PruneError::MissingTimestamp {
            name: name.to_string(),
        })
    })
}
