//! Pattern-based artifact grouping.
//!
//! Operators describe each backup series with one regular expression.
//! The patterns act as an allow-list: an artifact matching no pattern is
//! excluded from retention entirely and is never deleted.

use anyhow::{Result, anyhow};
use fancy_regex::Regex;
use tracing::debug;

use crate::types::Artifact;
use crate::types::error::PruneError;

/// Partition artifacts into one group per pattern, preserving pattern order.
///
/// Every pattern is tested for every artifact; the loop never
/// short-circuits on the first match so that overlap is always detected.
/// An artifact matched by more than one pattern aborts with
/// [`PruneError::OverlappingGroupPatterns`], because ambiguous grouping
/// risks double-deletion or missed retention.
pub fn group_artifacts(artifacts: &[Artifact], patterns: &[Regex]) -> Result<Vec<Vec<Artifact>>> {
    let mut groups: Vec<Vec<Artifact>> = vec![Vec::new(); patterns.len()];

    for artifact in artifacts {
        let mut found = 0;

        for (i, pattern) in patterns.iter().enumerate() {
            if pattern.is_match(&artifact.name)? {
                groups[i].push(artifact.clone());
                found += 1;
            }
        }

        if found > 1 {
            return Err(anyhow!(PruneError::OverlappingGroupPatterns {
                name: artifact.name.clone(),
                count: found,
            }));
        }

        if found == 0 {
            debug!(name = artifact.name, "artifact matches no group pattern, excluded.");
        }
    }

    Ok(groups)
}

/// Compile a group pattern with the case-insensitive policy applied.
///
/// Case-insensitive because in large buckets common naming patterns are
/// not always exact.
pub fn compile_group_pattern(pattern: &str) -> Result<Regex> {
    fancy_regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| anyhow!(PruneError::InvalidRegex(format!("{pattern}: {e}"))))
}
