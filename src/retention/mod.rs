//! The retention decision core.
//!
//! A pure, synchronous pipeline over an in-memory artifact list:
//! date resolution → pattern grouping → per-group generational rotation.
//! Retention decisions are global over a group (bucket claiming requires
//! seeing all group members), so the core takes a fully materialized
//! list rather than a stream. Everything with side effects (listing,
//! prompting, deleting) lives outside this module.

use anyhow::Result;
use fancy_regex::Regex;
use tracing::debug;

use crate::config::RetentionRules;
use crate::types::{Artifact, DateSource};

pub mod date_resolver;
pub mod evaluator;
pub mod grouper;

pub use date_resolver::resolve_date;
pub use evaluator::select_for_deletion;
pub use grouper::{compile_group_pattern, group_artifacts};

/// Compute the aggregated deletion set for one run.
///
/// Optionally re-resolves each artifact's date from its name, partitions
/// the artifacts into pattern groups, evaluates each group independently
/// with the shared reference date and rules, and concatenates the
/// per-group deletion sets. Side-effect free; the caller decides what to
/// do with the result (confirmation, dry-run, deletion).
///
/// Any resolver or grouping error aborts the whole run: recovering
/// silently would change which artifacts are kept or deleted.
pub fn build_plan(
    artifacts: &[Artifact],
    patterns: &[Regex],
    rules: &RetentionRules,
    reference: chrono::DateTime<chrono::Utc>,
    date_source: DateSource,
) -> Result<Vec<Artifact>> {
    let artifacts = match date_source {
        DateSource::FromMetadata => artifacts.to_vec(),
        DateSource::FromName => artifacts
            .iter()
            .map(|artifact| {
                Ok(Artifact {
                    name: artifact.name.clone(),
                    date: resolve_date(&artifact.name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let groups = group_artifacts(&artifacts, patterns)?;

    let mut plan = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let group_plan = select_for_deletion(group, reference, rules)?;
        debug!(
            group = i,
            artifacts = group.len(),
            candidates = group_plan.len(),
            "group evaluated."
        );
        plan.extend(group_plan);
    }

    Ok(plan)
}
