//! Generational (grandfather-father-son) rotation evaluator.
//!
//! Given one group of artifacts, a reference "now" and the period
//! counts, selects the minimal deletion set that keeps one artifact per
//! day/week/month/year bucket inside each tier's window.

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Days, Months, NaiveTime, Utc};

use crate::config::RetentionRules;
use crate::types::Artifact;
use crate::types::error::PruneError;

/// Select the artifacts of one group that are safe to delete.
///
/// The scan runs in ascending date order, which is load-bearing: within
/// a bucket the earliest artifact claims the slot, so the oldest
/// representative of each period is the one kept. A single set of
/// claimed bucket keys is shared across all four tiers for the whole
/// group; the keys are namespaced per tier so tiers cannot collide.
///
/// Each tier is checked unconditionally even after an earlier tier has
/// already cleared the artifact. The artifact then claims every
/// applicable, unclaimed tier bucket, and downstream artifacts'
/// retention depends on those claims.
pub fn select_for_deletion(
    group: &[Artifact],
    reference: DateTime<Utc>,
    rules: &RetentionRules,
) -> Result<Vec<Artifact>> {
    // Artifacts newer than the cutoff are too recent to evaluate and are
    // unconditionally retained.
    let cutoff = sub_days(start_of_day(reference), rules.skip_recent_days)?;

    // A period of 0 makes the window empty (start == cutoff), disabling
    // that tier.
    let daily_start = sub_days(cutoff, rules.daily_period)?;
    let weekly_start = sub_days(cutoff, checked_mul(rules.weekly_period, 7)?)?;
    let monthly_start = sub_months(cutoff, rules.monthly_period)?;
    let yearly_start = sub_months(cutoff, checked_mul(rules.yearly_period, 12)?)?;

    let mut sorted = group.to_vec();
    // Stable: equal dates keep their original relative order.
    sorted.sort_by_key(|artifact| artifact.date);

    // Fresh per invocation, never shared across groups or runs.
    let mut claimed: HashSet<String> = HashSet::new();
    let mut to_delete_list = Vec::new();

    for artifact in sorted {
        if artifact.date > cutoff {
            continue;
        }

        let date = artifact.date;
        let mut to_delete = true;

        if date > yearly_start && claimed.insert(format!("yearly-{}", date.year())) {
            to_delete = false;
        }

        if date > monthly_start
            && claimed.insert(format!("monthly-{}-{}", date.year(), date.month()))
        {
            to_delete = false;
        }

        if date > weekly_start {
            let iso_week = date.iso_week();
            if claimed.insert(format!("weekly-{}-{}", iso_week.year(), iso_week.week())) {
                to_delete = false;
            }
        }

        if date > daily_start && claimed.insert(format!("daily-{}-{}", date.year(), date.ordinal()))
        {
            to_delete = false;
        }

        if to_delete {
            to_delete_list.push(artifact);
        }
    }

    Ok(to_delete_list)
}

fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    date.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn sub_days(date: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    date.checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| anyhow!(PruneError::InvalidRules(format!("{days} days before {date} is out of range"))))
}

fn sub_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| {
            anyhow!(PruneError::InvalidRules(format!("{months} months before {date} is out of range")))
        })
}

fn checked_mul(value: u32, factor: u32) -> Result<u32> {
    value.checked_mul(factor).ok_or_else(|| {
        anyhow!(PruneError::InvalidRules(format!("period count {value} is too large")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_dummy_tracing_subscriber, make_dated_artifact};
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap()
    }

    fn dates_of(artifacts: &[Artifact]) -> Vec<String> {
        artifacts
            .iter()
            .map(|a| a.date.format("%Y-%m-%d").to_string())
            .collect()
    }

    #[test]
    fn keeps_one_per_year_in_the_range() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2023, 1, 1),
            make_dated_artifact("a", 2023, 1, 1),
            make_dated_artifact("a", 2022, 1, 1),
            make_dated_artifact("a", 2021, 1, 1),
            make_dated_artifact("a", 2020, 1, 1),
        ];
        let rules = RetentionRules {
            yearly_period: 2,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(
            dates_of(&to_delete),
            vec!["2020-01-01", "2021-01-01", "2022-01-01", "2023-01-01", "2024-01-01"]
        );
    }

    #[test]
    fn keeps_one_per_month_in_the_range() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2023, 12, 1),
            make_dated_artifact("a", 2023, 11, 1),
            make_dated_artifact("a", 2023, 10, 1),
        ];
        let rules = RetentionRules {
            monthly_period: 2,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(
            dates_of(&to_delete),
            vec!["2023-10-01", "2023-11-01", "2024-01-01"]
        );
    }

    #[test]
    fn keeps_one_per_week_in_the_range() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2024, 1, 11),
            make_dated_artifact("a", 2024, 1, 4),
            make_dated_artifact("a", 2024, 1, 3),
            make_dated_artifact("a", 2023, 12, 10),
        ];
        let rules = RetentionRules {
            weekly_period: 2,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(
            dates_of(&to_delete),
            vec!["2023-12-10", "2024-01-04", "2024-01-12"]
        );
    }

    #[test]
    fn keeps_one_per_day_in_the_range() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2024, 1, 11),
            make_dated_artifact("a", 2024, 1, 11),
            make_dated_artifact("a", 2024, 1, 11),
            make_dated_artifact("a", 2024, 1, 9),
            make_dated_artifact("a", 2024, 1, 8),
            make_dated_artifact("a", 2024, 1, 2),
        ];
        let rules = RetentionRules {
            daily_period: 7,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(
            dates_of(&to_delete),
            vec!["2024-01-02", "2024-01-11", "2024-01-11", "2024-01-12"]
        );
    }

    #[test]
    fn skips_recent_days() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2024, 1, 9),
        ];
        let rules = RetentionRules {
            skip_recent_days: 2,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(dates_of(&to_delete), vec!["2024-01-09"]);
    }

    #[test]
    fn all_zero_rules_delete_everything_at_or_before_cutoff() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2023, 6, 1),
            make_dated_artifact("a", 2020, 1, 1),
        ];
        let rules = RetentionRules::default();

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();

        assert_eq!(to_delete.len(), 3);
    }

    #[test]
    fn empty_group_produces_empty_deletion_set() {
        init_dummy_tracing_subscriber();

        let to_delete =
            select_for_deletion(&[], reference(), &RetentionRules::default()).unwrap();
        assert!(to_delete.is_empty());
    }

    #[test]
    fn no_recent_artifact_is_ever_deleted() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 13),
            make_dated_artifact("a", 2024, 1, 12),
            make_dated_artifact("a", 2024, 1, 11),
        ];
        let rules = RetentionRules {
            skip_recent_days: 3,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();
        assert!(to_delete.is_empty());
    }

    #[test]
    fn increasing_a_period_never_grows_the_deletion_set() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2023, 7, 1),
            make_dated_artifact("a", 2023, 1, 1),
            make_dated_artifact("a", 2022, 1, 1),
            make_dated_artifact("a", 2021, 1, 1),
        ];

        let mut previous_len = usize::MAX;
        for yearly_period in 0..=5 {
            let rules = RetentionRules {
                yearly_period,
                ..RetentionRules::default()
            };
            let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();
            assert!(to_delete.len() <= previous_len);
            previous_len = to_delete.len();
        }
    }

    #[test]
    fn evaluation_is_idempotent() {
        init_dummy_tracing_subscriber();

        let group = vec![
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2023, 1, 1),
            make_dated_artifact("a", 2022, 1, 1),
        ];
        let rules = RetentionRules {
            yearly_period: 2,
            monthly_period: 1,
            ..RetentionRules::default()
        };

        let first = select_for_deletion(&group, reference(), &rules).unwrap();
        let second = select_for_deletion(&group, reference(), &rules).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn artifact_can_claim_multiple_tier_buckets() {
        init_dummy_tracing_subscriber();

        // The first artifact claims both the yearly and the monthly
        // bucket, so the second artifact in the same month has no bucket
        // left and is deleted.
        let group = vec![
            make_dated_artifact("a", 2024, 1, 1),
            make_dated_artifact("a", 2024, 1, 2),
        ];
        let rules = RetentionRules {
            yearly_period: 1,
            monthly_period: 1,
            ..RetentionRules::default()
        };

        let to_delete = select_for_deletion(&group, reference(), &rules).unwrap();
        assert_eq!(dates_of(&to_delete), vec!["2024-01-02"]);
    }

    #[test]
    fn oversized_period_is_rejected() {
        init_dummy_tracing_subscriber();

        let group = vec![make_dated_artifact("a", 2024, 1, 1)];
        let rules = RetentionRules {
            yearly_period: u32::MAX,
            ..RetentionRules::default()
        };

        let err = select_for_deletion(&group, reference(), &rules).unwrap_err();
        assert!(matches!(
            err.downcast::<PruneError>().unwrap(),
            PruneError::InvalidRules(_)
        ));
    }
}
