// Run summary reporter.
//
// Reads DeletionStatistics from the pipeline's stats channel and emits a
// single summary line once the channel closes.

use async_channel::Receiver;
use s3prune_rs::types::DeletionStatistics;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Totals returned by [`show_summary`] after the stats channel closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub planned_count: u64,
    pub deleted_count: u64,
    pub error_count: u64,
    pub dry_run_count: u64,
}

/// Spawn a background task that drains the stats channel and logs a
/// final summary.
///
/// The task runs until `stats_receiver` is closed (all senders dropped).
/// Returns a `JoinHandle` that should be awaited after the pipeline
/// finishes.
pub fn show_summary(
    stats_receiver: Receiver<DeletionStatistics>,
    dry_run: bool,
) -> JoinHandle<RunSummary> {
    tokio::spawn(async move {
        let start_time = Instant::now();
        let mut summary = RunSummary::default();

        while let Ok(stats) = stats_receiver.recv().await {
            match stats {
                DeletionStatistics::PlanReady { candidates } => {
                    summary.planned_count = candidates;
                }
                DeletionStatistics::DeleteComplete { .. } => {
                    summary.deleted_count += 1;
                }
                DeletionStatistics::DeleteError { .. } => {
                    summary.error_count += 1;
                }
                DeletionStatistics::DryRunComplete { .. } => {
                    summary.dry_run_count += 1;
                }
            }
        }

        info!(
            message = "retention summary",
            dry_run = dry_run,
            planned = summary.planned_count,
            deleted = summary.deleted_count,
            would_delete = summary.dry_run_count,
            error = summary.error_count,
            duration_sec = start_time.elapsed().as_secs_f64(),
        );

        summary
    })
}
