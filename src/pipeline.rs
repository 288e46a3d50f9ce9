//! Retention pipeline orchestrator.
//!
//! The core orchestrator that connects the stages of one run:
//! list → plan → safety gate → delete (or dry-run report).
//!
//! Unlike a streaming deletion tool, the retention plan needs every
//! artifact before it can decide anything (bucket claiming is global
//! over a group), so the pipeline materializes the listing and the plan
//! in memory and then deletes in batches.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::Receiver;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::retention::build_plan;
use crate::safety::SafetyChecker;
use crate::storage::{self, Storage};
use crate::types::error::PruneError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{Artifact, DeletionStatistics};

/// The core retention pipeline orchestrator.
///
/// ## Pipeline stages
///
/// ```text
/// list artifacts → build retention plan → safety gate → delete batches
/// ```
///
/// ## Usage
///
/// ```no_run
/// # async fn example() {
/// # use s3prune_rs::{Config, RetentionPipeline, create_pipeline_cancellation_token};
/// # let config: Config = todo!();
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = RetentionPipeline::new(config, cancellation_token).await;
/// pipeline.close_stats_sender();
/// pipeline.run().await;
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// }
/// # }
/// ```
pub struct RetentionPipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_receiver: Receiver<DeletionStatistics>,
    has_error: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    ready: bool,
}

impl RetentionPipeline {
    /// Create a new RetentionPipeline.
    ///
    /// Initializes the S3 storage, stats channel, and error tracking.
    /// The pipeline is ready to run after creation.
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let has_warning = Arc::new(AtomicBool::new(false));

        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let target = storage::create_storage(
            config.clone(),
            cancellation_token.clone(),
            stats_sender,
            has_warning.clone(),
        )
        .await;

        Self {
            config,
            target,
            cancellation_token,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_warning,
            errors: Arc::new(Mutex::new(VecDeque::new())),
            ready: true,
        }
    }

    /// Run the retention pipeline.
    ///
    /// 1. List the artifacts under the target prefix
    /// 2. Build the retention plan
    /// 3. Safety gate (confirmation prompt, dry-run, force flag)
    /// 4. Delete the planned artifacts in batches (or report them in dry-run)
    pub async fn run(&mut self) {
        assert!(self.ready, "RetentionPipeline::run() called more than once");
        self.ready = false;

        if let Err(e) = self.execute_pipeline().await {
            self.record_error(e);
        }

        if self.config.warn_as_error && self.has_warning.load(Ordering::SeqCst) {
            self.record_error(anyhow!("warnings promoted to errors (--warn-as-error)"));
        }

        self.shutdown();
    }

    /// Check if any error occurred during the pipeline execution.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Check if any warning occurred during the pipeline execution.
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    /// Consume and return all accumulated errors.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        let mut errors = Vec::with_capacity(error_list.len());
        while let Some(e) = error_list.pop_front() {
            errors.push(e);
        }
        Some(errors)
    }

    /// Get error messages without consuming them.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_error_messages(&self) -> Option<Vec<String>> {
        if !self.has_error() {
            return None;
        }
        let error_list = self.errors.lock().unwrap();
        Some(error_list.iter().map(|e| e.to_string()).collect())
    }

    /// Get the stats receiver for progress reporting.
    pub fn get_stats_receiver(&self) -> Receiver<DeletionStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats sender to signal the progress reporter to finish.
    ///
    /// Call this before `run()` if you don't need progress reporting,
    /// to free the stats channel resources.
    pub fn close_stats_sender(&self) {
        self.target.get_stats_sender().close();
    }

    // -----------------------------------------------------------------------
    // Internal methods
    // -----------------------------------------------------------------------

    async fn execute_pipeline(&self) -> Result<()> {
        let artifacts = self.target.list_artifacts(self.config.max_keys).await?;
        debug!(artifacts = artifacts.len(), "listing complete.");

        let reference = self.config.reference_date.unwrap_or_else(Utc::now);
        let plan = build_plan(
            &artifacts,
            &self.config.group_patterns,
            &self.config.rules,
            reference,
            self.config.date_source,
        )?;

        self.target
            .send_stats(DeletionStatistics::PlanReady {
                candidates: plan.len() as u64,
            })
            .await;

        if plan.is_empty() {
            info!("nothing to delete.");
            return Ok(());
        }

        let checker = SafetyChecker::new(&self.config);
        checker.check_before_deletion(&plan)?;

        if self.config.dry_run {
            self.report_dry_run(&plan).await;
            return Ok(());
        }

        self.delete_planned(&plan).await
    }

    async fn report_dry_run(&self, plan: &[Artifact]) {
        for artifact in plan {
            info!(
                name = artifact.name,
                date = artifact.date.to_rfc3339(),
                "[dry-run] artifact would be deleted."
            );
            self.target
                .send_stats(DeletionStatistics::DryRunComplete {
                    key: artifact.name.clone(),
                })
                .await;
        }
    }

    async fn delete_planned(&self, plan: &[Artifact]) -> Result<()> {
        let mut deleted_count: u64 = 0;
        let mut failed_count: u64 = 0;

        for batch in plan.chunks(usize::from(self.config.batch_size)) {
            if self.cancellation_token.is_cancelled() {
                info!("deletion cancelled.");
                return Err(anyhow!(PruneError::Cancelled));
            }

            let names = batch
                .iter()
                .map(|artifact| artifact.name.clone())
                .collect::<Vec<_>>();
            let outcome = self.target.delete_artifacts(names).await?;

            for key in &outcome.deleted {
                debug!(key = key, "artifact deleted.");
                self.target
                    .send_stats(DeletionStatistics::DeleteComplete { key: key.clone() })
                    .await;
            }
            deleted_count += outcome.deleted.len() as u64;

            for failure in &outcome.failed {
                warn!(
                    key = failure.name,
                    s3_error_code = failure.code,
                    s3_error_message = failure.message,
                    "artifact deletion failed."
                );
                self.target.set_warning();
                self.target
                    .send_stats(DeletionStatistics::DeleteError {
                        key: failure.name.clone(),
                    })
                    .await;
            }
            failed_count += outcome.failed.len() as u64;
        }

        if failed_count > 0 {
            return Err(anyhow!(PruneError::PartialFailure {
                deleted: deleted_count,
                failed: failed_count,
            }));
        }

        info!(deleted = deleted_count, "deletion complete.");
        Ok(())
    }

    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::compile_group_pattern;
    use crate::storage::StorageTrait;
    use crate::test_utils::{
        init_dummy_tracing_subscriber, make_dated_artifact, make_test_config,
    };
    use crate::types::token::create_pipeline_cancellation_token;
    use crate::types::{DeletionOutcome, FailedArtifact};
    use async_channel::Sender;
    use async_trait::async_trait;
    use chrono::TimeZone;

    #[derive(Clone)]
    struct MockStorage {
        artifacts: Vec<Artifact>,
        fail_keys: Vec<String>,
        stats_sender: Sender<DeletionStatistics>,
        has_warning: Arc<AtomicBool>,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl StorageTrait for MockStorage {
        async fn list_artifacts(&self, _max_keys: i32) -> Result<Vec<Artifact>> {
            Ok(self.artifacts.clone())
        }

        async fn delete_artifacts(&self, names: Vec<String>) -> Result<DeletionOutcome> {
            let mut outcome = DeletionOutcome::default();
            for name in names {
                if self.fail_keys.contains(&name) {
                    outcome.failed.push(FailedArtifact {
                        name,
                        code: "AccessDenied".to_string(),
                        message: "Access Denied".to_string(),
                    });
                } else {
                    self.deleted.lock().unwrap().push(name.clone());
                    outcome.deleted.push(name);
                }
            }
            Ok(outcome)
        }

        fn get_client(&self) -> Option<Arc<aws_sdk_s3::Client>> {
            None
        }

        fn get_stats_sender(&self) -> Sender<DeletionStatistics> {
            self.stats_sender.clone()
        }

        async fn send_stats(&self, stats: DeletionStatistics) {
            let _ = self.stats_sender.send(stats).await;
        }

        fn set_warning(&self) {
            self.has_warning.store(true, Ordering::SeqCst);
        }
    }

    struct TestPipeline {
        pipeline: RetentionPipeline,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    fn make_pipeline(
        artifacts: Vec<Artifact>,
        fail_keys: Vec<String>,
        configure: impl FnOnce(&mut Config),
    ) -> TestPipeline {
        let mut config = make_test_config("test-bucket", "prefix/");
        config.force = true;
        config.group_patterns = vec![compile_group_pattern(".*").unwrap()];
        config.reference_date = Some(Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap());
        configure(&mut config);

        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let has_warning = Arc::new(AtomicBool::new(false));
        let deleted = Arc::new(Mutex::new(Vec::new()));

        let storage: Storage = Box::new(MockStorage {
            artifacts,
            fail_keys,
            stats_sender,
            has_warning: has_warning.clone(),
            deleted: deleted.clone(),
        });

        TestPipeline {
            pipeline: RetentionPipeline {
                config,
                target: storage,
                cancellation_token: create_pipeline_cancellation_token(),
                stats_receiver,
                has_error: Arc::new(AtomicBool::new(false)),
                has_warning,
                errors: Arc::new(Mutex::new(VecDeque::new())),
                ready: true,
            },
            deleted,
        }
    }

    #[tokio::test]
    async fn deletes_unretained_artifacts() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![
            make_dated_artifact("backups/new.dmp", 2024, 1, 1),
            make_dated_artifact("backups/old.dmp", 2022, 1, 1),
        ];
        let mut test = make_pipeline(artifacts, vec![], |config| {
            config.rules.yearly_period = 1;
        });

        test.pipeline.run().await;

        assert!(!test.pipeline.has_error());
        assert_eq!(
            *test.deleted.lock().unwrap(),
            vec!["backups/old.dmp".to_string()]
        );
    }

    #[tokio::test]
    async fn dry_run_deletes_nothing_and_reports_stats() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![make_dated_artifact("backups/old.dmp", 2022, 1, 1)];
        let mut test = make_pipeline(artifacts, vec![], |config| {
            config.dry_run = true;
        });

        let stats_receiver = test.pipeline.get_stats_receiver();
        test.pipeline.run().await;

        assert!(!test.pipeline.has_error());
        assert!(test.deleted.lock().unwrap().is_empty());

        let mut dry_run_keys = Vec::new();
        while let Ok(stats) = stats_receiver.try_recv() {
            if let DeletionStatistics::DryRunComplete { key } = stats {
                dry_run_keys.push(key);
            }
        }
        assert_eq!(dry_run_keys, vec!["backups/old.dmp".to_string()]);
    }

    #[tokio::test]
    async fn empty_plan_is_not_an_error() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![make_dated_artifact("backups/new.dmp", 2024, 1, 12)];
        let mut test = make_pipeline(artifacts, vec![], |config| {
            config.rules.skip_recent_days = 7;
        });

        test.pipeline.run().await;

        assert!(!test.pipeline.has_error());
        assert!(test.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_failure_sets_error_and_warning() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![
            make_dated_artifact("backups/a.dmp", 2022, 1, 1),
            make_dated_artifact("backups/b.dmp", 2022, 2, 1),
        ];
        let mut test = make_pipeline(artifacts, vec!["backups/b.dmp".to_string()], |_| {});

        test.pipeline.run().await;

        assert!(test.pipeline.has_error());
        assert!(test.pipeline.has_warning());

        let errors = test.pipeline.get_errors_and_consume().unwrap();
        assert!(matches!(
            errors[0].downcast_ref::<PruneError>(),
            Some(PruneError::PartialFailure {
                deleted: 1,
                failed: 1
            })
        ));
    }

    #[tokio::test]
    async fn overlapping_patterns_abort_before_any_deletion() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![make_dated_artifact("backups/a.dmp", 2022, 1, 1)];
        let mut test = make_pipeline(artifacts, vec![], |config| {
            config.group_patterns = vec![
                compile_group_pattern(".*").unwrap(),
                compile_group_pattern("backups/.*").unwrap(),
            ];
        });

        test.pipeline.run().await;

        assert!(test.pipeline.has_error());
        assert!(test.deleted.lock().unwrap().is_empty());

        let messages = test.pipeline.get_error_messages().unwrap();
        assert!(messages[0].contains("patterns must not overlap"));
    }

    #[tokio::test]
    async fn cancellation_before_deletion_reports_cancelled() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![make_dated_artifact("backups/a.dmp", 2022, 1, 1)];
        let mut test = make_pipeline(artifacts, vec![], |_| {});

        test.pipeline.cancellation_token.cancel();
        test.pipeline.run().await;

        assert!(test.pipeline.has_error());
        let errors = test.pipeline.get_errors_and_consume().unwrap();
        assert!(crate::types::error::is_cancelled_error(&errors[0]));
        assert!(test.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn warn_as_error_promotes_warnings() {
        init_dummy_tracing_subscriber();

        let artifacts = vec![
            make_dated_artifact("backups/a.dmp", 2022, 1, 1),
            make_dated_artifact("backups/b.dmp", 2022, 2, 1),
        ];
        let mut test = make_pipeline(artifacts, vec!["backups/b.dmp".to_string()], |config| {
            config.warn_as_error = true;
        });

        test.pipeline.run().await;

        let messages = test.pipeline.get_error_messages().unwrap();
        assert!(messages.iter().any(|m| m.contains("warn-as-error")));
    }

    #[tokio::test]
    async fn batches_respect_batch_size() {
        init_dummy_tracing_subscriber();

        let artifacts = (1..=5)
            .map(|month| make_dated_artifact("backups/a.dmp", 2022, month, 1))
            .collect::<Vec<_>>();
        let mut test = make_pipeline(artifacts, vec![], |config| {
            config.batch_size = 2;
        });

        test.pipeline.run().await;

        assert!(!test.pipeline.has_error());
        assert_eq!(test.deleted.lock().unwrap().len(), 5);
    }
}
