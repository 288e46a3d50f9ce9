use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use dyn_clone::DynClone;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::config::{ClientConfig, Config};
use crate::types::token::PipelineCancellationToken;
use crate::types::{Artifact, DeletionOutcome, DeletionStatistics, StoragePath};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Factory trait for creating Storage instances.
#[async_trait]
pub trait StorageFactory {
    async fn create(
        config: Config,
        path: StoragePath,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<DeletionStatistics>,
        client_config: Option<ClientConfig>,
        has_warning: Arc<AtomicBool>,
    ) -> Storage;
}

/// Core storage trait for the operations the retention pipeline needs.
///
/// Two data-plane operations: listing the artifacts under the target
/// prefix and batch-deleting a set of them. The retention core decides
/// which artifacts to delete; storage never makes retention decisions.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// List all artifacts under the target prefix.
    ///
    /// Returns the fully materialized list: retention decisions are
    /// global over a group, so the pipeline needs every artifact before
    /// it can evaluate any of them. Entries without a key or a
    /// last-modified date are skipped with a warning.
    ///
    /// Listing failures are treated as unrecoverable errors.
    async fn list_artifacts(&self, max_keys: i32) -> Result<Vec<Artifact>>;

    /// Delete a batch of artifacts via the DeleteObjects API.
    ///
    /// Takes full S3 keys (already including any prefix). Supports up to
    /// 1000 keys per request; the caller is responsible for batching.
    ///
    /// Returns a [`DeletionOutcome`] containing both successfully
    /// deleted keys and per-key failures (partial failure).
    async fn delete_artifacts(&self, names: Vec<String>) -> Result<DeletionOutcome>;

    /// Get the underlying AWS S3 Client for direct API access.
    fn get_client(&self) -> Option<Arc<Client>>;

    /// Get the statistics sender channel.
    fn get_stats_sender(&self) -> Sender<DeletionStatistics>;

    /// Send a statistics event through the channel.
    async fn send_stats(&self, stats: DeletionStatistics);

    /// Set the warning flag to indicate a warning occurred.
    fn set_warning(&self);
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the S3 storage instance for the retention pipeline.
pub async fn create_storage(
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<DeletionStatistics>,
    has_warning: Arc<AtomicBool>,
) -> Storage {
    let client_config = config.target_client_config.clone();
    let target = config.target.clone();

    s3::S3StorageFactory::create(
        config,
        target,
        cancellation_token,
        stats_sender,
        client_config,
        has_warning,
    )
    .await
}
