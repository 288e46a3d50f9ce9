pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types_convert::date_time::DateTimeExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{ClientConfig, Config};
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::error::PruneError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{Artifact, DeletionOutcome, DeletionStatistics, FailedArtifact, StoragePath};

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "InternalError") and the human-readable error
/// message from the response. For other error types (network, timeout,
/// construction failure), returns "N/A" as the code and the full error
/// description as the message.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// Factory for creating S3 storage instances.
pub struct S3StorageFactory;

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        config: Config,
        path: StoragePath,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<DeletionStatistics>,
        client_config: Option<ClientConfig>,
        has_warning: Arc<AtomicBool>,
    ) -> Storage {
        let StoragePath::S3 { bucket, prefix } = path;

        let client = if let Some(ref client_config) = client_config {
            Arc::new(client_config.create_client().await)
        } else {
            Arc::new(client_builder::create_default_client().await)
        };

        Box::new(S3Storage {
            config,
            bucket,
            prefix,
            cancellation_token,
            client,
            stats_sender,
            has_warning,
        })
    }
}

/// S3 storage implementation for the retention pipeline.
#[derive(Clone)]
struct S3Storage {
    #[allow(dead_code)]
    config: Config,
    bucket: String,
    prefix: String,
    cancellation_token: PipelineCancellationToken,
    client: Arc<Client>,
    stats_sender: Sender<DeletionStatistics>,
    has_warning: Arc<AtomicBool>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_artifacts(&self, max_keys: i32) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            // A partial listing must never feed retention decisions, so
            // cancellation aborts the run instead of returning what was
            // listed so far.
            if self.cancellation_token.is_cancelled() {
                tracing::info!("listing cancelled.");
                return Err(anyhow!(PruneError::Cancelled));
            }

            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation_token.clone())
                .max_keys(max_keys)
                .send()
                .await
                .map_err(|e| {
                    let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                    tracing::error!(
                        bucket = self.bucket,
                        prefix = self.prefix,
                        s3_error_code = s3_error_code,
                        s3_error_message = s3_error_message,
                        "S3 ListObjectsV2 API call failed for s3://{}/{}: {} ({}).",
                        self.bucket,
                        self.prefix,
                        s3_error_code,
                        s3_error_message,
                    );
                    anyhow::anyhow!(e).context("aws_sdk_s3::client::list_objects_v2() failed.")
                })?;

            for object in output.contents() {
                let Some(key) = object.key() else {
                    tracing::warn!(bucket = self.bucket, "listed object without a key, skipped.");
                    self.set_warning();
                    continue;
                };

                let Some(last_modified) = object.last_modified() else {
                    tracing::warn!(
                        bucket = self.bucket,
                        key = key,
                        "listed object without a last-modified date, skipped."
                    );
                    self.set_warning();
                    continue;
                };

                let date = last_modified
                    .to_chrono_utc()
                    .context("last-modified date conversion failed.")?;

                artifacts.push(Artifact::new(key, date));
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        Ok(artifacts)
    }

    async fn delete_artifacts(&self, names: Vec<String>) -> Result<DeletionOutcome> {
        let object_count = names.len();
        let objects = names
            .into_iter()
            .map(|name| {
                ObjectIdentifier::builder()
                    .key(name)
                    .build()
                    .context("Failed to build ObjectIdentifier")
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .context("Failed to build Delete request")?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = self.bucket,
                    prefix = self.prefix,
                    object_count = object_count,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteObjects API call failed for {} objects in s3://{}/{}: {} ({}).",
                    object_count,
                    self.bucket,
                    self.prefix,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow::anyhow!(e).context("aws_sdk_s3::client::delete_objects() failed.")
            })?;

        let deleted = output
            .deleted()
            .iter()
            .filter_map(|deleted| deleted.key().map(String::from))
            .collect();

        let failed = output
            .errors()
            .iter()
            .map(|error| FailedArtifact {
                name: error.key().unwrap_or_default().to_string(),
                code: error.code().unwrap_or("unknown").to_string(),
                message: error.message().unwrap_or("no message").to_string(),
            })
            .collect();

        Ok(DeletionOutcome { deleted, failed })
    }

    fn get_client(&self) -> Option<Arc<Client>> {
        Some(self.client.clone())
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
