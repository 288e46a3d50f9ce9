/*!
# Overview
s3prune-rs applies a generational (grandfather-father-son) retention
policy to dated backup artifacts stored in Amazon S3 and deletes the
artifacts no retention tier claims.

## Features
- **Generational retention**: daily, weekly, monthly and yearly tiers,
  each keeping the oldest artifact per period inside its window
- **Pattern grouping**: one regex per backup series, evaluated
  independently; artifacts matching no pattern are never deleted
- **Safety First**: dry-run mode, plan display, confirmation prompts,
  force flag, skip-recent-days guard
- **Batch deletion**: S3 DeleteObjects API (up to 1000 keys per request)
- **Library-First**: all CLI features available as a Rust library

## As a Library
s3prune-rs can be used as a Rust library.
The s3prune CLI is a thin wrapper over the s3prune-rs library.

Example usage
=============

```toml
[dependencies]
s3prune-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3prune_rs::config::Config;
use s3prune_rs::config::args::parse_from_args;
use s3prune_rs::{RetentionPipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec![
        "s3prune",
        "s3://my-bucket/backups/",
        "--group-pattern",
        r"backups/db/pg-dump-\d+\.dmp",
        "--daily-period",
        "7",
        "--monthly-period",
        "12",
        "--dry-run",
    ];

    let parsed_args = parse_from_args(args).unwrap();
    let config = Config::try_from(parsed_args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = RetentionPipeline::new(config, cancellation_token).await;
    pipeline.close_stats_sender();
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
}
```
*/

pub mod config;
pub mod pipeline;
pub mod retention;
pub mod safety;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::CLIArgs;
pub use pipeline::RetentionPipeline;
pub use types::error::{exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
