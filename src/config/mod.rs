pub mod args;

use chrono::{DateTime, Utc};
use fancy_regex::Regex;

use crate::types::{ClientConfigLocation, DateSource, S3Credentials, StoragePath};

/// Main configuration for the s3prune-rs retention pipeline.
///
/// Holds all settings needed to configure and run a
/// [`RetentionPipeline`](crate::RetentionPipeline): target bucket/prefix,
/// AWS client settings, group patterns, retention rules, and safety
/// flags (dry-run, force).
///
/// # Quick Start
///
/// Use [`Config::for_target`] for a minimal configuration with sensible
/// defaults, then customize fields as needed:
///
/// ```
/// use s3prune_rs::Config;
/// use s3prune_rs::retention::compile_group_pattern;
///
/// let mut config = Config::for_target("my-bucket", "backups/");
/// config.group_patterns = vec![compile_group_pattern(r"backups/db/.*\.dmp").unwrap()];
/// config.rules.daily_period = 7;
/// config.rules.monthly_period = 12;
/// config.dry_run = true;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub target: StoragePath,
    pub group_patterns: Vec<Regex>,
    pub rules: RetentionRules,
    pub date_source: DateSource,
    pub dry_run: bool,
    pub force: bool,
    pub warn_as_error: bool,
    pub batch_size: u16,
    pub max_keys: i32,
    /// Reference date override for the retention windows. `None` means
    /// "now" at pipeline start. Mainly useful for tests and replays.
    pub reference_date: Option<DateTime<Utc>>,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
}

impl Config {
    /// Create a `Config` with sensible defaults for the given S3 bucket
    /// and prefix.
    ///
    /// The `force` flag is set to `true` to skip interactive
    /// confirmation prompts, which is appropriate for programmatic use.
    /// Group patterns default to empty — set them before running a
    /// pipeline, otherwise every artifact is excluded and nothing is
    /// deleted.
    pub fn for_target(bucket: &str, prefix: &str) -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            },
            force: true,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: String::new(),
                prefix: String::new(),
            },
            group_patterns: Vec::new(),
            rules: RetentionRules::default(),
            date_source: DateSource::FromMetadata,
            dry_run: false,
            force: false,
            warn_as_error: false,
            batch_size: 1000,
            max_keys: 1000,
            reference_date: None,
            target_client_config: None,
            tracing_config: None,
        }
    }
}

/// Generational retention rules.
///
/// Counts are "last N days/weeks/months/years back from the reference
/// date", not calendar-aligned absolute counts. A period of 0 disables
/// that tier. All-zero rules with `skip_recent_days = 0` is the
/// degenerate "delete everything not too recent" policy and is legal.
///
/// Non-negativity is encoded in the types; the one remaining constraint
/// (period counts small enough for calendar arithmetic) is checked by
/// [`validate`](RetentionRules::validate) and again by the evaluator's
/// checked date arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionRules {
    pub daily_period: u32,
    pub weekly_period: u32,
    pub monthly_period: u32,
    pub yearly_period: u32,
    pub skip_recent_days: u32,
}

impl RetentionRules {
    /// Validate that the period counts stay within calendar arithmetic
    /// range.
    pub fn validate(&self) -> Result<(), String> {
        if self.weekly_period.checked_mul(7).is_none() {
            return Err(format!("weekly period {} is too large", self.weekly_period));
        }
        if self.yearly_period.checked_mul(12).is_none() {
            return Err(format!("yearly period {} is too large", self.yearly_period));
        }
        Ok(())
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Timeout configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
