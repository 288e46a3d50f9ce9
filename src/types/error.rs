use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3prune-rs.
///
/// Every core error is a deterministic function of its input: nothing is
/// retried or silently defaulted, because a silent recovery would change
/// which backups are kept or deleted.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled)
/// - 1: General errors (AwsSdk, Pipeline)
/// - 2: Configuration and retention-input errors
/// - 3: Partial failure (some objects deleted, some failed)
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PruneError {
    /// The artifact name contains no epoch-seconds timestamp token.
    ///
    /// Fatal for the whole run: a skipped artifact would never be
    /// considered for retention again.
    #[error(
        "artifact name contains no timestamp token, adjust the group pattern if needed (artifact: \"{name}\")"
    )]
    MissingTimestamp { name: String },

    /// The artifact name contains more than one timestamp token.
    #[error("artifact name contains {count} timestamp tokens (artifact: \"{name}\")")]
    AmbiguousTimestamp { name: String, count: usize },

    /// An artifact matched more than one group pattern.
    ///
    /// Ambiguous grouping risks deleting an artifact a human believed
    /// was protected by another group's retention, so this is fatal and
    /// surfaced before any deletion occurs.
    #[error(
        "artifact matches {count} group patterns, patterns must not overlap because the artifact is at risk for deletion (artifact: \"{name}\")"
    )]
    OverlappingGroupPatterns { name: String, count: usize },

    /// Retention rule constraint violation.
    #[error("Invalid retention rules: {0}")]
    InvalidRules(String),

    /// Configuration error (non-retryable).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid S3 URI format.
    #[error("Invalid S3 URI: {0}")]
    InvalidUri(String),

    /// Invalid regex pattern.
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// AWS SDK error (may be retryable based on error type).
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    /// Operation cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Partial failure during deletion.
    #[error("Partial failure: {deleted} deleted, {failed} failed")]
    PartialFailure { deleted: u64, failed: u64 },

    /// General pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl PruneError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PruneError::Cancelled => 0,
            PruneError::MissingTimestamp { .. }
            | PruneError::AmbiguousTimestamp { .. }
            | PruneError::OverlappingGroupPatterns { .. }
            | PruneError::InvalidRules(_)
            | PruneError::InvalidConfig(_)
            | PruneError::InvalidUri(_)
            | PruneError::InvalidRegex(_) => 2,
            PruneError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only AWS SDK errors are considered retryable, and the actual
    /// retry decision is delegated to the SDK's retry policy. Retention
    /// decisions are pure functions of input and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PruneError::AwsSdk(_))
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<PruneError>() {
        return *err == PruneError::Cancelled;
    }
    false
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<PruneError>() {
        return err.exit_code();
    }
    1
}
