//! Safety features for s3prune-rs deletion operations.
//!
//! Implements safeguards against accidental data loss:
//! - Dry-run mode: Skips confirmation (pipeline runs but deletions are simulated)
//! - Plan display: Shows the full deletion plan before prompting
//! - Confirmation prompts: Requires exact "yes" input for destructive operations
//! - Force flag: Skips confirmation prompts
//! - Non-TTY detection: Skips prompts in non-interactive environments
//! - JSON logging: Skips prompts to avoid corrupting structured output

use crate::config::Config;
use crate::types::Artifact;
use crate::types::error::PruneError;
use anyhow::{Result, anyhow};
use std::io::{BufRead, IsTerminal, Write};

// ---------------------------------------------------------------------------
// PromptHandler trait (for testability)
// ---------------------------------------------------------------------------

/// Trait for handling user prompts, enabling testability.
///
/// The default implementation ([`StdioPromptHandler`]) uses stdin/stdout.
/// Tests can provide custom implementations to avoid blocking on user input.
pub trait PromptHandler: Send + Sync {
    /// Display the confirmation prompt and read a line of user input.
    ///
    /// Returns the trimmed user input string.
    fn read_confirmation(&self) -> Result<String>;

    /// Check if the current environment supports interactive prompts.
    ///
    /// Returns `true` if both stdin and stdout are connected to a TTY.
    fn is_interactive(&self) -> bool;
}

/// Default prompt handler using stdin/stdout.
///
/// Uses `println!`/`print!` for prompts, not tracing, so the prompt is
/// visible regardless of log level.
pub struct StdioPromptHandler;

impl PromptHandler for StdioPromptHandler {
    fn read_confirmation(&self) -> Result<String> {
        print!("Type 'yes' to confirm deletion: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }
}

// ---------------------------------------------------------------------------
// SafetyChecker
// ---------------------------------------------------------------------------

/// Safety checker that validates preconditions before deletion operations.
///
/// Orchestrates the safety checks in a defined order:
/// 1. Dry-run mode check (skip confirmation, deletions are simulated)
/// 2. Force flag check (skip all prompts)
/// 3. Environment check (skip prompts if non-TTY or JSON logging)
/// 4. Plan display and user confirmation prompt (require exact "yes")
///
/// Note: Dry-run mode does NOT abort the pipeline. The pipeline runs
/// fully (listing, planning) but deletions are simulated and only
/// statistics are emitted.
pub struct SafetyChecker {
    dry_run: bool,
    force: bool,
    json_logging: bool,
    prompt_handler: Box<dyn PromptHandler>,
}

impl SafetyChecker {
    /// Create a new SafetyChecker from the pipeline configuration.
    ///
    /// Uses [`StdioPromptHandler`] for interactive prompts.
    pub fn new(config: &Config) -> Self {
        Self::with_prompt_handler(config, Box::new(StdioPromptHandler))
    }

    /// Create a SafetyChecker with a custom prompt handler (for testing).
    pub fn with_prompt_handler(config: &Config, prompt_handler: Box<dyn PromptHandler>) -> Self {
        let json_logging = config
            .tracing_config
            .map(|tc| tc.json_tracing)
            .unwrap_or(false);

        Self {
            dry_run: config.dry_run,
            force: config.force,
            json_logging,
            prompt_handler,
        }
    }

    /// Check all safety preconditions before deleting the planned artifacts.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the pipeline should proceed
    /// - `Err(PruneError::Cancelled)` if the user declines confirmation
    ///
    /// # Decision Flow
    ///
    /// 1. If `dry_run` is true, return `Ok(())` (no confirmation needed)
    /// 2. If `force` is true, return `Ok(())`
    /// 3. If non-interactive (non-TTY or JSON logging), return `Ok(())`
    /// 4. Display the plan and prompt for confirmation
    pub fn check_before_deletion(&self, plan: &[Artifact]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }

        if self.force {
            return Ok(());
        }

        if self.should_skip_prompt() {
            return Ok(());
        }

        self.display_plan(plan);
        self.prompt_confirmation()
    }

    /// Determine if prompts should be skipped due to environment conditions.
    ///
    /// Prompts are skipped when:
    /// - JSON logging is enabled (would corrupt structured output)
    /// - The environment is non-interactive (no TTY on stdin/stdout)
    fn should_skip_prompt(&self) -> bool {
        if self.json_logging {
            return true;
        }

        if !self.prompt_handler.is_interactive() {
            return true;
        }

        false
    }

    /// Print the deletion plan so the operator confirms the actual set,
    /// not an estimate.
    fn display_plan(&self, plan: &[Artifact]) {
        println!("The following {} artifact(s) will be deleted:", plan.len());
        for artifact in plan {
            println!("  {} ({})", artifact.name, artifact.date.to_rfc3339());
        }
    }

    /// Prompt the user for confirmation and validate their response.
    ///
    /// Requires the user to type exactly "yes" to proceed.
    fn prompt_confirmation(&self) -> Result<()> {
        let input = self.prompt_handler.read_confirmation()?;

        if input != "yes" {
            return Err(anyhow!(PruneError::Cancelled));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_dummy_tracing_subscriber, make_dated_artifact, make_test_config};
    use crate::types::error::is_cancelled_error;

    struct MockPromptHandler {
        response: String,
        interactive: bool,
    }

    impl PromptHandler for MockPromptHandler {
        fn read_confirmation(&self) -> Result<String> {
            Ok(self.response.clone())
        }

        fn is_interactive(&self) -> bool {
            self.interactive
        }
    }

    fn make_plan() -> Vec<Artifact> {
        vec![
            make_dated_artifact("backups/dump-1.dmp", 2023, 1, 1),
            make_dated_artifact("backups/dump-2.dmp", 2023, 2, 1),
        ]
    }

    #[test]
    fn dry_run_skips_confirmation() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config("bucket", "prefix/");
        config.dry_run = true;

        let checker = SafetyChecker::with_prompt_handler(
            &config,
            Box::new(MockPromptHandler {
                response: "no".to_string(),
                interactive: true,
            }),
        );

        assert!(checker.check_before_deletion(&make_plan()).is_ok());
    }

    #[test]
    fn force_skips_confirmation() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config("bucket", "prefix/");
        config.force = true;

        let checker = SafetyChecker::with_prompt_handler(
            &config,
            Box::new(MockPromptHandler {
                response: "no".to_string(),
                interactive: true,
            }),
        );

        assert!(checker.check_before_deletion(&make_plan()).is_ok());
    }

    #[test]
    fn non_interactive_environment_skips_confirmation() {
        init_dummy_tracing_subscriber();

        let config = make_test_config("bucket", "prefix/");

        let checker = SafetyChecker::with_prompt_handler(
            &config,
            Box::new(MockPromptHandler {
                response: "no".to_string(),
                interactive: false,
            }),
        );

        assert!(checker.check_before_deletion(&make_plan()).is_ok());
    }

    #[test]
    fn json_logging_skips_confirmation() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config("bucket", "prefix/");
        config.tracing_config = Some(crate::config::TracingConfig {
            tracing_level: log::Level::Info,
            json_tracing: true,
            aws_sdk_tracing: false,
            span_events_tracing: false,
            disable_color_tracing: false,
        });

        let checker = SafetyChecker::with_prompt_handler(
            &config,
            Box::new(MockPromptHandler {
                response: "no".to_string(),
                interactive: true,
            }),
        );

        assert!(checker.check_before_deletion(&make_plan()).is_ok());
    }

    #[test]
    fn exact_yes_proceeds() {
        init_dummy_tracing_subscriber();

        let config = make_test_config("bucket", "prefix/");

        let checker = SafetyChecker::with_prompt_handler(
            &config,
            Box::new(MockPromptHandler {
                response: "yes".to_string(),
                interactive: true,
            }),
        );

        assert!(checker.check_before_deletion(&make_plan()).is_ok());
    }

    #[test]
    fn anything_but_yes_cancels() {
        init_dummy_tracing_subscriber();

        let config = make_test_config("bucket", "prefix/");

        for response in ["no", "YES", "y", "", "yes please"] {
            let checker = SafetyChecker::with_prompt_handler(
                &config,
                Box::new(MockPromptHandler {
                    response: response.to_string(),
                    interactive: true,
                }),
            );

            let err = checker.check_before_deletion(&make_plan()).unwrap_err();
            assert!(is_cancelled_error(&err), "response {response:?} should cancel");
        }
    }
}
