use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, trace};

use s3prune_rs::config::Config;
use s3prune_rs::{
    CLIArgs, RetentionPipeline, create_pipeline_cancellation_token, exit_code_from_error,
    is_cancelled_error,
};

mod ctrl_c_handler;
mod summary;
mod tracing_init;

const EXIT_CODE_WARNING: i32 = 3;

/// s3prune - Generational backup retention for Amazon S3.
///
/// This binary is a thin wrapper over the s3prune-rs library.
/// All core functionality is implemented in the library crate.
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    run(config).await
}

fn load_config_exit_if_err() -> Config {
    let config = Config::try_from(CLIArgs::parse());
    if let Err(error_message) = config {
        clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit();
    }
    config.unwrap()
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    if config.tracing_config.is_none() {
        return false;
    }

    tracing_init::init_tracing(config.tracing_config.as_ref().unwrap());
    true
}

async fn run(config: Config) -> Result<()> {
    let has_warning;

    {
        let cancellation_token = create_pipeline_cancellation_token();

        ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

        let start_time = tokio::time::Instant::now();
        debug!("retention pipeline start.");

        let mut pipeline = RetentionPipeline::new(config.clone(), cancellation_token).await;
        let summary_join_handle =
            summary::show_summary(pipeline.get_stats_receiver(), config.dry_run);

        pipeline.run().await;
        summary_join_handle.await?;

        let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

        if pipeline.has_error() {
            let errors = pipeline.get_errors_and_consume().unwrap();
            for err in &errors {
                if is_cancelled_error(err) {
                    debug!("retention run cancelled by user.");
                    return Ok(());
                }
                error!("{}", err);
            }
            error!(duration_sec = duration_sec, "s3prune failed.");
            std::process::exit(exit_code_from_error(&errors[0]));
        }

        has_warning = pipeline.has_warning();

        debug!(duration_sec = duration_sec, "s3prune has been completed.");
    }

    if has_warning {
        std::process::exit(EXIT_CODE_WARNING);
    }

    Ok(())
}
