//! segment-dl command line entry point.
//!
//! Usage: `segment-dl [config.json]`. Without an argument the defaults are used:
//! attach to `http://127.0.0.1:9222` and write into the working directory.

use std::path::PathBuf;
use std::process::ExitCode;

use segment_dl::{Config, Pipeline, run_until_signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match Config::from_file(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, error_code = e.error_code(), "Invalid configuration");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "Failed to build pipeline");
            return ExitCode::FAILURE;
        }
    };

    match run_until_signal(&pipeline).await {
        Ok(report) => {
            tracing::info!(
                completed = report.jobs_completed,
                failed = report.jobs_failed,
                bytes = report.bytes_written,
                "Finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "Pipeline stopped with a fatal error");
            ExitCode::FAILURE
        }
    }
}
