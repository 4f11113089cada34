//! # segment-dl
//!
//! Captures byte-range media segments observed in a remote-debuggable browser and
//! downloads each underlying resource to disk.
//!
//! The pipeline attaches to a page target over the Chrome DevTools Protocol, listens
//! for `Network.responseReceived` notifications, keeps the URLs whose path carries a
//! `/range/0-` marker, strips the path to obtain the full resource URL and hands each
//! one to a bounded pool of HTTP downloaders.
//!
//! ## Quick Start
//!
//! ```no_run
//! use segment_dl::{Config, Pipeline, run_until_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = run_until_signal(&pipeline).await?;
//!     println!("{} segments downloaded", report.jobs_completed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// DevTools discovery, control channel and response listener
pub mod devtools;
/// Bounded download dispatcher and HTTP job execution
pub mod downloader;
/// Error types
pub mod error;
/// Pipeline supervisor
pub mod pipeline;
/// Retry logic with backoff
pub mod retry;
/// Segment URL classification and rewriting
pub mod segment;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DevToolsConfig, DownloadConfig, RetryConfig};
pub use devtools::{Connector, ResponseStream, Session, listen};
pub use downloader::{Dispatcher, DispatcherStats, HttpDownloader, JobExecutor};
pub use error::{ConnectionError, Disposition, DownloadError, Error, Result};
pub use pipeline::Pipeline;
pub use segment::{is_segment_url, to_downloadable};
pub use types::{DownloadJob, Event, JobFactory, JobId, PipelineReport};

use tokio_util::sync::CancellationToken;

/// Run the pipeline until a termination signal arrives
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The signal cancels the pipeline, which then drains its downloads and returns its
/// report. A fatal pipeline error is returned as soon as it happens.
pub async fn run_until_signal(pipeline: &Pipeline) -> Result<PipelineReport> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = wait_for_signal() => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        }
    });

    let result = pipeline.run(cancel.clone()).await;
    cancel.cancel();
    let _ = watcher.await;
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
