//! Download execution split into focused submodules.
//!
//! - `http` - the [`JobExecutor`] seam and the `reqwest`-backed downloader
//! - `dispatcher` - bounded admission queue and worker pool

mod dispatcher;
mod http;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, DispatcherStats};
pub use http::{HttpDownloader, JobExecutor};
