//! HTTP job execution: one GET streamed into one new file.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use crate::types::DownloadJob;

/// Abstraction over job execution, enabling testability of the dispatcher.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run `job` to completion and return the number of bytes written
    async fn execute(&self, job: &DownloadJob) -> std::result::Result<u64, DownloadError>;
}

/// Production [`JobExecutor`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Build a downloader with the configured connect timeout
    ///
    /// No total request timeout is set: segment resources can be large and are
    /// streamed for as long as the server keeps sending.
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("cannot build HTTP client: {e}"),
                key: None,
            })?;
        Ok(Self { client })
    }

    /// Download `job.source_url` into `job.target_path`
    ///
    /// The destination is created with `create_new`, so an occupied path fails before
    /// any request is made. The body is written chunk by chunk as it arrives. On
    /// failure the partially written file is left in place.
    pub async fn run(&self, job: &DownloadJob) -> std::result::Result<u64, DownloadError> {
        tracing::info!(job_id = %job.id, url = %job.source_url, "Downloading");

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&job.target_path)
            .await
            .map_err(|source| DownloadError::FileCreate {
                path: job.target_path.clone(),
                source,
            })?;
        let mut out = tokio::io::BufWriter::new(file);

        let response = self
            .client
            .get(&job.source_url)
            .send()
            .await
            .map_err(|e| transfer_error(job, e.to_string(), 0))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transfer_error(job, format!("HTTP {status}"), 0));
        }

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| transfer_error(job, e.to_string(), written))?;
            out.write_all(&chunk)
                .await
                .map_err(|e| transfer_error(job, format!("write failed: {e}"), written))?;
            written += chunk.len() as u64;
        }
        out.flush()
            .await
            .map_err(|e| transfer_error(job, format!("flush failed: {e}"), written))?;

        tracing::info!(job_id = %job.id, bytes = written, path = %job.target_path.display(), "Done");
        Ok(written)
    }
}

#[async_trait::async_trait]
impl JobExecutor for HttpDownloader {
    async fn execute(&self, job: &DownloadJob) -> std::result::Result<u64, DownloadError> {
        self.run(job).await
    }
}

fn transfer_error(job: &DownloadJob, reason: String, bytes_written: u64) -> DownloadError {
    DownloadError::Transfer {
        url: job.source_url.clone(),
        reason,
        bytes_written,
    }
}
