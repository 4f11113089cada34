//! Core types for segment-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed network response, as reported by `Network.responseReceived`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseEvent {
    /// URL of the response
    pub url: String,
}

/// One unit of download work
///
/// Jobs are immutable once built; each owns its own source URL and destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadJob {
    /// Job identifier (also the sequence number in the file name)
    pub id: JobId,
    /// Directly downloadable resource URL
    pub source_url: String,
    /// Destination file, unique for the lifetime of the process
    pub target_path: PathBuf,
}

/// Result of executing one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    /// Job identifier
    pub job_id: JobId,
    /// Bytes written to the destination (partial on failure)
    pub bytes_written: u64,
    /// Failure description, `None` on success
    pub error: Option<String>,
}

/// Builds download jobs with collision-free destinations
///
/// Destinations are `<output_dir>/<prefix><run-stamp>-<seq>`. `seq` comes from a
/// monotonic counter owned by the factory, so two jobs from the same factory never
/// share a path. The run stamp is fixed when the factory is created and keeps
/// file names from earlier runs in the same directory apart.
#[derive(Debug)]
pub struct JobFactory {
    output_dir: PathBuf,
    prefix: String,
    run_stamp: String,
    next_id: AtomicU64,
}

impl JobFactory {
    /// Create a factory stamped with the current UTC time
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self::with_start_time(output_dir, prefix, Utc::now())
    }

    /// Create a factory with an explicit run stamp
    pub fn with_start_time(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            run_stamp: started_at.format("%Y%m%dT%H%M%S").to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build the next job for `source_url`
    pub fn next_job(&self, source_url: impl Into<String>) -> DownloadJob {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let file_name = format!("{}{}-{:06}", self.prefix, self.run_stamp, id.0);
        DownloadJob {
            id,
            source_url: source_url.into(),
            target_path: self.output_dir.join(file_name),
        }
    }
}

/// Event emitted by the pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// DevTools session established
    Connected {
        /// WebSocket URL of the attached target
        target_url: String,
    },

    /// A segment response was observed
    SegmentCaptured {
        /// URL as observed on the wire
        url: String,
    },

    /// A segment response was dropped because it could not be turned into a job
    UrlSkipped {
        /// URL as observed on the wire
        url: String,
        /// Why it was dropped
        reason: String,
    },

    /// Job admitted to the dispatcher
    JobQueued {
        /// Job ID
        id: JobId,
        /// Downloadable URL
        source_url: String,
        /// Destination file
        target_path: PathBuf,
    },

    /// A worker started the job
    DownloadStarted {
        /// Job ID
        id: JobId,
    },

    /// Job finished successfully
    DownloadComplete {
        /// Job ID
        id: JobId,
        /// Bytes written
        bytes: u64,
    },

    /// Job failed and was abandoned
    DownloadFailed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Pipeline is shutting down
    Shutdown,
}

/// Counters reported when the pipeline stops
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Response events observed on the session
    pub responses_observed: u64,
    /// Responses classified as segments
    pub segments_matched: u64,
    /// Segment URLs dropped as malformed
    pub urls_skipped: u64,
    /// Jobs admitted to the dispatcher
    pub jobs_queued: u64,
    /// Jobs that completed successfully
    pub jobs_completed: u64,
    /// Jobs that failed
    pub jobs_failed: u64,
    /// Jobs still queued or running when shutdown gave up on them
    pub jobs_abandoned: u64,
    /// Bytes written across all jobs
    pub bytes_written: u64,
}
