//! Error types for segment-dl
//!
//! This module provides the error taxonomy of the capture pipeline:
//! - Connection errors raised while bringing up the DevTools session
//! - Event-stream errors raised once the session is live
//! - URL errors raised while turning a segment response into a job
//! - Job errors raised by the downloader
//!
//! Every error carries a [`Disposition`] so the pipeline supervisor can decide
//! whether to retry, skip the offending event, abandon a single job, or stop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for segment-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for segment-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.max_concurrent_downloads")
        key: Option<String>,
    },

    /// Could not establish the DevTools session
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The response event stream closed or failed after the session was up
    #[error("event stream error: {0}")]
    EventStream(String),

    /// A DevTools command returned an error or no response
    #[error("devtools command {method} failed: {message}")]
    Command {
        /// CDP method name (e.g., "Page.navigate")
        method: String,
        /// Error message reported by the browser or the channel
        message: String,
    },

    /// A captured URL could not be turned into a downloadable URL
    #[error("malformed URL {url:?}: {reason}")]
    MalformedUrl {
        /// The offending URL as observed on the wire
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Download job error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Admission queue is at capacity
    #[error("download queue is full ({capacity} jobs pending)")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while discovering a target or opening its control channel
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The DevTools HTTP endpoint could not be reached or answered with an error
    #[error("DevTools endpoint {endpoint} unreachable: {source}")]
    Discovery {
        /// The DevTools HTTP endpoint
        endpoint: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered but the payload was not usable
    #[error("invalid target list from {endpoint}: {reason}")]
    InvalidTarget {
        /// The DevTools HTTP endpoint
        endpoint: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// The WebSocket handshake with the target failed
    #[error("failed to open control channel {url}: {source}")]
    WebSocket {
        /// The target's `webSocketDebuggerUrl`
        url: String,
        /// Underlying WebSocket error
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

/// Errors raised while executing a single download job
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The destination file could not be created (occupied or unwritable)
    #[error("cannot create {path}: {source}")]
    FileCreate {
        /// Destination path of the job
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The transfer failed (network error, bad status, or write failure)
    #[error("transfer from {url} failed: {reason}")]
    Transfer {
        /// Source URL of the job
        url: String,
        /// Failure description
        reason: String,
        /// Bytes already written when the failure happened
        bytes_written: u64,
    },
}

/// What the pipeline supervisor does with an error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Retry the whole operation after the configured delay
    Retry,
    /// Drop the single offending event and keep consuming
    Skip,
    /// Give up on one job; the dispatcher and other jobs carry on
    Abandon,
    /// Stop the pipeline
    Fatal,
}

impl Error {
    /// Create a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// How the supervisor treats this error
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::Connection(_) => Disposition::Retry,
            Error::MalformedUrl { .. } => Disposition::Skip,
            Error::Download(_) => Disposition::Abandon,
            Error::QueueFull { .. } => Disposition::Skip,
            Error::EventStream(_)
            | Error::Command { .. }
            | Error::Config { .. }
            | Error::ShuttingDown
            | Error::Cancelled
            | Error::Io(_)
            | Error::Serialization(_) => Disposition::Fatal,
        }
    }

    /// Machine-readable error code, used as a structured log field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Connection(e) => match e {
                ConnectionError::Discovery { .. } => "discovery_failed",
                ConnectionError::InvalidTarget { .. } => "invalid_target",
                ConnectionError::WebSocket { .. } => "websocket_failed",
            },
            Error::EventStream(_) => "event_stream_closed",
            Error::Command { .. } => "command_failed",
            Error::MalformedUrl { .. } => "malformed_url",
            Error::Download(e) => match e {
                DownloadError::FileCreate { .. } => "file_create_failed",
                DownloadError::Transfer { .. } => "transfer_failed",
            },
            Error::QueueFull { .. } => "queue_full",
            Error::ShuttingDown => "shutting_down",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
