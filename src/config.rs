//! Configuration types for segment-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Top-level configuration
///
/// Every field has a default, so an empty JSON object (`{}`) is a valid configuration
/// that attaches to a local Chrome started with `--remote-debugging-port=9222`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// DevTools endpoint and session bring-up
    #[serde(default)]
    pub devtools: DevToolsConfig,

    /// Download behavior (output location, concurrency, admission queue)
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for establishing the DevTools session
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.devtools.endpoint.trim().is_empty() {
            return Err(Error::config("devtools.endpoint", "must not be empty"));
        }
        if url::Url::parse(&self.devtools.endpoint).is_err() {
            return Err(Error::config(
                "devtools.endpoint",
                format!("{:?} is not a valid URL", self.devtools.endpoint),
            ));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "download.max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        if self.download.queue_capacity == 0 {
            return Err(Error::config("download.queue_capacity", "must be at least 1"));
        }
        if self.download.file_prefix.contains(['/', '\\']) {
            return Err(Error::config(
                "download.file_prefix",
                "must not contain path separators",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be 1.0 (fixed interval) or greater",
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(Error::config(
                "retry.max_attempts",
                "must be at least 1 (omit for unbounded retries)",
            ));
        }
        Ok(())
    }
}

/// DevTools endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevToolsConfig {
    /// HTTP endpoint of the browser's remote debugging server (default: "http://127.0.0.1:9222")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Page the controlled tab is navigated to once the listener is attached
    /// (default: "https://www.netflix.com", `null` disables navigation)
    #[serde(default = "default_bootstrap_url")]
    pub bootstrap_url: Option<String>,

    /// Timeout for discovery requests and the WebSocket handshake (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout waiting for the response to a DevTools command (default: 30 seconds)
    #[serde(default = "default_command_timeout", with = "duration_serde")]
    pub command_timeout: Duration,
}

impl Default for DevToolsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bootstrap_url: default_bootstrap_url(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Download behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory output files are written to (default: the working directory)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Prefix of every output file name (default: "DL-")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Maximum concurrent downloads (default: 8)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Jobs that may wait for a worker before submission blocks (default: 64)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// HTTP connect timeout for segment downloads (default: 30 seconds)
    #[serde(default = "default_download_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// How long shutdown waits for in-flight jobs before abandoning them (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            max_concurrent_downloads: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
            connect_timeout: default_download_connect_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Retry configuration for session bring-up
///
/// The default is a fixed 5 second interval with no attempt limit: a browser that is
/// started after segment-dl is picked up as soon as its debugging port answers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: unbounded)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, fixed interval)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_bootstrap_url() -> Option<String> {
    Some("https://www.netflix.com".to_string())
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "DL-".to_string()
}

fn default_max_concurrent() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    64
}

fn default_download_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
