use super::*;
use crate::config::DownloadConfig;
use crate::types::{DownloadJob, JobFactory};
use std::path::Path;

mod http;

/// Config pointing at `dir` with the given pool size and queue capacity
fn test_config(dir: &Path, workers: usize, capacity: usize) -> DownloadConfig {
    DownloadConfig {
        output_dir: dir.to_path_buf(),
        max_concurrent_downloads: workers,
        queue_capacity: capacity,
        ..DownloadConfig::default()
    }
}

/// `count` jobs whose sources are `{base}/?n=<i>`
fn jobs_for(factory: &JobFactory, base: &str, count: usize) -> Vec<DownloadJob> {
    (0..count)
        .map(|n| factory.next_job(format!("{base}?n={n}")))
        .collect()
}
