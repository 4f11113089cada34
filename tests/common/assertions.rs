//! Waiting helpers for pipeline events and output files

use segment_dl::Event;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

/// Collect events until `done` returns true for the collected list
///
/// Returns whatever was collected when the timeout expires or the channel closes.
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut done: F,
) -> Vec<Event>
where
    F: FnMut(&[Event]) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    seen.push(event);
                    if done(&seen) {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    seen
}

/// Number of `DownloadComplete` and `DownloadFailed` events in `events`
pub fn finished_jobs(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::DownloadComplete { .. } | Event::DownloadFailed { .. }
            )
        })
        .count()
}

/// `(source_url, target_path)` of every `JobQueued` event
pub fn queued_jobs(events: &[Event]) -> Vec<(String, PathBuf)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::JobQueued {
                source_url,
                target_path,
                ..
            } => Some((source_url.clone(), target_path.clone())),
            _ => None,
        })
        .collect()
}

/// Regular files directly inside `dir`, sorted
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
