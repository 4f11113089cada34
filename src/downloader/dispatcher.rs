//! Download dispatcher: a bounded admission queue in front of a bounded worker pool.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::JobExecutor;
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::types::{DownloadJob, Event, JobOutcome};

/// Snapshot of dispatcher activity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Jobs waiting in the admission queue
    pub queued: usize,
    /// Jobs currently executing
    pub active: usize,
    /// Highest number of jobs that executed at the same time
    pub peak_active: usize,
    /// Jobs that completed successfully
    pub completed: u64,
    /// Jobs that failed
    pub failed: u64,
    /// Jobs dropped at shutdown (queued or still running)
    pub abandoned: u64,
    /// Bytes written by all jobs, including partial writes of failed jobs
    pub bytes_written: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    bytes_written: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            queued: self.queued.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            abandoned: self.abandoned.load(Ordering::SeqCst),
            bytes_written: self.bytes_written.load(Ordering::SeqCst),
        }
    }
}

/// Bounded worker pool for download jobs
///
/// Jobs are admitted into a queue of `queue_capacity` slots; a single processor task
/// takes a worker permit, then the next job, and spawns it. At most
/// `max_concurrent_downloads` jobs execute at any instant. Submission waits while the
/// queue is full, which pushes back on whoever produces jobs.
pub struct Dispatcher {
    tx: mpsc::Sender<DownloadJob>,
    capacity: usize,
    accepting: AtomicBool,
    counters: Arc<Counters>,
    event_tx: broadcast::Sender<Event>,
    stop: CancellationToken,
    processor: JoinHandle<()>,
}

impl Dispatcher {
    /// Start the processor task; must be called from within a tokio runtime
    pub fn start(
        config: &DownloadConfig,
        executor: Arc<dyn JobExecutor>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let capacity = config.queue_capacity.max(1);
        let workers = config.max_concurrent_downloads.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let counters = Arc::new(Counters::default());
        let stop = CancellationToken::new();

        let processor = tokio::spawn(process_jobs(ProcessorContext {
            rx,
            workers: Arc::new(Semaphore::new(workers)),
            executor,
            counters: counters.clone(),
            event_tx: event_tx.clone(),
            stop: stop.clone(),
        }));

        tracing::debug!(workers, capacity, "Download dispatcher started");

        Self {
            tx,
            capacity,
            accepting: AtomicBool::new(true),
            counters,
            event_tx,
            stop,
            processor,
        }
    }

    /// Admit a job, waiting for a free queue slot
    pub async fn submit(&self, job: DownloadJob) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let slot = self.tx.reserve().await.map_err(|_| Error::ShuttingDown)?;
        self.admit(slot, job);
        Ok(())
    }

    /// Admit a job only if a queue slot is free right now
    pub fn try_submit(&self, job: DownloadJob) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let slot = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => Error::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(()) => Error::ShuttingDown,
        })?;
        self.admit(slot, job);
        Ok(())
    }

    fn admit(&self, slot: mpsc::Permit<'_, DownloadJob>, job: DownloadJob) {
        tracing::debug!(job_id = %job.id, target = %job.target_path.display(), "Job queued");
        let _ = self.event_tx.send(Event::JobQueued {
            id: job.id,
            source_url: job.source_url.clone(),
            target_path: job.target_path.clone(),
        });
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        slot.send(job);
    }

    /// Current counters
    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and drain
    ///
    /// Already queued jobs are still started. Jobs not finished after `drain_timeout`
    /// are aborted and counted as abandoned; their files may be partial.
    pub async fn shutdown(self, drain_timeout: Duration) -> DispatcherStats {
        self.accepting.store(false, Ordering::SeqCst);
        let Dispatcher {
            tx,
            counters,
            stop,
            mut processor,
            ..
        } = self;
        drop(tx);

        tracing::info!(
            queued = counters.queued.load(Ordering::SeqCst),
            active = counters.active.load(Ordering::SeqCst),
            "Draining download dispatcher"
        );

        if tokio::time::timeout(drain_timeout, &mut processor).await.is_err() {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs(),
                "Timeout waiting for downloads to complete, abandoning the rest"
            );
            stop.cancel();
            if let Err(e) = processor.await {
                tracing::error!(error = %e, "Dispatcher processor task failed");
            }
        }

        counters.snapshot()
    }
}

struct ProcessorContext {
    rx: mpsc::Receiver<DownloadJob>,
    workers: Arc<Semaphore>,
    executor: Arc<dyn JobExecutor>,
    counters: Arc<Counters>,
    event_tx: broadcast::Sender<Event>,
    stop: CancellationToken,
}

async fn process_jobs(ctx: ProcessorContext) {
    let ProcessorContext {
        mut rx,
        workers,
        executor,
        counters,
        event_tx,
        stop,
    } = ctx;
    let mut running: JoinSet<()> = JoinSet::new();

    loop {
        // Reap finished jobs first, then wait for a worker permit
        let permit = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            Some(joined) = running.join_next(), if !running.is_empty() => {
                report_join(&counters, joined);
                continue;
            }
            permit = workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        // active covers every spawned task, including one aborted before its first poll
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_active.fetch_max(active, Ordering::SeqCst);

        let executor = executor.clone();
        let counters = counters.clone();
        let event_tx = event_tx.clone();
        running.spawn(async move {
            let _permit = permit;
            let _ = event_tx.send(Event::DownloadStarted { id: job.id });

            let outcome = match executor.execute(&job).await {
                Ok(bytes_written) => JobOutcome {
                    job_id: job.id,
                    bytes_written,
                    error: None,
                },
                Err(e) => JobOutcome {
                    job_id: job.id,
                    bytes_written: match &e {
                        crate::error::DownloadError::Transfer { bytes_written, .. } => {
                            *bytes_written
                        }
                        crate::error::DownloadError::FileCreate { .. } => 0,
                    },
                    error: Some(e.to_string()),
                },
            };

            counters.active.fetch_sub(1, Ordering::SeqCst);
            record_outcome(&counters, &event_tx, outcome);
        });
    }

    // Queue closed or stop requested: let running jobs finish unless told to abandon
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            joined = running.join_next() => match joined {
                Some(joined) => report_join(&counters, joined),
                None => break,
            },
        }
    }

    // Jobs that finished before the abort keep their recorded outcome
    running.abort_all();
    while let Some(joined) = running.join_next().await {
        report_join(&counters, joined);
    }

    rx.close();
    let mut never_started: u64 = 0;
    while rx.try_recv().is_ok() {
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        never_started += 1;
    }
    counters.abandoned.fetch_add(never_started, Ordering::SeqCst);

    let abandoned = counters.abandoned.load(Ordering::SeqCst);
    if abandoned > 0 {
        tracing::warn!(abandoned, never_started, "Abandoned unfinished download jobs");
    }
    tracing::debug!("Download dispatcher stopped");
}

fn record_outcome(counters: &Counters, event_tx: &broadcast::Sender<Event>, outcome: JobOutcome) {
    counters
        .bytes_written
        .fetch_add(outcome.bytes_written, Ordering::SeqCst);

    match outcome.error {
        None => {
            counters.completed.fetch_add(1, Ordering::SeqCst);
            let _ = event_tx.send(Event::DownloadComplete {
                id: outcome.job_id,
                bytes: outcome.bytes_written,
            });
        }
        Some(error) => {
            tracing::error!(job_id = %outcome.job_id, error = %error, "Download failed");
            counters.failed.fetch_add(1, Ordering::SeqCst);
            let _ = event_tx.send(Event::DownloadFailed {
                id: outcome.job_id,
                error,
            });
        }
    }
}

/// Account for a job task that ended without recording its outcome
fn report_join(counters: &Counters, joined: std::result::Result<(), JoinError>) {
    let Err(e) = joined else { return };
    counters.active.fetch_sub(1, Ordering::SeqCst);
    if e.is_cancelled() {
        counters.abandoned.fetch_add(1, Ordering::SeqCst);
    } else {
        tracing::error!(error = %e, "Download task panicked");
        counters.failed.fetch_add(1, Ordering::SeqCst);
    }
}
