//! Pipeline supervisor: session, listener, classifier and dispatcher wired together.
//!
//! The supervisor owns the control flow. Errors are routed by
//! [`Error::disposition`]: connection errors are retried inside the connector,
//! malformed segment URLs are skipped, job errors stay inside the dispatcher, and
//! everything else stops the pipeline after the dispatcher has been drained.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::devtools::{Connector, ResponseStream, listen};
use crate::downloader::{Dispatcher, HttpDownloader, JobExecutor};
use crate::error::{Disposition, Error, Result};
use crate::segment::{is_segment_url, to_downloadable};
use crate::types::{DownloadJob, Event, JobFactory, PipelineReport};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Capture-and-download pipeline
pub struct Pipeline {
    config: Config,
    executor: Arc<dyn JobExecutor>,
    factory: JobFactory,
    event_tx: broadcast::Sender<Event>,
}

impl Pipeline {
    /// Build a pipeline that downloads over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let executor = Arc::new(HttpDownloader::new(&config.download)?);
        Self::with_executor(config, executor)
    }

    /// Build a pipeline with a custom job executor
    pub fn with_executor(config: Config, executor: Arc<dyn JobExecutor>) -> Result<Self> {
        config.validate()?;
        let factory = JobFactory::new(
            config.download.output_dir.clone(),
            config.download.file_prefix.clone(),
        );
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            executor,
            factory,
            event_tx,
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Slow subscribers lose the oldest events (`RecvError::Lagged`); the pipeline
    /// never waits on them.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Turn an observed response URL into a job
    ///
    /// Returns `Ok(None)` for non-segment URLs and `Err(Error::MalformedUrl)` for
    /// segment URLs that have no downloadable form. A job ID is only consumed when a
    /// job is produced.
    pub fn plan_job(&self, url: &str) -> Result<Option<DownloadJob>> {
        if !is_segment_url(url) {
            return Ok(None);
        }
        let source = to_downloadable(url)?;
        Ok(Some(self.factory.next_job(source)))
    }

    /// Run until `cancel` fires or a fatal error occurs
    ///
    /// Cancellation is a normal stop and yields `Ok`. A fatal error is returned only
    /// after the dispatcher has been drained.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineReport> {
        let connector = Connector::new(self.config.devtools.clone(), self.config.retry.clone())?;
        let mut session = match connector.connect(&cancel).await {
            Ok(session) => session,
            Err(Error::Cancelled) => {
                tracing::info!("Cancelled before a session was established");
                self.emit(Event::Shutdown);
                return Ok(PipelineReport::default());
            }
            Err(e) => return Err(e),
        };
        self.emit(Event::Connected {
            target_url: session.target_url().to_string(),
        });

        let mut stream = match listen(&mut session).await {
            Ok(stream) => stream,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        if let Some(url) = &self.config.devtools.bootstrap_url {
            tracing::info!(url = %url, "Navigating to bootstrap page");
            if let Err(e) = session.navigate(url).await {
                tracing::error!(error = %e, error_code = e.error_code(), "Bootstrap navigation failed");
                session.close().await;
                return Err(e);
            }
        }

        let dispatcher = Dispatcher::start(
            &self.config.download,
            self.executor.clone(),
            self.event_tx.clone(),
        );

        let mut report = PipelineReport::default();
        let outcome = self
            .consume(&mut stream, &dispatcher, &cancel, &mut report)
            .await;

        tracing::info!(
            timeout_secs = self.config.download.shutdown_timeout.as_secs(),
            "Stopping pipeline"
        );
        let stats = dispatcher
            .shutdown(self.config.download.shutdown_timeout)
            .await;
        session.close().await;

        report.jobs_completed = stats.completed;
        report.jobs_failed = stats.failed;
        report.jobs_abandoned = stats.abandoned;
        report.bytes_written = stats.bytes_written;

        self.emit(Event::Shutdown);
        tracing::info!(
            responses = report.responses_observed,
            segments = report.segments_matched,
            queued = report.jobs_queued,
            completed = report.jobs_completed,
            failed = report.jobs_failed,
            abandoned = report.jobs_abandoned,
            bytes = report.bytes_written,
            "Pipeline stopped"
        );

        outcome.map(|()| report)
    }

    /// Listener loop: classify each URL and admit jobs until cancelled or a fatal error
    async fn consume(
        &self,
        stream: &mut ResponseStream,
        dispatcher: &Dispatcher,
        cancel: &CancellationToken,
        report: &mut PipelineReport,
    ) -> Result<()> {
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                item = stream.next() => item,
            };
            let url = match item {
                Some(Ok(url)) => url,
                Some(Err(e)) => {
                    tracing::error!(error = %e, error_code = e.error_code(), "Response stream failed");
                    return Err(e);
                }
                None => return Err(Error::EventStream("response stream ended".to_string())),
            };
            report.responses_observed += 1;

            let job = match self.plan_job(&url) {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => match e.disposition() {
                    Disposition::Skip => {
                        report.segments_matched += 1;
                        report.urls_skipped += 1;
                        tracing::warn!(url = %url, error = %e, "Skipping segment URL");
                        self.emit(Event::UrlSkipped {
                            url,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                    _ => return Err(e),
                },
            };
            report.segments_matched += 1;
            tracing::debug!(url = %url, job_id = %job.id, "Segment captured");
            self.emit(Event::SegmentCaptured { url });

            // Waits while the admission queue is full
            let admitted = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                admitted = dispatcher.submit(job) => admitted,
            };
            match admitted {
                Ok(()) => report.jobs_queued += 1,
                Err(e) if e.disposition() == Disposition::Skip => {
                    tracing::warn!(error = %e, "Job not admitted");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DevToolsConfig, DownloadConfig, RetryConfig};
    use crate::error::DownloadError;
    use std::time::Duration;

    struct NoopExecutor;

    #[async_trait::async_trait]
    impl JobExecutor for NoopExecutor {
        async fn execute(&self, _job: &DownloadJob) -> std::result::Result<u64, DownloadError> {
            Ok(0)
        }
    }

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        let config = Config {
            devtools: DevToolsConfig {
                bootstrap_url: None,
                ..DevToolsConfig::default()
            },
            download: DownloadConfig {
                output_dir: dir.to_path_buf(),
                ..DownloadConfig::default()
            },
            retry: RetryConfig::default(),
        };
        Pipeline::with_executor(config, Arc::new(NoopExecutor)).unwrap()
    }

    #[test]
    fn plan_job_ignores_non_segments() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        assert!(pipeline.plan_job("https://cdn.example/manifest.json").unwrap().is_none());
        assert!(pipeline.plan_job("not a url").unwrap().is_none());
    }

    #[test]
    fn plan_job_strips_path_and_numbers_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let first = pipeline
            .plan_job("https://ipv4-c001.nflxvideo.net/range/0-1024?o=1&v=5")
            .unwrap()
            .unwrap();
        let second = pipeline
            .plan_job("https://ipv4-c001.nflxvideo.net/range/0-2048?o=2")
            .unwrap()
            .unwrap();

        assert_eq!(first.source_url, "https://ipv4-c001.nflxvideo.net?o=1&v=5");
        assert_eq!(second.source_url, "https://ipv4-c001.nflxvideo.net?o=2");
        assert_eq!(first.id.get() + 1, second.id.get());
        assert_ne!(first.target_path, second.target_path);
        assert!(first.target_path.starts_with(dir.path()));
        let name = first.target_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("DL-"), "unexpected file name {name}");
    }

    #[test]
    fn plan_job_reports_malformed_segments_as_skippable() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let err = pipeline.plan_job("data:text/plain,/range/0-1").unwrap_err();
        assert!(matches!(err, Error::MalformedUrl { .. }));
        assert_eq!(err.disposition(), Disposition::Skip);

        // the failed URL did not consume a sequence number
        let job = pipeline
            .plan_job("https://cdn.example/range/0-1")
            .unwrap()
            .unwrap();
        assert_eq!(job.id.get(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config {
            download: DownloadConfig {
                max_concurrent_downloads: 0,
                ..DownloadConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            Pipeline::with_executor(config, Arc::new(NoopExecutor)),
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_while_connecting_is_a_clean_stop() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.devtools.endpoint = endpoint;
        config.download.output_dir = dir.path().to_path_buf();
        config.retry.initial_delay = Duration::from_millis(20);
        config.retry.max_delay = Duration::from_millis(20);
        let pipeline = Pipeline::with_executor(config, Arc::new(NoopExecutor)).unwrap();
        let mut events = pipeline.subscribe();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = pipeline.run(cancel).await.unwrap();
        assert_eq!(report, PipelineReport::default());
        assert!(matches!(events.try_recv(), Ok(Event::Shutdown)));
    }
}
