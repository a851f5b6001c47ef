//! Archive pipeline: paginator, task queue, and media workers.
//!
//! One producer task walks the timeline. For each page it persists the page
//! metadata, then queues every coub on the page. A fixed pool of workers
//! drains the queue, downloading and persisting each coub's media.
//!
//! Split into focused submodules:
//! - [`producer`] - Timeline walk, page metadata, task queueing
//! - [`worker`] - Media download and persist, item error policy

mod producer;
mod worker;


use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{HttpResourceFetcher, ResourceFetcher};
use crate::paginator::TimelinePaginator;
use crate::persist::{self, Persister};
use crate::progress::{LoggingSink, ProgressSink, ProgressTracker};
use crate::types::{ArchiveSummary, Event, ItemTask};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use producer::{ProducerContext, ProducerReport};
use worker::{WorkerContext, WorkerReport};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Archives one timeline into a persistence back-end
///
/// ```no_run
/// use coub_archive::{Archiver, Config};
///
/// # async fn demo() -> coub_archive::Result<()> {
/// let archiver = Archiver::from_config(Config::default())?;
/// let summary = archiver.run().await?;
/// println!("archived {} coubs", summary.progress.completed);
/// # Ok(())
/// # }
/// ```
pub struct Archiver {
    config: Arc<Config>,
    api_client: reqwest::Client,
    fetcher: Arc<dyn ResourceFetcher>,
    persister: Arc<dyn Persister>,
    sink: Arc<dyn ProgressSink>,
    event_tx: broadcast::Sender<Event>,
    query_id: String,
}

impl Archiver {
    /// Create an archiver from explicit collaborators
    ///
    /// The query id is derived from the current local time and the
    /// configured timeline; override it with [`Archiver::with_query_id`].
    pub fn new(
        config: Config,
        fetcher: Arc<dyn ResourceFetcher>,
        persister: Arc<dyn Persister>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        config.validate()?;

        let query_id = config.api.query_id(&chrono::Local::now());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            api_client: reqwest::Client::new(),
            fetcher,
            persister,
            sink,
            event_tx,
            query_id,
        })
    }

    /// Create an archiver with the HTTP fetcher and the configured store
    pub fn from_config(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpResourceFetcher::new(config.retry.clone())?);
        let persister = persist::from_config(&config.store, &config.archive)?;
        Self::new(config, fetcher, persister, Arc::new(LoggingSink))
    }

    /// Use a fixed archive directory name instead of the time-derived one
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = query_id.into();
        self
    }

    /// Use a specific HTTP client for listing requests
    pub fn with_api_client(mut self, client: reqwest::Client) -> Self {
        self.api_client = client;
        self
    }

    /// Name of the archive directory this run writes to
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Subscribe to pipeline events
    ///
    /// Subscribers that fall more than the channel capacity behind miss events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Archive the whole timeline
    ///
    /// Returns once the paginator has finished and every queued coub has
    /// been handled. A run-level error (credentials, pagination) is returned
    /// after the queue drains. Under [`ItemErrorPolicy::Abort`] the first
    /// item error stops the run; under [`ItemErrorPolicy::Skip`] failed
    /// coubs are listed in the summary.
    ///
    /// [`ItemErrorPolicy::Abort`]: crate::config::ItemErrorPolicy::Abort
    /// [`ItemErrorPolicy::Skip`]: crate::config::ItemErrorPolicy::Skip
    pub async fn run(&self) -> Result<ArchiveSummary> {
        self.check_credentials()?;

        let config = &self.config;
        let query_id: Arc<str> = Arc::from(self.query_id.as_str());
        let progress = Arc::new(ProgressTracker::new(self.sink.clone()));
        let cancel = CancellationToken::new();

        tracing::info!(
            query_id = %query_id,
            timeline = %config.api.timeline.api_path(),
            store = self.persister.name(),
            workers = config.archive.workers,
            "Starting archive run"
        );

        let (tx, rx) = mpsc::channel::<ItemTask>(config.archive.queue_capacity);
        let queue = Arc::new(Mutex::new(rx));

        let workers: Vec<_> = (0..config.archive.workers)
            .map(|index| {
                let ctx = WorkerContext {
                    index,
                    queue: queue.clone(),
                    fetcher: self.fetcher.clone(),
                    persister: self.persister.clone(),
                    progress: progress.clone(),
                    query_id: query_id.clone(),
                    policy: config.archive.on_item_error,
                    cancel: cancel.clone(),
                    event_tx: self.event_tx.clone(),
                };
                tokio::spawn(worker::run_worker(ctx))
            })
            .collect();
        // Workers hold the only receivers; if they all stop, sends fail
        drop(queue);

        let producer = tokio::spawn(producer::run_producer(ProducerContext {
            paginator: TimelinePaginator::new(self.api_client.clone(), &config.api),
            persister: self.persister.clone(),
            progress: progress.clone(),
            tx,
            query_id: query_id.clone(),
            policy: config.archive.on_item_error,
            cancel: cancel.clone(),
            event_tx: self.event_tx.clone(),
        }));

        let produced = producer
            .await
            .map_err(|e| Error::TaskFailed(format!("paginator task: {e}")));

        let mut failures = Vec::new();
        let mut item_error = None;
        let mut task_error = None;
        for joined in futures::future::join_all(workers).await {
            match joined {
                Ok(WorkerReport {
                    failures: skipped,
                    error,
                }) => {
                    failures.extend(skipped);
                    if item_error.is_none() {
                        item_error = error;
                    }
                }
                Err(e) => {
                    if task_error.is_none() {
                        task_error = Some(Error::TaskFailed(format!("worker task: {e}")));
                    }
                }
            }
        }

        let pages = match produced {
            Ok(Ok(ProducerReport {
                pages,
                failures: rejected,
            })) => {
                failures.extend(rejected);
                pages
            }
            // The paginator stopped because the workers did
            Ok(Err(Error::Cancelled)) if item_error.is_some() || task_error.is_some() => 0,
            Ok(Err(e)) | Err(e) => {
                tracing::error!(query_id = %query_id, error = %e, "Archive run failed");
                return Err(e);
            }
        };
        if let Some(e) = item_error.or(task_error) {
            tracing::error!(query_id = %query_id, error = %e, "Archive run aborted");
            return Err(e);
        }

        let summary = ArchiveSummary {
            query_id: query_id.to_string(),
            pages,
            progress: progress.snapshot().await,
            failures,
        };
        tracing::info!(
            query_id = %summary.query_id,
            pages = summary.pages,
            completed = summary.progress.completed,
            discovered = summary.progress.discovered,
            failed = summary.failures.len(),
            "Archive run finished"
        );
        Ok(summary)
    }

    fn check_credentials(&self) -> Result<()> {
        let api = &self.config.api;
        let has_cookie = api.cookie.as_deref().is_some_and(|c| !c.trim().is_empty());
        if api.timeline.requires_auth() && !has_cookie {
            return Err(Error::AuthMissing(format!(
                "{} requires a session cookie",
                api.timeline.api_path()
            )));
        }
        Ok(())
    }
}
