//! Worker: downloads and persists the media of queued coubs.

use crate::config::ItemErrorPolicy;
use crate::error::{Error, Result};
use crate::fetch::ResourceFetcher;
use crate::link::select_best_link;
use crate::persist::{Persister, persist_media};
use crate::progress::ProgressTracker;
use crate::types::{
    Coub, DownloadedMedia, Event, ItemFailure, ItemTask, MediaPayload, MediaRole,
};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// State owned by one worker task
pub(super) struct WorkerContext {
    pub(super) index: usize,
    pub(super) queue: Arc<Mutex<mpsc::Receiver<ItemTask>>>,
    pub(super) fetcher: Arc<dyn ResourceFetcher>,
    pub(super) persister: Arc<dyn Persister>,
    pub(super) progress: Arc<ProgressTracker>,
    pub(super) query_id: Arc<str>,
    pub(super) policy: ItemErrorPolicy,
    pub(super) cancel: CancellationToken,
    pub(super) event_tx: broadcast::Sender<Event>,
}

/// What a worker hands back when it stops
#[derive(Default)]
pub(super) struct WorkerReport {
    /// Items skipped under [`ItemErrorPolicy::Skip`]
    pub(super) failures: Vec<ItemFailure>,
    /// The item error that aborted the run, if this worker hit it
    pub(super) error: Option<Error>,
}

/// Take tasks until the queue is closed and empty, or the run is cancelled
pub(super) async fn run_worker(ctx: WorkerContext) -> WorkerReport {
    let mut report = WorkerReport::default();

    loop {
        let next = {
            let mut queue = ctx.queue.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                task = queue.recv() => task,
            }
        };
        let Some(task) = next else {
            break;
        };

        let permalink = task.coub.permalink.clone();
        match archive_item(&ctx, &task).await {
            Ok(()) => {
                ctx.progress.completed().await;
                tracing::debug!(worker = ctx.index, permalink = %permalink, "Coub archived");
                ctx.event_tx
                    .send(Event::ItemArchived {
                        permalink,
                        page: task.page,
                    })
                    .ok();
            }
            Err(e) => {
                let e = Error::for_item(permalink.clone(), e);
                ctx.event_tx
                    .send(Event::ItemFailed {
                        permalink: permalink.clone(),
                        code: e.error_code().to_string(),
                        error: e.to_string(),
                    })
                    .ok();

                match ctx.policy {
                    ItemErrorPolicy::Skip => {
                        tracing::warn!(
                            worker = ctx.index,
                            permalink = %permalink,
                            error = %e,
                            "Skipping coub"
                        );
                        report.failures.push(ItemFailure {
                            permalink,
                            error: e.to_string(),
                        });
                    }
                    ItemErrorPolicy::Abort => {
                        tracing::error!(
                            worker = ctx.index,
                            permalink = %permalink,
                            error = %e,
                            "Coub failed, aborting run"
                        );
                        ctx.cancel.cancel();
                        report.error = Some(e);
                        break;
                    }
                }
            }
        }
    }

    report
}

async fn archive_item(ctx: &WorkerContext, task: &ItemTask) -> Result<()> {
    let media = download_media(ctx.fetcher.as_ref(), &task.coub).await?;
    persist_media(ctx.persister.as_ref(), &ctx.query_id, task.page, &media).await?;
    Ok(())
}

/// Fetch the best video and, when the coub has an audio track, the best audio
pub(super) async fn download_media(
    fetcher: &dyn ResourceFetcher,
    coub: &Coub,
) -> Result<DownloadedMedia> {
    let html5 = &coub.file_versions.html5;

    let video_url = select_best_link(&html5.video, MediaRole::Video)?;
    let video = MediaPayload {
        url: video_url.to_string(),
        bytes: fetcher.fetch(video_url).await?,
    };

    let audio = match &html5.audio {
        Some(variant) => match select_best_link(variant, MediaRole::Audio) {
            Ok(url) => Some(MediaPayload {
                url: url.to_string(),
                bytes: fetcher.fetch(url).await?,
            }),
            // Audio is optional: an empty audio variant means no track
            Err(Error::ResourceNotFound { .. }) => {
                tracing::debug!(permalink = %coub.permalink, "Audio variant offers no link");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(DownloadedMedia {
        permalink: coub.permalink.clone(),
        video,
        audio,
    })
}
