//! Producer: walks the timeline and feeds the task queue.

use crate::config::ItemErrorPolicy;
use crate::error::{Error, Result};
use crate::paginator::TimelinePaginator;
use crate::persist::{Persister, check_permalink, persist_page_metadata};
use crate::progress::ProgressTracker;
use crate::types::{Event, FetchedPage, ItemFailure, ItemTask};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// State owned by the producer task
pub(super) struct ProducerContext {
    pub(super) paginator: TimelinePaginator,
    pub(super) persister: Arc<dyn Persister>,
    pub(super) progress: Arc<ProgressTracker>,
    pub(super) tx: mpsc::Sender<ItemTask>,
    pub(super) query_id: Arc<str>,
    pub(super) policy: ItemErrorPolicy,
    pub(super) cancel: CancellationToken,
    pub(super) event_tx: broadcast::Sender<Event>,
}

/// What the producer hands back after a complete walk
pub(super) struct ProducerReport {
    /// Pages walked
    pub(super) pages: u32,
    /// Coubs left out of their page under [`ItemErrorPolicy::Skip`]
    pub(super) failures: Vec<ItemFailure>,
}

/// Walk every page, persisting its metadata before queueing its coubs
///
/// Coubs whose permalink cannot name a directory are handled by the item
/// error policy before the page is persisted. The queue sender is dropped
/// on return, which lets workers drain what is left and stop.
pub(super) async fn run_producer(ctx: ProducerContext) -> Result<ProducerReport> {
    let ProducerContext {
        paginator,
        persister,
        progress,
        tx,
        query_id,
        policy,
        cancel,
        event_tx,
    } = ctx;

    let mut failures = Vec::new();

    let pages = paginator
        .run(|mut page| {
            let rejected = reject_unusable(&mut page, &query_id);
            let skipped = rejected.len() as u64;
            let abort = match policy {
                ItemErrorPolicy::Skip => {
                    for (permalink, e) in rejected {
                        tracing::warn!(
                            page = page.number,
                            permalink = %permalink,
                            error = %e,
                            "Skipping coub"
                        );
                        report_failure(&event_tx, &permalink, &e);
                        failures.push(ItemFailure {
                            permalink,
                            error: e.to_string(),
                        });
                    }
                    None
                }
                ItemErrorPolicy::Abort => rejected.into_iter().next().map(|(permalink, e)| {
                    tracing::error!(
                        page = page.number,
                        permalink = %permalink,
                        error = %e,
                        "Coub failed, aborting run"
                    );
                    report_failure(&event_tx, &permalink, &e);
                    e
                }),
            };

            let persister = persister.clone();
            let progress = progress.clone();
            let tx = tx.clone();
            let query_id = query_id.clone();
            let cancel = cancel.clone();
            let event_tx = event_tx.clone();

            async move {
                if let Some(e) = abort {
                    cancel.cancel();
                    return Err(e);
                }
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if skipped > 0 {
                    progress.discovered(skipped).await;
                }

                // Metadata first: a queued coub always has its page on record
                persist_page_metadata(persister.as_ref(), &query_id, &page).await?;

                let number = page.number;
                let total_pages = page.total_pages;
                let items = page.entries.len();

                for entry in page.entries {
                    progress.discovered(1).await;
                    let task = ItemTask {
                        coub: entry.coub,
                        page: number,
                    };
                    tokio::select! {
                        sent = tx.send(task) => {
                            // Every worker is gone
                            sent.map_err(|_| Error::Cancelled)?;
                        }
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                    }
                }

                tracing::info!(
                    query_id = %query_id,
                    page = number,
                    total_pages,
                    items,
                    "Page archived"
                );
                event_tx
                    .send(Event::PageArchived {
                        page: number,
                        total_pages,
                        items,
                    })
                    .ok();
                Ok(())
            }
        })
        .await?;

    Ok(ProducerReport { pages, failures })
}

/// Remove entries whose permalink cannot name a directory, in listing order
fn reject_unusable(page: &mut FetchedPage, query_id: &str) -> Vec<(String, Error)> {
    let number = page.number;
    let mut rejected = Vec::new();
    page.entries.retain(|entry| {
        let permalink = &entry.coub.permalink;
        match check_permalink(query_id, number, permalink) {
            Ok(()) => true,
            Err(e) => {
                rejected.push((permalink.clone(), Error::for_item(permalink.clone(), e)));
                false
            }
        }
    });
    rejected
}

fn report_failure(event_tx: &broadcast::Sender<Event>, permalink: &str, e: &Error) {
    event_tx
        .send(Event::ItemFailed {
            permalink: permalink.to_string(),
            code: e.error_code().to_string(),
            error: e.to_string(),
        })
        .ok();
}
