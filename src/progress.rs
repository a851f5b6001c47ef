//! Progress aggregation across the producer and the workers
//!
//! Two counters are tracked: `discovered` grows as the paginator queues
//! items, `completed` grows as workers persist them. The denominator keeps
//! growing until pagination ends. Both counters and the sink call sit behind
//! one lock, so the sink sees updates in the order they were applied.

use crate::types::{Event, ProgressCounters, ProgressUpdate};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Receives progress updates from the archive pipeline
///
/// Calls are serialized by [`ProgressTracker`]; implementations do not need
/// their own locking for ordering, only `Send + Sync`.
pub trait ProgressSink: Send + Sync {
    /// Called after every counter change
    fn on_progress(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Sink that logs progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ProgressSink for LoggingSink {
    fn on_progress(&self, update: ProgressUpdate) {
        tracing::debug!(
            completed = update.completed,
            discovered = update.discovered,
            "Archive progress"
        );
    }
}

/// Sink that forwards progress as [`Event::Progress`] on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    /// Forward progress to `tx`
    pub fn new(tx: broadcast::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for BroadcastSink {
    fn on_progress(&self, update: ProgressUpdate) {
        // No subscribers is fine
        self.tx
            .send(Event::Progress {
                completed: update.completed,
                discovered: update.discovered,
            })
            .ok();
    }
}

/// Shared progress counters feeding a [`ProgressSink`]
pub struct ProgressTracker {
    counters: Mutex<ProgressCounters>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    /// Create a tracker with both counters at zero
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            counters: Mutex::new(ProgressCounters::default()),
            sink,
        }
    }

    /// Record `count` newly discovered items
    pub async fn discovered(&self, count: u64) {
        self.apply(0, count).await;
    }

    /// Record one item whose media has been persisted
    pub async fn completed(&self) {
        self.apply(1, 0).await;
    }

    /// Current counters
    pub async fn snapshot(&self) -> ProgressCounters {
        *self.counters.lock().await
    }

    async fn apply(&self, delta_completed: u64, delta_discovered: u64) {
        let mut counters = self.counters.lock().await;
        counters.discovered += delta_discovered;
        counters.completed += delta_completed;
        debug_assert!(counters.completed <= counters.discovered);

        self.sink.on_progress(ProgressUpdate {
            delta_completed,
            delta_discovered,
            completed: counters.completed,
            discovered: counters.discovered,
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn recording_tracker() -> (Arc<ProgressTracker>, Arc<std::sync::Mutex<Vec<ProgressUpdate>>>) {
        let updates = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_updates = updates.clone();
        let sink = move |update: ProgressUpdate| sink_updates.lock().unwrap().push(update);
        (Arc::new(ProgressTracker::new(Arc::new(sink))), updates)
    }

    #[tokio::test]
    async fn updates_carry_deltas_and_totals() {
        let (tracker, updates) = recording_tracker();

        tracker.discovered(2).await;
        tracker.completed().await;

        let updates = updates.lock().unwrap();
        assert_eq!(
            *updates,
            vec![
                ProgressUpdate {
                    delta_completed: 0,
                    delta_discovered: 2,
                    completed: 0,
                    discovered: 2,
                },
                ProgressUpdate {
                    delta_completed: 1,
                    delta_discovered: 0,
                    completed: 1,
                    discovered: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_updates_stay_monotonic_and_bounded() {
        let (tracker, updates) = recording_tracker();

        // Each task discovers an item before completing it, like the pipeline does
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    tracker.discovered(1).await;
                    tokio::task::yield_now().await;
                    tracker.completed().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 400);
        let mut last = ProgressCounters::default();
        for update in updates.iter() {
            assert!(update.completed <= update.discovered, "{update:?}");
            assert!(update.completed >= last.completed);
            assert!(update.discovered >= last.discovered);
            last = ProgressCounters {
                completed: update.completed,
                discovered: update.discovered,
            };
        }
        assert_eq!(
            tracker.snapshot().await,
            ProgressCounters {
                discovered: 200,
                completed: 200,
            }
        );
    }

    #[tokio::test]
    async fn broadcast_sink_emits_progress_events() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(Arc::new(BroadcastSink::new(tx)));

        tracker.discovered(3).await;

        match rx.recv().await.unwrap() {
            Event::Progress {
                completed,
                discovered,
            } => {
                assert_eq!(completed, 0);
                assert_eq!(discovered, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_sink_without_subscribers_does_not_fail() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let tracker = ProgressTracker::new(Arc::new(BroadcastSink::new(tx)));

        tracker.discovered(1).await;
        tracker.completed().await;

        assert_eq!(tracker.snapshot().await.completed, 1);
    }
}
