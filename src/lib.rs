//! # coub-archive
//!
//! Archives a coub.com timeline: every page of the listing API is walked in
//! order, its metadata persisted, and the best video and audio of every
//! listed coub downloaded and persisted by a pool of workers.
//!
//! ## Design Philosophy
//!
//! coub-archive is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Crash-safe** - Every artifact is staged and committed in one step
//! - **Pluggable** - Fetching, persistence, and progress reporting are traits
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use coub_archive::{Archiver, Config, Event};
//! use coub_archive::credentials::{default_curl_path, read_cookie_file};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     if let Some(path) = default_curl_path() {
//!         config.api.cookie = Some(read_cookie_file(&path).await?);
//!     }
//!
//!     let archiver = Archiver::from_config(config)?;
//!
//!     let mut events = archiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::PageArchived { page, total_pages, .. } = event {
//!                 println!("page {page}/{total_pages}");
//!             }
//!         }
//!     });
//!
//!     let summary = archiver.run().await?;
//!     println!("archived {} coubs into {}", summary.progress.completed, summary.query_id);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive pipeline orchestration
pub mod archive;
/// Configuration types
pub mod config;
/// Session cookie extraction
pub mod credentials;
/// Error types
pub mod error;
/// Media resource fetching
pub mod fetch;
/// Best-quality link selection
pub mod link;
/// Timeline pagination
pub mod paginator;
/// Stage-then-commit persistence back-ends
pub mod persist;
/// Progress aggregation and sinks
pub mod progress;
/// Fixed-delay retry
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use archive::Archiver;
pub use config::{ApiConfig, ArchiveConfig, Config, ItemErrorPolicy, RetryConfig, StoreConfig};
pub use error::{Error, Result};
pub use fetch::{HttpResourceFetcher, ResourceFetcher};
pub use persist::{FilesystemPersister, IpfsPersister, Persister, Staging};
pub use progress::{BroadcastSink, LoggingSink, ProgressSink, ProgressTracker};
pub use types::{
    ArchiveSummary, Coub, CoubId, Event, ItemFailure, MediaRole, MediaVariant, ProgressCounters,
    ProgressUpdate, Timeline,
};
