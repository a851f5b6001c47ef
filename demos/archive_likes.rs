//! Archive your liked coubs to the local filesystem
//!
//! This example demonstrates the core functionality of coub-archive:
//! - Reading the session cookie from a saved curl command
//! - Configuring the timeline, workers, and error policy
//! - Subscribing to page and item events
//! - Running the archive and reading its summary
//!
//! Save a request to coub.com with your browser's "Copy as cURL" action into
//! `~/coub-curl.txt` (or pass a path as the first argument), then run:
//!
//! ```bash
//! RUST_LOG=coub_archive=debug cargo run --example archive_likes
//! ```

use coub_archive::config::{ArchiveConfig, ItemErrorPolicy};
use coub_archive::credentials::{default_curl_path, read_cookie_file};
use coub_archive::{Archiver, Config, Event};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let curl_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_curl_path().ok_or("cannot locate the home directory")?,
    };
    let cookie = read_cookie_file(&curl_path).await?;

    let mut config = Config {
        archive: ArchiveConfig {
            workers: 4,
            on_item_error: ItemErrorPolicy::Skip,
            ..Default::default()
        },
        ..Default::default()
    };
    config.api.cookie = Some(cookie);

    let archiver = Archiver::from_config(config)?;
    println!("Archiving into coubs/{}", archiver.query_id());

    let mut events = archiver.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::PageArchived {
                    page,
                    total_pages,
                    items,
                } => {
                    println!("✓ Page {page}/{total_pages} ({items} coubs queued)");
                }
                Event::ItemFailed {
                    permalink, error, ..
                } => {
                    println!("✗ {permalink}: {error}");
                }
                _ => {}
            }
        }
    });

    let summary = archiver.run().await?;

    println!(
        "Done: {}/{} coubs over {} pages",
        summary.progress.completed, summary.progress.discovered, summary.pages
    );
    for failure in &summary.failures {
        println!("  skipped {}: {}", failure.permalink, failure.error);
    }

    Ok(())
}
