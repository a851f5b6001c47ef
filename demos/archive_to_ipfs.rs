//! Archive a public timeline into a local IPFS node
//!
//! Needs a running IPFS node with its RPC API on the default address
//! (`ipfs daemon`). Archives are linked under `/coubs` in the node's
//! mutable file system.
//!
//! ```bash
//! cargo run --example archive_to_ipfs -- cats
//! ```

use coub_archive::{
    Archiver, BroadcastSink, Config, Event, HttpResourceFetcher, IpfsPersister, Timeline,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tag = std::env::args().nth(1).unwrap_or_else(|| "cats".to_string());

    let mut config = Config::default();
    config.api.timeline = Timeline::Tag(tag);
    config.api.order_by = Some("newest_popular".to_string());

    let persister = Arc::new(IpfsPersister::new(
        reqwest::Client::new(),
        "http://127.0.0.1:5001".to_string(),
        config.archive.temp_dir.clone(),
    ));
    if !persister.is_up().await {
        return Err("IPFS node is not reachable on 127.0.0.1:5001".into());
    }

    let (progress_tx, mut progress_rx) = tokio::sync::broadcast::channel(1024);
    let fetcher = Arc::new(HttpResourceFetcher::new(config.retry.clone())?);
    let archiver = Archiver::new(
        config,
        fetcher,
        persister,
        Arc::new(BroadcastSink::new(progress_tx)),
    )?;

    tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            if let Event::Progress {
                completed,
                discovered,
            } = event
            {
                println!("{completed}/{discovered}");
            }
        }
    });

    let summary = archiver.run().await?;
    println!(
        "Linked {} coubs under /coubs/{}",
        summary.progress.completed, summary.query_id
    );

    Ok(())
}
