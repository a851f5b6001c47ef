//! Stage-then-commit persistence of page metadata and media
//!
//! Every write goes to a fresh [`Staging`] directory first. Only a complete
//! staging directory is handed to [`Persister::commit`], which makes it
//! visible at its final path in one step. A reader of the archive either
//! sees no directory at the final path or a complete one.
//!
//! Split into focused submodules:
//! - [`staging`] - Temporary staging directories
//! - [`fs`] - Local filesystem back-end (atomic rename)
//! - [`ipfs`] - IPFS mutable file system back-end (add, then link)
//!
//! Archive layout, relative to the store root:
//!
//! ```text
//! <query-id>/pages/<page:03>/request.txt
//! <query-id>/pages/<page:03>/coubs/<permalink>/meta.txt
//! <query-id>/pages/<page:03>/coubs/<permalink>/media/best-video.mp4
//! <query-id>/pages/<page:03>/coubs/<permalink>/media/best-video-request.txt
//! <query-id>/pages/<page:03>/coubs/<permalink>/media/best-audio.mp3
//! <query-id>/pages/<page:03>/coubs/<permalink>/media/best-audio-request.txt
//! ```

mod fs;
mod ipfs;
mod staging;

pub use fs::FilesystemPersister;
pub use ipfs::IpfsPersister;
pub use staging::Staging;

use crate::config::{ArchiveConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::types::{DownloadedMedia, FetchedPage, MediaPayload, MediaRole};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A persistence back-end
#[async_trait]
pub trait Persister: Send + Sync {
    /// Directory in which staging areas are created
    fn staging_root(&self) -> &Path;

    /// Make a complete staging directory visible at `target`
    ///
    /// `target` is relative to the store root. On error nothing is visible
    /// at `target`.
    async fn commit(&self, staging: Staging, target: &Path) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Build the persister selected by `store`
pub fn from_config(store: &StoreConfig, archive: &ArchiveConfig) -> Result<Arc<dyn Persister>> {
    Ok(match store {
        StoreConfig::Filesystem => Arc::new(FilesystemPersister::new(
            archive.root_dir.clone(),
            archive.temp_dir.clone(),
        )),
        StoreConfig::Ipfs { api_url } => Arc::new(IpfsPersister::new(
            reqwest::Client::new(),
            api_url.clone(),
            archive.temp_dir.clone(),
        )),
    })
}

/// Relative directory holding a page's metadata
pub fn page_dir(query_id: &str, page: u32) -> PathBuf {
    PathBuf::from(query_id)
        .join("pages")
        .join(format!("{page:03}"))
}

/// Relative directory holding a coub's media
pub fn media_dir(query_id: &str, page: u32, permalink: &str) -> PathBuf {
    page_dir(query_id, page)
        .join("coubs")
        .join(permalink)
        .join("media")
}

/// Persist the metadata of one page: the request and every raw item record
pub async fn persist_page_metadata(
    persister: &dyn Persister,
    query_id: &str,
    page: &FetchedPage,
) -> Result<PathBuf> {
    let target = page_dir(query_id, page.number);

    let staging = Staging::create(persister.staging_root())
        .await
        .map_err(|e| Error::persist(&target, e))?;

    staging
        .write("request.txt", page.request.as_bytes())
        .await
        .map_err(|e| Error::persist(&target, e))?;

    for entry in &page.entries {
        let permalink = checked_component(&entry.coub.permalink, &target)?;
        let meta = serde_json::to_vec(&entry.raw)?;
        staging
            .write(Path::new("coubs").join(permalink).join("meta.txt"), &meta)
            .await
            .map_err(|e| Error::persist(&target, e))?;
    }

    persister.commit(staging, &target).await?;
    tracing::debug!(
        store = persister.name(),
        target = %target.display(),
        "Page metadata persisted"
    );
    Ok(target)
}

/// Persist the downloaded media of one coub
pub async fn persist_media(
    persister: &dyn Persister,
    query_id: &str,
    page: u32,
    media: &DownloadedMedia,
) -> Result<PathBuf> {
    let permalink = checked_component(&media.permalink, &page_dir(query_id, page))?;
    let target = media_dir(query_id, page, permalink);

    let staging = Staging::create(persister.staging_root())
        .await
        .map_err(|e| Error::persist(&target, e))?;

    stage_payload(&staging, MediaRole::Video, &media.video)
        .await
        .map_err(|e| Error::persist(&target, e))?;
    if let Some(audio) = &media.audio {
        stage_payload(&staging, MediaRole::Audio, audio)
            .await
            .map_err(|e| Error::persist(&target, e))?;
    }

    persister.commit(staging, &target).await?;
    tracing::debug!(
        store = persister.name(),
        target = %target.display(),
        "Media persisted"
    );
    Ok(target)
}

async fn stage_payload(
    staging: &Staging,
    role: MediaRole,
    payload: &MediaPayload,
) -> std::io::Result<()> {
    let stem = role.artifact_stem();
    let extension = url_extension(&payload.url);
    staging
        .write(format!("{stem}{extension}"), &payload.bytes)
        .await?;
    staging
        .write(format!("{stem}-request.txt"), payload.url.as_bytes())
        .await
}

/// File extension of the URL path, with its leading dot, or an empty string
fn url_extension(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{ext}"))
        })
        .unwrap_or_default()
}

/// Check that `permalink` can name a coub directory on `page`
///
/// Fails with [`Error::PersistFailed`] for anything but a single plain path
/// component.
pub fn check_permalink(query_id: &str, page: u32, permalink: &str) -> Result<()> {
    checked_component(permalink, &page_dir(query_id, page)).map(|_| ())
}

/// Reject permalinks that are not a single plain path component
fn checked_component<'a>(name: &'a str, target: &Path) -> Result<&'a str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(Error::persist(
            target,
            format!("permalink {name:?} is not a valid directory name"),
        )),
    }
}
