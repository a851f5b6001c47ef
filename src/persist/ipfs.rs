//! IPFS back-end
//!
//! A staging directory is added to the node as an immutable, pinned object
//! and then linked into the node's mutable file system (MFS) with
//! `files/cp`. The link is the commit: until it exists the target path is
//! absent. The pin is released once the object is linked, since MFS keeps
//! linked content alive on its own.
//!
//! `files/mkdir` is not safe to run concurrently for the same path, so
//! parent creation is serialized behind a mutex, and prefixes known to
//! exist are remembered to avoid repeating RPC calls.

use super::{Persister, Staging};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;

/// MFS directory all archives are linked under
const MFS_ROOT: &str = "/coubs";

/// Persists into an IPFS node's mutable file system through its RPC API
pub struct IpfsPersister {
    client: reqwest::Client,
    api_url: String,
    temp_root: PathBuf,
    mfs_root: String,
    /// MFS directories known to exist
    ensured: Mutex<HashSet<String>>,
}

#[derive(Debug, Deserialize)]
struct AddedObject {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct FileStat {
    #[serde(rename = "Type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(rename = "Message")]
    message: String,
}

impl IpfsPersister {
    /// Create a persister talking to the RPC API at `api_url`
    pub fn new(client: reqwest::Client, api_url: String, temp_root: PathBuf) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            temp_root,
            mfs_root: MFS_ROOT.to_string(),
            ensured: Mutex::new(HashSet::new()),
        }
    }

    /// Link archives under `mfs_root` instead of `/coubs`
    pub fn with_mfs_root(mut self, mfs_root: impl Into<String>) -> Self {
        self.mfs_root = mfs_root.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether the node's RPC API answers
    pub async fn is_up(&self) -> bool {
        match self.rpc("version", &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "IPFS node is not reachable");
                false
            }
        }
    }

    /// MFS path for a store-relative target
    fn mfs_path(&self, target: &Path) -> String {
        let mut path = self.mfs_root.clone();
        for component in target.components() {
            if let Component::Normal(part) = component {
                path.push('/');
                path.push_str(&part.to_string_lossy());
            }
        }
        path
    }

    /// POST an RPC command, returning the response body on success
    async fn rpc(&self, command: &str, args: &[&str]) -> std::result::Result<String, String> {
        let query: Vec<(&str, &str)> = args.iter().map(|a| ("arg", *a)).collect();
        let response = self
            .client
            .post(format!("{}/api/v0/{}", self.api_url, command))
            .query(&query)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        read_rpc_response(command, response).await
    }

    /// Create every missing ancestor directory of `dir`, shallowest first
    async fn ensure_dir(&self, dir: &str) -> std::result::Result<(), String> {
        let mut ensured = self.ensured.lock().await;

        let mut prefix = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            prefix.push('/');
            prefix.push_str(part);
            if ensured.contains(&prefix) {
                continue;
            }

            if let Err(mkdir_err) = self.rpc("files/mkdir", &[prefix.as_str()]).await {
                // mkdir fails when the entry already exists; only a directory will do
                let stat = self
                    .rpc("files/stat", &[prefix.as_str()])
                    .await
                    .map_err(move |_| mkdir_err)?;
                let stat: FileStat = serde_json::from_str(&stat).map_err(|e| e.to_string())?;
                if stat.kind != "directory" {
                    return Err(format!(
                        "tried to make directory {prefix}, but it is a {}",
                        stat.kind
                    ));
                }
            }
            ensured.insert(prefix.clone());
        }
        Ok(())
    }

    /// Add the staging directory to the node, returning the root object's hash
    async fn add_dir(&self, dir: &Path) -> std::result::Result<String, String> {
        let root_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| format!("staging path {} has no name", dir.display()))?;

        let form = directory_form(dir, &root_name)
            .await
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .post(format!("{}/api/v0/add", self.api_url))
            .query(&[("recursive", "true"), ("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let body = read_rpc_response("add", response).await?;

        // One JSON object per added entry; the staging directory itself is the root
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<AddedObject>(line).ok())
            .find(|obj| obj.name == root_name)
            .map(|obj| obj.hash)
            .ok_or_else(|| format!("add response did not list {root_name}"))
    }
}

#[async_trait]
impl Persister for IpfsPersister {
    fn staging_root(&self) -> &Path {
        &self.temp_root
    }

    async fn commit(&self, staging: Staging, target: &Path) -> Result<()> {
        let dest = self.mfs_path(target);
        let parent = match dest.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };

        self.ensure_dir(&parent)
            .await
            .map_err(|e| Error::persist(target, e))?;

        let cid = self
            .add_dir(staging.path())
            .await
            .map_err(|e| Error::persist(target, e))?;
        drop(staging);

        let source = format!("/ipfs/{cid}");
        let linked = self
            .rpc("files/cp", &[source.as_str(), dest.as_str()])
            .await
            .map_err(|e| Error::persist(target, e));

        if let Err(e) = self.rpc("pin/rm", &[cid.as_str()]).await {
            tracing::warn!(cid = %cid, error = %e, "Failed to unpin staged object");
        }

        linked?;
        self.ensured.lock().await.insert(dest);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ipfs"
    }
}

async fn read_rpc_response(
    command: &str,
    response: reqwest::Response,
) -> std::result::Result<String, String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;
    if status.is_success() {
        return Ok(body);
    }
    let message = serde_json::from_str::<RpcError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(format!("ipfs {command} failed ({status}): {message}"))
}

/// Build the multipart body for a recursive directory add
///
/// Directories are sent as `application/x-directory` parts before their
/// contents; every part name is the path from the added root.
async fn directory_form(dir: &Path, root_name: &str) -> std::io::Result<Form> {
    let mut form = Form::new().part("file", directory_part(root_name)?);
    let mut pending = vec![(dir.to_path_buf(), root_name.to_string())];

    while let Some((current, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry);
        }
        children.sort_by_key(|entry| entry.file_name());

        for entry in children {
            let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
            if entry.file_type().await?.is_dir() {
                form = form.part("file", directory_part(&name)?);
                pending.push((entry.path(), name));
            } else {
                let bytes = tokio::fs::read(entry.path()).await?;
                let part = Part::bytes(bytes)
                    .file_name(encode_part_name(&name))
                    .mime_str("application/octet-stream")
                    .map_err(std::io::Error::other)?;
                form = form.part("file", part);
            }
        }
    }
    Ok(form)
}

fn directory_part(name: &str) -> std::io::Result<Part> {
    Part::bytes(Vec::new())
        .file_name(encode_part_name(name))
        .mime_str("application/x-directory")
        .map_err(std::io::Error::other)
}

fn encode_part_name(name: &str) -> String {
    name.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
