//! Configuration types for coub-archive

use crate::error::{Error, Result};
use crate::types::Timeline;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Listing API configuration (endpoint, timeline, ordering, credentials)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL (default: "https://coub.com/api/v2")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Items requested per page (default: 25)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Timeline to archive (default: the user's likes)
    #[serde(default)]
    pub timeline: Timeline,

    /// Ordering key passed as `order_by` (None = API default order)
    #[serde(default)]
    pub order_by: Option<String>,

    /// Session cookie sent with every listing request
    ///
    /// Required for [`Timeline::Likes`] and [`Timeline::Feed`]. Never serialized.
    #[serde(default, skip_serializing)]
    pub cookie: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            per_page: default_per_page(),
            timeline: Timeline::default(),
            order_by: None,
            cookie: None,
        }
    }
}

impl ApiConfig {
    /// Name of the archive directory for a run started at `started_at`
    ///
    /// Format: `<%Y-%m-%dT%H_%M_%S><timeline path, '/' replaced by '_'>_<order_by>`
    pub fn query_id<Tz>(&self, started_at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}{}_{}",
            started_at.format("%Y-%m-%dT%H_%M_%S"),
            self.timeline.api_path().replace('/', "_"),
            self.order_by.as_deref().unwrap_or_default()
        )
    }
}

/// What to do when a single coub cannot be archived
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorPolicy {
    /// Stop the run and return the item's error
    #[default]
    Abort,
    /// Log the failure, report it in the summary, and keep going
    Skip,
}

/// Archive pipeline configuration (directories, concurrency, error policy)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Archive root directory (default: "coubs")
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Staging directory (default: "coubs-temporary-folder")
    ///
    /// For the filesystem store this must be on the same filesystem as
    /// `root_dir`, otherwise the final rename cannot be atomic.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Number of media download workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the task queue between the paginator and the workers (default: 64000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Item failure handling (default: abort)
    #[serde(default)]
    pub on_item_error: ItemErrorPolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            temp_dir: default_temp_dir(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            on_item_error: ItemErrorPolicy::default(),
        }
    }
}

/// Retry configuration for media fetches
///
/// A failed fetch is retried after a fixed delay. There is no back-off and no jitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 1)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay before each retry (default: 60 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay: default_retry_delay(),
        }
    }
}

/// Persistence target
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Local filesystem under [`ArchiveConfig::root_dir`]
    #[default]
    Filesystem,
    /// IPFS node mutable file system, through the node's RPC API
    Ipfs {
        /// RPC API address (default: "http://127.0.0.1:5001")
        #[serde(default = "default_ipfs_api_url")]
        api_url: String,
    },
}

/// Main configuration for an archive run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pipeline settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Media fetch retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Persistence target
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.archive.workers == 0 {
            return Err(config_error("workers must be at least 1", "archive.workers"));
        }
        if self.archive.queue_capacity == 0 {
            return Err(config_error(
                "queue capacity must be at least 1",
                "archive.queue_capacity",
            ));
        }
        if self.api.per_page == 0 {
            return Err(config_error("per_page must be at least 1", "api.per_page"));
        }
        if let Some(order) = &self.api.order_by {
            let allowed = self.api.timeline.order_options();
            if !allowed.contains(&order.as_str()) {
                return Err(config_error(
                    format!(
                        "order '{}' is not supported by {}; expected one of {:?}",
                        order,
                        self.api.timeline.api_path(),
                        allowed
                    ),
                    "api.order_by",
                ));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://coub.com/api/v2".to_string()
}

fn default_per_page() -> u32 {
    25
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("coubs")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("coubs-temporary-folder")
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64_000
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_ipfs_api_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
