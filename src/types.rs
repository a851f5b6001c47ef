//! Core types for coub-archive

use serde::{Deserialize, Serialize};

/// Numeric identifier of a coub, as assigned by coub.com
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoubId(pub u64);

impl CoubId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CoubId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CoubId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single link alternative. An empty URL means the quality is not offered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Resource URL (may be empty)
    #[serde(default)]
    pub url: String,
}

impl Link {
    /// Create a link for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Whether this quality is actually offered
    pub fn is_offered(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Ranked link alternatives for one media role, best quality first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    /// Highest quality
    #[serde(default)]
    pub higher: Link,
    /// High quality
    #[serde(default)]
    pub high: Link,
    /// Medium quality
    #[serde(default)]
    pub med: Link,
}

impl MediaVariant {
    /// Links in priority order
    pub fn ranked(&self) -> [&Link; 3] {
        [&self.higher, &self.high, &self.med]
    }
}

/// HTML5 media versions of a coub. Audio is absent for silent coubs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Html5Versions {
    /// Video variants (always present)
    #[serde(default)]
    pub video: MediaVariant,
    /// Audio variants
    #[serde(default)]
    pub audio: Option<MediaVariant>,
}

/// All file versions of a coub (only the HTML5 set is archived)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersions {
    /// HTML5 media versions
    #[serde(default)]
    pub html5: Html5Versions,
}

/// One archived unit of content, decoded from a timeline page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coub {
    /// Stable numeric identifier
    pub id: CoubId,
    /// Human-readable permalink, used as the storage key
    pub permalink: String,
    /// Media links
    #[serde(default)]
    pub file_versions: FileVersions,
}

/// Raw timeline page envelope as returned by the listing API
#[derive(Clone, Debug, Deserialize)]
pub struct TimelinePage {
    /// 1-based page number
    pub page: u32,
    /// Total page count, as reported with this page
    pub total_pages: u32,
    /// Item records, kept raw so the full record can be archived
    #[serde(default)]
    pub coubs: Vec<serde_json::Value>,
}

/// A coub together with the raw record it was decoded from
#[derive(Clone, Debug)]
pub struct PageEntry {
    /// Decoded coub
    pub coub: Coub,
    /// Raw record as served by the API
    pub raw: serde_json::Value,
}

/// A fetched and decoded timeline page
#[derive(Clone, Debug)]
pub struct FetchedPage {
    /// Request path and query that produced this page
    pub request: String,
    /// 1-based page number
    pub number: u32,
    /// Total page count reported with this page
    pub total_pages: u32,
    /// Page items in listing order
    pub entries: Vec<PageEntry>,
}

/// Media role of a downloaded resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaRole {
    /// Video stream
    Video,
    /// Audio track
    Audio,
}

impl MediaRole {
    /// Artifact name stem in the archive (`best-video`, `best-audio`)
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            MediaRole::Video => "best-video",
            MediaRole::Audio => "best-audio",
        }
    }
}

impl std::fmt::Display for MediaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaRole::Video => write!(f, "video"),
            MediaRole::Audio => write!(f, "audio"),
        }
    }
}

/// Bytes of one downloaded resource and the URL they came from
#[derive(Clone, Debug)]
pub struct MediaPayload {
    /// URL that was requested
    pub url: String,
    /// Response body
    pub bytes: Vec<u8>,
}

/// Downloaded media of one coub, ready to be persisted
#[derive(Clone, Debug)]
pub struct DownloadedMedia {
    /// Permalink of the coub
    pub permalink: String,
    /// Best available video
    pub video: MediaPayload,
    /// Best available audio, if the coub has an audio track
    pub audio: Option<MediaPayload>,
}

/// Unit of work on the task queue
#[derive(Clone, Debug)]
pub struct ItemTask {
    /// The coub to download
    pub coub: Coub,
    /// Page the coub was listed on (part of its persistence path)
    pub page: u32,
}

/// Progress counters of an archive run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounters {
    /// Items seen by the paginator so far
    pub discovered: u64,
    /// Items whose media has been downloaded and persisted
    pub completed: u64,
}

/// A single progress notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Items completed since the previous notification
    pub delta_completed: u64,
    /// Items discovered since the previous notification
    pub delta_discovered: u64,
    /// Completed total after this update
    pub completed: u64,
    /// Discovered total after this update
    pub discovered: u64,
}

/// Event emitted during an archive run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Page metadata persisted and its items queued
    PageArchived {
        /// 1-based page number
        page: u32,
        /// Total pages reported with this page
        total_pages: u32,
        /// Number of items on the page
        items: usize,
    },

    /// A coub's media has been downloaded and persisted
    ItemArchived {
        /// Permalink of the coub
        permalink: String,
        /// Page the coub was listed on
        page: u32,
    },

    /// A coub could not be archived
    ItemFailed {
        /// Permalink of the coub
        permalink: String,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// Progress counters changed
    Progress {
        /// Completed total
        completed: u64,
        /// Discovered total
        discovered: u64,
    },
}

/// A coub that was skipped because it failed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFailure {
    /// Permalink of the coub
    pub permalink: String,
    /// Error message
    pub error: String,
}

/// Outcome of a finished archive run
#[derive(Clone, Debug)]
pub struct ArchiveSummary {
    /// Query id naming the archive directory
    pub query_id: String,
    /// Number of pages fetched
    pub pages: u32,
    /// Final counters
    pub progress: ProgressCounters,
    /// Items skipped under the skip policy
    pub failures: Vec<ItemFailure>,
}

/// Timeline to archive
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Timeline {
    /// Coubs liked by the authenticated user
    #[default]
    Likes,
    /// The authenticated user's feed
    Feed,
    /// A channel, by the name in its URL
    Channel(String),
    /// A tag, without the leading `#`
    Tag(String),
    /// Hot section
    Hot,
    /// Coub of the day
    CoubOfTheDay,
}

impl Timeline {
    /// API path relative to the API base URL
    pub fn api_path(&self) -> String {
        match self {
            Timeline::Likes => "/timeline/likes".to_string(),
            Timeline::Feed => "/timeline".to_string(),
            Timeline::Channel(name) => {
                format!("/timeline/channel/{}", urlencoding::encode(name))
            }
            Timeline::Tag(name) => format!("/timeline/tag/{}", urlencoding::encode(name)),
            Timeline::Hot => "/timeline/hot".to_string(),
            Timeline::CoubOfTheDay => "/timeline/explore/coub_of_the_day".to_string(),
        }
    }

    /// Whether the endpoint only serves authenticated users
    pub fn requires_auth(&self) -> bool {
        matches!(self, Timeline::Likes | Timeline::Feed)
    }

    /// Orderings accepted by the endpoint
    pub fn order_options(&self) -> &'static [&'static str] {
        match self {
            Timeline::Channel(_) => &["likes_count", "views_count", "newest_popular"],
            Timeline::Tag(_) | Timeline::Hot => {
                &["likes_count", "views_count", "newest_popular", "oldest"]
            }
            Timeline::Likes | Timeline::Feed | Timeline::CoubOfTheDay => &[],
        }
    }
}
