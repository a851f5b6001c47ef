//! Error types for coub-archive
//!
//! Errors fall into two groups:
//! - **Run-level** errors (missing credentials, pagination failures, bad
//!   configuration) stop the whole archive run.
//! - **Item-level** errors (no usable link, media fetch failure, persist
//!   failure) concern a single coub and are wrapped in [`Error::Item`] with
//!   the coub's permalink. Whether they abort the run is decided by
//!   [`ItemErrorPolicy`](crate::config::ItemErrorPolicy).

use crate::types::MediaRole;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for coub-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for coub-archive
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive.workers")
        key: Option<String>,
    },

    /// No usable session cookie for an endpoint that requires one
    #[error("no usable credentials: {0}")]
    AuthMissing(String),

    /// A timeline page could not be fetched
    #[error("failed to fetch timeline page {page}: {reason}")]
    PageFetchFailed {
        /// The 1-based page number being requested
        page: u32,
        /// Transport error or unexpected status
        reason: String,
    },

    /// A timeline page was fetched but its body is not a valid page envelope
    #[error("failed to decode timeline page {page}: {source}")]
    PageDecodeFailed {
        /// The 1-based page number being decoded
        page: u32,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// No link at any quality for a required media variant
    #[error("no {role} link offered at any quality")]
    ResourceNotFound {
        /// Which media variant had no usable link
        role: MediaRole,
    },

    /// A media resource could not be fetched, even after retrying
    #[error("failed to fetch {url}: {cause}")]
    FetchFailed {
        /// The resource URL
        url: String,
        /// Description of the last failure
        cause: String,
    },

    /// Writing a staging area or committing it to its final location failed
    #[error("failed to persist {target}: {reason}")]
    PersistFailed {
        /// The final target path inside the archive
        target: PathBuf,
        /// The reason persisting failed
        reason: String,
    },

    /// An item-level failure, tagged with the coub it happened on
    #[error("while processing coub {permalink}: {source}")]
    Item {
        /// Permalink of the coub being processed
        permalink: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// The run was cancelled before this work could finish
    #[error("archive run cancelled")]
    Cancelled,

    /// A pipeline task panicked or was aborted
    #[error("pipeline task failed: {0}")]
    TaskFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an item-level failure with the permalink of the coub it concerns
    pub fn for_item(permalink: impl Into<String>, source: Error) -> Self {
        Error::Item {
            permalink: permalink.into(),
            source: Box::new(source),
        }
    }

    /// Build a [`Error::PersistFailed`] from any displayable cause
    pub fn persist(target: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::PersistFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error stops the whole run regardless of the item error policy
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::AuthMissing(_)
                | Error::PageFetchFailed { .. }
                | Error::PageDecodeFailed { .. }
        )
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::AuthMissing(_) => "auth_missing",
            Error::PageFetchFailed { .. } => "page_fetch_failed",
            Error::PageDecodeFailed { .. } => "page_decode_failed",
            Error::ResourceNotFound { .. } => "resource_not_found",
            Error::FetchFailed { .. } => "fetch_failed",
            Error::PersistFailed { .. } => "persist_failed",
            Error::Item { source, .. } => source.error_code(),
            Error::Cancelled => "cancelled",
            Error::TaskFailed(_) => "task_failed",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
