//! Error types for a crawl run.
//!
//! [`CrawlError`] is fatal: the run stops before any anchor is processed.
//! [`ItemError`] belongs to one anchor and ends up in that anchor's
//! [`Outcome::Failed`](super::Outcome::Failed); siblings carry on.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::html::HtmlError;

/// Fatal setup errors that abort the whole run.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The TOC page could not be fetched, so there is nothing to crawl.
    #[error("failed to fetch TOC page {url} after {attempts} attempt(s): {source}")]
    TocFetch {
        /// TOC URL.
        url: String,
        /// Last fetch error.
        #[source]
        source: FetchError,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The TOC document could not be queried.
    #[error(transparent)]
    Selector(#[from] HtmlError),

    /// Concurrency outside the accepted range.
    #[error("concurrency must be between 1 and {max}, got {value}")]
    InvalidConcurrency {
        /// Value given.
        value: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Cancelled before the TOC page was fetched.
    #[error("cancelled before the TOC page was fetched")]
    Cancelled,

    /// The run timeout expired before the TOC page was fetched.
    #[error("run timed out after {timeout:?} before the TOC page was fetched")]
    TimedOut {
        /// Configured run timeout.
        timeout: std::time::Duration,
    },
}

impl CrawlError {
    /// Creates an output directory error.
    pub fn output_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputDir {
            path: path.into(),
            source,
        }
    }

    /// Creates a TOC fetch error.
    pub fn toc_fetch(url: impl Into<String>, source: FetchError, attempts: u32) -> Self {
        Self::TocFetch {
            url: url.into(),
            source,
            attempts,
        }
    }
}

/// Why a single anchor failed.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Detail page or document request failed.
    #[error("{source} (after {attempts} attempt(s))")]
    Fetch {
        /// Last fetch error.
        #[source]
        source: FetchError,
        /// Attempts made.
        attempts: u32,
    },

    /// The anchor's href does not resolve to an http(s) URL.
    #[error("invalid link {href:?}: {reason}")]
    InvalidLink {
        /// Raw href.
        href: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The download pointer could not be decoded or resolved.
    #[error("invalid download pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// Raw pointer value.
        pointer: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The detail page could not be queried.
    #[error(transparent)]
    Html(#[from] HtmlError),

    /// No free output filename could be chosen.
    #[error("cannot choose output file in {dir}: {source}")]
    OutputFile {
        /// Output directory.
        dir: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled or timed out before this anchor finished.
    #[error("cancelled")]
    Cancelled,

    /// The task processing this anchor panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl ItemError {
    /// Creates a fetch error recording how many attempts were made.
    pub fn fetch(source: FetchError, attempts: u32) -> Self {
        Self::Fetch { source, attempts }
    }

    /// Creates an invalid link error.
    pub fn invalid_link(href: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLink {
            href: href.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid pointer error.
    pub fn invalid_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable label, used in JSON output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { source, .. } => match source {
                FetchError::Network { .. } => "network",
                FetchError::Timeout { .. } => "timeout",
                FetchError::HttpStatus { .. } => "http_status",
                FetchError::Io { .. } => "io",
                FetchError::InvalidUrl { .. } => "invalid_url",
            },
            Self::InvalidLink { .. } => "invalid_link",
            Self::InvalidPointer { .. } => "invalid_pointer",
            Self::Html(_) => "html",
            Self::OutputFile { .. } => "output_file",
            Self::Cancelled => "cancelled",
            Self::Panicked { .. } => "panicked",
        }
    }
}
