//! Values passed between the crawl stages.

use std::path::{Path, PathBuf};

use url::Url;

use super::error::ItemError;

/// Default name of the hidden form field carrying the download pointer.
pub const DEFAULT_POINTER_FIELD: &str = "src";

/// Default extension for downloaded documents.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Reason recorded for detail pages without a download pointer.
pub const NO_POINTER_REASON: &str = "no download pointer";

/// Where to crawl and where to put the results. Immutable once built.
///
/// ```
/// use scraping_by::CrawlTarget;
/// use url::Url;
///
/// let toc = Url::parse("http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=1").unwrap();
/// let target = CrawlTarget::new(toc, "document.cfm", "downloads");
///
/// assert_eq!(target.base_url.as_str(), "http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=1");
/// assert_eq!(target.download_base_url.as_str(), "http://dms.example.gov/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Table-of-contents page listing the detail pages.
    pub toc_url: Url,
    /// Substring an anchor's `href` must contain to be crawled.
    pub link_filter: String,
    /// Base for resolving relative detail-page links.
    pub base_url: Url,
    /// Base for resolving download pointers.
    pub download_base_url: Url,
    /// Directory receiving downloaded documents.
    pub output_dir: PathBuf,
    /// `name` of the hidden input holding the download pointer.
    pub pointer_field: String,
    /// Extension given to downloaded files, without the dot.
    pub extension: String,
}

impl CrawlTarget {
    /// Builds a target whose links resolve against the TOC page and whose
    /// download pointers resolve against the TOC page's origin.
    #[must_use]
    pub fn new(toc_url: Url, link_filter: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let download_base_url = origin_of(&toc_url);
        Self {
            base_url: toc_url.clone(),
            toc_url,
            link_filter: link_filter.into(),
            download_base_url,
            output_dir: output_dir.into(),
            pointer_field: DEFAULT_POINTER_FIELD.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Overrides the base for resolving detail-page links.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Overrides the base for resolving download pointers.
    #[must_use]
    pub fn with_download_base_url(mut self, download_base_url: Url) -> Self {
        self.download_base_url = download_base_url;
        self
    }

    /// Overrides the hidden field name holding the download pointer.
    #[must_use]
    pub fn with_pointer_field(mut self, pointer_field: impl Into<String>) -> Self {
        self.pointer_field = pointer_field.into();
        self
    }

    /// Overrides the extension of downloaded files.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }
}

/// Root URL (`scheme://host[:port]/`) of `url`.
pub(crate) fn origin_of(url: &Url) -> Url {
    url.join("/").unwrap_or_else(|_| url.clone())
}

/// A matching link copied out of the TOC document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute value.
    pub href: String,
    /// Text content of the link, whitespace collapsed.
    pub display_text: String,
}

/// One unit of crawl work: an anchor and its resolved detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Position of the anchor in the TOC, in document order.
    pub index: usize,
    /// The anchor this task was created from.
    pub anchor: Anchor,
    /// Absolute detail page URL, or the raw href when it could not be resolved.
    pub detail_url: String,
}

/// How a single task ended.
#[derive(Debug)]
pub enum Outcome {
    /// The document was written to `path`.
    Success {
        /// Final location of the document.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
        /// Absolute URL the document was downloaded from.
        download_url: String,
    },
    /// Nothing to download; not an error.
    Skipped {
        /// Why the task was skipped.
        reason: String,
    },
    /// The task failed; other tasks are unaffected.
    Failed {
        /// What went wrong.
        error: ItemError,
    },
}

/// The result of processing one [`DownloadTask`].
#[derive(Debug)]
pub struct DownloadResult {
    /// The task this result belongs to.
    pub task: DownloadTask,
    /// How it ended.
    pub outcome: Outcome,
}

impl DownloadResult {
    /// A failed result for `task`.
    #[must_use]
    pub fn failed(task: DownloadTask, error: ItemError) -> Self {
        Self {
            task,
            outcome: Outcome::Failed { error },
        }
    }

    /// A skipped result for `task`.
    #[must_use]
    pub fn skipped(task: DownloadTask, reason: impl Into<String>) -> Self {
        Self {
            task,
            outcome: Outcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// Path of the downloaded document, for successful results.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Success { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether this result is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Whether this result is a skip.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped { .. })
    }

    /// Whether this result is a failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn toc() -> Url {
        Url::parse("http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=55219").unwrap()
    }

    #[test]
    fn test_target_defaults() {
        let target = CrawlTarget::new(toc(), "document.cfm", "out");
        assert_eq!(target.base_url, toc());
        assert_eq!(target.download_base_url.as_str(), "http://dms.example.gov/");
        assert_eq!(target.pointer_field, "src");
        assert_eq!(target.extension, "pdf");
        assert_eq!(target.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_target_overrides() {
        let base = Url::parse("http://dms.example.gov/pubdms/search/").unwrap();
        let cdn = Url::parse("https://cdn.example.gov:8443/files/").unwrap();
        let target = CrawlTarget::new(toc(), "document.cfm", "out")
            .with_base_url(base.clone())
            .with_download_base_url(cdn.clone())
            .with_pointer_field("file")
            .with_extension(".zip");
        assert_eq!(target.base_url, base);
        assert_eq!(target.download_base_url, cdn);
        assert_eq!(target.pointer_field, "file");
        assert_eq!(target.extension, "zip");
    }

    #[test]
    fn test_origin_keeps_port() {
        let url = Url::parse("http://127.0.0.1:4000/a/b?c=d").unwrap();
        assert_eq!(origin_of(&url).as_str(), "http://127.0.0.1:4000/");
    }

    #[test]
    fn test_result_predicates() {
        let task = DownloadTask {
            index: 0,
            anchor: Anchor {
                href: "document.cfm?id=1".to_string(),
                display_text: "Report".to_string(),
            },
            detail_url: "http://dms.example.gov/document.cfm?id=1".to_string(),
        };
        let skipped = DownloadResult::skipped(task.clone(), NO_POINTER_REASON);
        assert!(skipped.is_skipped());
        assert!(!skipped.is_failed());
        assert!(skipped.path().is_none());

        let failed = DownloadResult::failed(task, ItemError::Cancelled);
        assert!(failed.is_failed());
        assert!(!failed.is_success());
    }
}
