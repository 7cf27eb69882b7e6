//! Output filenames for downloaded documents.
//!
//! Names are `<title>-<token>.<ext>`: the anchor text reduced to ASCII
//! alphanumerics, a token unique within the process, and the configured
//! extension.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::fetch::partial_path;

/// Longest sanitized title kept in a filename, in characters.
pub const MAX_TITLE_LEN: usize = 60;

/// Title used when nothing alphanumeric remains after sanitizing.
pub const FALLBACK_TITLE: &str = "document";

/// Tokens handed out before giving up on finding a free filename.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Reduces `title` to ASCII alphanumerics, truncated to [`MAX_TITLE_LEN`].
///
/// Idempotent: sanitizing an already sanitized title returns it unchanged.
///
/// ```
/// use scraping_by::crawl::sanitize_title;
///
/// assert_eq!(sanitize_title("Comment of Acme Corp. (2nd)"), "CommentofAcmeCorp2nd");
/// assert_eq!(sanitize_title("Ünïcödé"), "ncd");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_TITLE_LEN)
        .collect()
}

/// Builds `<title>-<token>.<extension>` from raw anchor text.
///
/// Falls back to [`FALLBACK_TITLE`] when the sanitized title is empty.
#[must_use]
pub fn document_filename(title: &str, token: u64, extension: &str) -> String {
    let mut stem = sanitize_title(title);
    if stem.is_empty() {
        stem.push_str(FALLBACK_TITLE);
    }
    let extension: String = extension.chars().filter(char::is_ascii_alphanumeric).collect();
    if extension.is_empty() {
        format!("{stem}-{token}")
    } else {
        format!("{stem}-{token}.{extension}")
    }
}

/// Strictly increasing token source shared by all tasks of a run.
///
/// Seeded from wall-clock milliseconds so names stay distinct across runs
/// writing into the same directory.
#[derive(Debug)]
pub struct UniqueTokens {
    next: AtomicU64,
}

impl Default for UniqueTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueTokens {
    /// Seeds the counter from the current time in milliseconds.
    #[must_use]
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX / 2))
            .unwrap_or(0);
        Self::starting_at(millis)
    }

    /// Starts the counter at `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns a token never returned before by this source.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Picks a path in `dir` for `title` that is not taken by an existing
/// document or an in-progress download.
///
/// Returns `None` if every token tried was taken.
pub async fn unique_document_path(
    dir: &Path,
    title: &str,
    extension: &str,
    tokens: &UniqueTokens,
) -> Option<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(document_filename(title, tokens.next(), extension));
        if is_free(&path).await && is_free(&partial_path(&path)).await {
            return Some(path);
        }
    }
    None
}

/// A path whose existence cannot be checked counts as taken.
async fn is_free(path: &Path) -> bool {
    matches!(tokio::fs::try_exists(path).await, Ok(false))
}
