//! Per-anchor pipeline: detail page, download pointer, streamed document.

use std::io;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::fetch::{Fetcher, RateLimiter, RetryPolicy, retry_fetch};
use crate::html::{self, HtmlDocument, HtmlError};

use super::error::ItemError;
use super::filename::{UniqueTokens, unique_document_path};
use super::resolve::resolve_pointer;
use super::types::{CrawlTarget, DownloadResult, DownloadTask, NO_POINTER_REASON, Outcome};

/// Turns one [`DownloadTask`] into exactly one [`DownloadResult`].
///
/// Cheap to clone; every field is shared. One processor is cloned into each
/// spawned crawl task.
#[derive(Debug, Clone)]
pub struct DetailPageProcessor {
    fetcher: Arc<dyn Fetcher>,
    target: Arc<CrawlTarget>,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    tokens: Arc<UniqueTokens>,
}

impl DetailPageProcessor {
    /// Creates a processor sharing the given fetcher, limiter and token source.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        target: Arc<CrawlTarget>,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
        tokens: Arc<UniqueTokens>,
    ) -> Self {
        Self {
            fetcher,
            target,
            retry_policy,
            rate_limiter,
            tokens,
        }
    }

    /// Processes one task. Never fails: errors become [`Outcome::Failed`].
    pub async fn process(&self, task: DownloadTask) -> DownloadResult {
        match self.try_process(&task).await {
            Ok(outcome) => DownloadResult { task, outcome },
            Err(error) => {
                warn!(
                    index = task.index,
                    title = %task.anchor.display_text,
                    url = %task.detail_url,
                    error = %error,
                    "anchor failed"
                );
                DownloadResult::failed(task, error)
            }
        }
    }

    #[instrument(skip_all, fields(index = task.index, url = %task.detail_url))]
    async fn try_process(&self, task: &DownloadTask) -> Result<Outcome, ItemError> {
        let fetcher = &*self.fetcher;
        let detail_url = task.detail_url.as_str();

        let body = retry_fetch(detail_url, &self.retry_policy, &self.rate_limiter, move || {
            fetcher.get_text(detail_url)
        })
        .await
        .map_err(|(error, attempts)| ItemError::fetch(error, attempts))?;

        let Some(pointer) = find_pointer(&body, &self.target.pointer_field)? else {
            debug!("detail page has no download pointer");
            return Ok(Outcome::Skipped {
                reason: NO_POINTER_REASON.to_string(),
            });
        };

        let download_url = resolve_pointer(&self.target.download_base_url, &pointer)?;
        let path = unique_document_path(
            &self.target.output_dir,
            &task.anchor.display_text,
            &self.target.extension,
            &self.tokens,
        )
        .await
        .ok_or_else(|| ItemError::OutputFile {
            dir: self.target.output_dir.clone(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free filename"),
        })?;
        debug!(download_url = %download_url, path = %path.display(), "resolved download");

        let download = download_url.as_str();
        let target_path = path.as_path();
        let bytes = retry_fetch(download, &self.retry_policy, &self.rate_limiter, move || {
            fetcher.download_to_file(download, target_path)
        })
        .await
        .map_err(|(error, attempts)| ItemError::fetch(error, attempts))?;

        info!(path = %path.display(), bytes, "saved document");
        Ok(Outcome::Success {
            path,
            bytes,
            download_url: download_url.into(),
        })
    }
}

/// Returns the non-blank `value` of the first `input` named `field`.
///
/// Kept synchronous so the parsed document never lives across an await.
fn find_pointer(body: &str, field: &str) -> Result<Option<String>, HtmlError> {
    let document = HtmlDocument::parse(body);
    let pointer = document
        .query("input[name]")?
        .iter()
        .find(|input| html::attribute(input, "name") == Some(field))
        .and_then(|input| html::attribute(input, "value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);
    Ok(pointer)
}
