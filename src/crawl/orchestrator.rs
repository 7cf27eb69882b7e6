//! Crawl orchestration: TOC page, anchor fan-out, completion barrier.
//!
//! # Concurrency Model
//!
//! - Each anchor is processed in its own Tokio task inside a [`JoinSet`]
//! - An optional semaphore caps how many tasks touch the network at once
//! - The `JoinSet` drain is the completion barrier; task ids map panics and
//!   aborts back to their anchors so every anchor yields one result
//! - Cancellation and the run timeout abort every in-flight task; dropped
//!   downloads clean up their `.part` files

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::fetch::{Fetcher, RateLimiter, RetryPolicy, retry_fetch};
use crate::html::{HtmlDocument, HtmlError};

use super::error::{CrawlError, ItemError};
use super::filename::UniqueTokens;
use super::links::extract_anchors;
use super::processor::DetailPageProcessor;
use super::report::{CrawlReport, StopReason};
use super::resolve::resolve;
use super::types::{Anchor, CrawlTarget, DownloadResult, DownloadTask};

/// Default number of anchors processed at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Largest accepted concurrency cap.
pub const MAX_CONCURRENCY: usize = 100;

/// Tunables for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Cap on concurrently processed anchors; `None` means unbounded.
    pub concurrency: Option<usize>,
    /// Whole-run time limit; `None` means no limit.
    pub timeout: Option<Duration>,
    /// Retry policy for every request.
    pub retry_policy: RetryPolicy,
    /// Minimum delay between requests to one host; zero disables it.
    pub rate_limit: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            concurrency: Some(DEFAULT_CONCURRENCY),
            timeout: None,
            retry_policy: RetryPolicy::default(),
            rate_limit: Duration::ZERO,
        }
    }
}

/// Drives a whole crawl for one [`CrawlTarget`].
///
/// ```no_run
/// use std::sync::Arc;
/// use scraping_by::{CrawlOptions, CrawlOrchestrator, CrawlTarget};
/// use scraping_by::fetch::HttpClient;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let toc = Url::parse("http://dms.example.gov/pubdms/search/hitlist.cfm?docketID=55219")?;
/// let target = CrawlTarget::new(toc, "document.cfm", "downloads");
/// let crawler = CrawlOrchestrator::new(Arc::new(HttpClient::new()), target, CrawlOptions::default())?;
///
/// let report = crawler.run().await?;
/// println!("{:?}", report.counts());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    target: Arc<CrawlTarget>,
    options: CrawlOptions,
    semaphore: Option<Arc<Semaphore>>,
    rate_limiter: Arc<RateLimiter>,
    tokens: Arc<UniqueTokens>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConcurrency`] if the cap is outside 1..=100.
    #[instrument(level = "debug", skip_all, fields(toc_url = %target.toc_url))]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        target: CrawlTarget,
        options: CrawlOptions,
    ) -> Result<Self, CrawlError> {
        if let Some(value) = options
            .concurrency
            .filter(|n| !(1..=MAX_CONCURRENCY).contains(n))
        {
            return Err(CrawlError::InvalidConcurrency {
                value,
                max: MAX_CONCURRENCY,
            });
        }

        debug!(
            concurrency = ?options.concurrency,
            timeout = ?options.timeout,
            max_attempts = options.retry_policy.max_attempts(),
            rate_limit_ms = options.rate_limit.as_millis(),
            "creating crawl orchestrator"
        );

        Ok(Self {
            fetcher,
            target: Arc::new(target),
            semaphore: options.concurrency.map(|n| Arc::new(Semaphore::new(n))),
            rate_limiter: Arc::new(RateLimiter::new(options.rate_limit)),
            tokens: Arc::new(UniqueTokens::new()),
            options,
        })
    }

    /// Replaces the filename token source.
    #[must_use]
    pub fn with_tokens(mut self, tokens: UniqueTokens) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    /// The target this orchestrator crawls.
    #[must_use]
    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    /// Runs the crawl to completion.
    ///
    /// # Errors
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Runs the crawl until it completes, `cancel` fires, or the timeout expires.
    ///
    /// Per-anchor problems never surface here; they are recorded in the
    /// report. Once the TOC page has been fetched the report always holds
    /// exactly one result per matched anchor.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the output directory cannot be created, the
    /// TOC page cannot be fetched, or the run is stopped before the TOC page
    /// arrives.
    #[instrument(skip_all, fields(toc_url = %self.target.toc_url))]
    pub async fn run_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        // A timeout too large to represent means no deadline.
        let deadline = self
            .options
            .timeout
            .and_then(|timeout| started.checked_add(timeout));

        ensure_output_dir(&self.target.output_dir).await?;
        let toc_body = self.fetch_toc(&cancel, deadline).await?;

        let anchors = anchors_in(&toc_body, &self.target.link_filter)?;
        let found = anchors.len();
        if found == 0 {
            warn!(
                filter = %self.target.link_filter,
                "no anchors matched the link filter"
            );
        } else {
            info!(found, filter = %self.target.link_filter, "extracted anchors");
        }

        let (tasks, mut results) = self.build_tasks(anchors);
        let stopped = self.dispatch(tasks, &mut results, &cancel, deadline).await;
        results.sort_by_key(|r| r.task.index);

        let report = CrawlReport {
            toc_url: self.target.toc_url.to_string(),
            found,
            results,
            elapsed: started.elapsed(),
            stopped,
        };
        debug_assert_eq!(report.results.len(), found);

        let counts = report.counts();
        info!(
            found = counts.found,
            success = counts.success,
            skipped = counts.skipped,
            failed = counts.failed,
            stopped = stopped.map(StopReason::as_str),
            elapsed_ms = report.elapsed.as_millis(),
            "crawl finished"
        );
        Ok(report)
    }

    async fn fetch_toc(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<String, CrawlError> {
        let fetcher = &*self.fetcher;
        let url = self.target.toc_url.as_str();
        let fetch = retry_fetch(
            url,
            &self.options.retry_policy,
            &self.rate_limiter,
            move || fetcher.get_text(url),
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CrawlError::Cancelled),
            () = sleep_until(deadline) => Err(CrawlError::TimedOut {
                timeout: self.options.timeout.unwrap_or_default(),
            }),
            result = fetch => result.map_err(|(source, attempts)| {
                error!(url, error = %source, attempts, "TOC fetch failed");
                CrawlError::toc_fetch(url, source, attempts)
            }),
        }
    }

    /// Resolves every anchor to a task. Unresolvable hrefs fail immediately.
    fn build_tasks(&self, anchors: Vec<Anchor>) -> (Vec<DownloadTask>, Vec<DownloadResult>) {
        let mut tasks = Vec::with_capacity(anchors.len());
        let mut results = Vec::with_capacity(anchors.len());

        for (index, anchor) in anchors.into_iter().enumerate() {
            match resolve(&self.target.base_url, &anchor.href) {
                Ok(url) => tasks.push(DownloadTask {
                    index,
                    detail_url: url.into(),
                    anchor,
                }),
                Err(error) => {
                    warn!(index, href = %anchor.href, error = %error, "skipping unresolvable link");
                    let task = DownloadTask {
                        index,
                        detail_url: anchor.href.clone(),
                        anchor,
                    };
                    results.push(DownloadResult::failed(task, error));
                }
            }
        }
        (tasks, results)
    }

    /// Spawns one task per anchor and waits for all of them.
    async fn dispatch(
        &self,
        tasks: Vec<DownloadTask>,
        results: &mut Vec<DownloadResult>,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Option<StopReason> {
        let processor = DetailPageProcessor::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.target),
            self.options.retry_policy.clone(),
            Arc::clone(&self.rate_limiter),
            Arc::clone(&self.tokens),
        );

        let mut set = JoinSet::new();
        let mut pending: HashMap<task::Id, DownloadTask> = HashMap::with_capacity(tasks.len());

        for task in tasks {
            let processor = processor.clone();
            let semaphore = self.semaphore.clone();
            let owned = task.clone();
            let handle = set.spawn(async move {
                // Permit is held until the task finishes
                let _permit = match semaphore {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return DownloadResult::failed(owned, ItemError::Cancelled),
                    },
                    None => None,
                };
                processor.process(owned).await
            });
            pending.insert(handle.id(), task);
        }

        debug!(task_count = pending.len(), "waiting for crawl tasks");

        let timeout = sleep_until(deadline);
        tokio::pin!(timeout);
        let mut stopped = None;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled(), if stopped.is_none() => {
                    warn!(in_flight = set.len(), "crawl cancelled, aborting in-flight tasks");
                    stopped = Some(StopReason::Cancelled);
                    set.abort_all();
                }
                joined = set.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((id, result))) => {
                        pending.remove(&id);
                        results.push(result);
                    }
                    Some(Err(join_error)) => {
                        if let Some(task) = pending.remove(&join_error.id()) {
                            results.push(DownloadResult::failed(task, item_error_from(join_error)));
                        }
                    }
                },
                () = &mut timeout, if stopped.is_none() => {
                    warn!(
                        in_flight = set.len(),
                        timeout = ?self.options.timeout,
                        "crawl timed out, aborting in-flight tasks"
                    );
                    stopped = Some(StopReason::TimedOut);
                    set.abort_all();
                }
            }
        }

        // Ids not seen again belong to tasks that never reported back.
        for (_, task) in pending.drain() {
            results.push(DownloadResult::failed(task, ItemError::Cancelled));
        }

        stopped
    }
}

/// Parses the TOC body and extracts matching anchors without holding the
/// document across an await.
fn anchors_in(body: &str, filter: &str) -> Result<Vec<Anchor>, HtmlError> {
    let document = HtmlDocument::parse(body);
    extract_anchors(&document, filter)
}

async fn ensure_output_dir(path: &Path) -> Result<(), CrawlError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| CrawlError::output_dir(path, e))?;
    debug!(path = %path.display(), "output directory ready");
    Ok(())
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn item_error_from(join_error: JoinError) -> ItemError {
    if join_error.is_cancelled() {
        return ItemError::Cancelled;
    }
    let payload = join_error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(%message, "crawl task panicked");
    ItemError::Panicked { message }
}
