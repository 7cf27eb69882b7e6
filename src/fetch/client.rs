//! HTTP client used for TOC pages, detail pages, and document downloads.
//!
//! [`Fetcher`] is the narrow capability the crawler depends on: buffered GET
//! for HTML, streamed GET for binary documents. [`HttpClient`] is the
//! `reqwest` implementation; tests substitute their own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use reqwest::redirect::Policy;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, MAX_REDIRECTS, READ_TIMEOUT_SECS};
use super::error::FetchError;
use crate::user_agent;

/// Suffix of in-progress download files.
pub const PARTIAL_SUFFIX: &str = ".part";

/// HTTP GET capability used by the crawler.
///
/// Implementations must tolerate concurrent use from many tasks.
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Fetches `url`, following redirects, and returns the whole body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, timeout, or a non-2xx status.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Streams the body of `url` into a new file at `path`, returning bytes written.
    ///
    /// The file only appears at `path` once the body has been fully written;
    /// on error or cancellation nothing is left behind.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, a non-2xx status, or a
    /// disk write failure.
    async fn download_to_file(&self, url: &str, path: &Path) -> Result<u64, FetchError>;
}

/// `reqwest`-backed [`Fetcher`].
///
/// Create once and share: clones reuse the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default timeouts (30s connect, 5min total).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with explicit timeout values in seconds.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        debug!(
            connect_timeout_secs,
            read_timeout_secs, "built HTTP client"
        );
        Ok(Self { client })
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(FetchError::http_status_with_retry_after(
                url,
                response.status().as_u16(),
                retry_after,
            ));
        }

        if response.url().as_str() != url {
            debug!(final_url = %response.url(), "followed redirect");
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send_get(url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(bytes = body.len(), "fetched page");
        Ok(body)
    }

    #[instrument(skip(self), fields(url = %url, path = %path.display()))]
    async fn download_to_file(&self, url: &str, path: &Path) -> Result<u64, FetchError> {
        let response = self.send_get(url).await?;

        let partial = PartialFile::new(path);
        let file = File::create(partial.path())
            .await
            .map_err(|e| FetchError::io(partial.path(), e))?;

        let bytes_written = stream_to_file(file, response, url, partial.path()).await?;

        tokio::fs::rename(partial.path(), path)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        partial.commit();

        debug!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// Streams the response body to `file` chunk by chunk, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;

    Ok(bytes_written)
}

/// Returns the in-progress path for a download target (`<name>.part`).
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Deletes the in-progress file on drop unless the download was committed.
///
/// Dropping covers every exit path: stream errors, write errors, and the
/// task being aborted mid-transfer.
#[derive(Debug)]
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(target: &Path) -> Self {
        Self {
            path: partial_path(target),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "failed to remove partial download"),
        }
    }
}
