//! HTTP fetching for the crawler: buffered pages and streamed downloads.
//!
//! # Features
//!
//! - One shared `reqwest` connection pool for every crawl task
//! - Redirects followed for pages and downloads alike
//! - Streaming downloads written to `<name>.part` and renamed on completion
//! - Retry with exponential backoff for transient failures
//! - Optional per-domain politeness delay
//!
//! # Example
//!
//! ```no_run
//! use scraping_by::fetch::{Fetcher, HttpClient};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let toc = client.get_text("https://dms.example.gov/pubdms/search/hitlist.cfm").await?;
//! let bytes = client
//!     .download_to_file("https://dms.example.gov/doc.pdf", Path::new("./downloads/doc.pdf"))
//!     .await?;
//! println!("{} chars of TOC, {} bytes of document", toc.len(), bytes);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{Fetcher, HttpClient, PARTIAL_SUFFIX, partial_path};
pub use error::FetchError;
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error, retry_fetch,
};
