//! Scraping-by Core Library
//!
//! Crawls a table-of-contents page, follows every matching detail-page link,
//! and streams the document each detail page points at into a local
//! directory. Per-item failures are collected into a report instead of
//! aborting the run.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`crawl`] - TOC extraction, per-anchor processing, and orchestration
//! - [`fetch`] - HTTP client, retry policy, and per-domain rate limiting
//! - [`html`] - Narrow selector/attribute interface over the HTML parser
//! - [`config`] - TOML config file layered under command-line flags
//! - [`output`] - Text and JSON rendering of a crawl report

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod fetch;
pub mod html;
pub mod output;
mod user_agent;

// Re-export commonly used types
pub use crawl::{
    Anchor, CrawlError, CrawlOptions, CrawlOrchestrator, CrawlReport, CrawlTarget,
    DEFAULT_CONCURRENCY, DownloadResult, DownloadTask, ItemError, Outcome, ReportCounts,
    StopReason,
};
pub use fetch::{FetchError, Fetcher, HttpClient, RateLimiter, RetryPolicy};
pub use html::{HtmlDocument, HtmlError};
