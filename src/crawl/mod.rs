//! Two-stage document crawl.
//!
//! A TOC page lists detail pages; each detail page carries a hidden form
//! field pointing at a document. The crawl fetches the TOC, keeps the
//! anchors whose `href` contains a filter, then processes every anchor
//! concurrently: fetch the detail page, decode the pointer, stream the
//! document to disk.
//!
//! Per-anchor problems never abort the run; they are collected in the
//! [`CrawlReport`]. Only setup failures ([`CrawlError`]) are fatal.

mod error;
mod filename;
mod links;
mod orchestrator;
mod processor;
mod report;
mod resolve;
mod types;

pub use error::{CrawlError, ItemError};
pub use filename::{
    FALLBACK_TITLE, MAX_TITLE_LEN, UniqueTokens, document_filename, sanitize_title,
    unique_document_path,
};
pub use links::extract_anchors;
pub use orchestrator::{CrawlOptions, CrawlOrchestrator, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use processor::DetailPageProcessor;
pub use report::{CrawlReport, ReportCounts, StopReason};
pub use resolve::{decode_pointer, resolve, resolve_pointer};
pub(crate) use types::origin_of;
pub use types::{
    Anchor, CrawlTarget, DEFAULT_EXTENSION, DEFAULT_OUTPUT_DIR, DEFAULT_POINTER_FIELD,
    DownloadResult, DownloadTask, NO_POINTER_REASON, Outcome,
};
