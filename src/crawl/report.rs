//! Aggregated outcome of a crawl run.

use std::time::Duration;

use super::error::ItemError;
use super::types::{DownloadResult, Outcome};

/// Why a run stopped before every task finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cancelled by the caller (for example Ctrl-C).
    Cancelled,
    /// The run timeout expired.
    TimedOut,
}

impl StopReason {
    /// Lowercase label for logs and JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Success/skip/failure tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    /// Anchors matched in the TOC.
    pub found: usize,
    /// Documents written.
    pub success: usize,
    /// Detail pages without a download pointer.
    pub skipped: usize,
    /// Anchors that failed.
    pub failed: usize,
}

/// Everything a run produced: one result per matched anchor.
#[derive(Debug)]
pub struct CrawlReport {
    /// TOC page that was crawled.
    pub toc_url: String,
    /// Number of anchors that matched the filter.
    pub found: usize,
    /// One result per anchor, ordered by anchor index.
    pub results: Vec<DownloadResult>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Set when the run was cut short.
    pub stopped: Option<StopReason>,
}

impl CrawlReport {
    /// Tallies the results.
    #[must_use]
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts {
            found: self.found,
            ..ReportCounts::default()
        };
        for result in &self.results {
            match result.outcome {
                Outcome::Success { .. } => counts.success += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Whether the run was cancelled or timed out.
    #[must_use]
    pub fn was_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    /// Successful results.
    pub fn successes(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Skipped results with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&DownloadResult, &str)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Outcome::Skipped { reason } => Some((r, reason.as_str())),
            _ => None,
        })
    }

    /// Failed results with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&DownloadResult, &ItemError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Outcome::Failed { error } => Some((r, error)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::crawl::types::{Anchor, DownloadTask};

    fn task(index: usize, title: &str) -> DownloadTask {
        DownloadTask {
            index,
            anchor: Anchor {
                href: format!("document.cfm?id={index}"),
                display_text: title.to_string(),
            },
            detail_url: format!("http://dms.example.gov/document.cfm?id={index}"),
        }
    }

    #[test]
    fn test_counts_and_accessors() {
        let report = CrawlReport {
            toc_url: "http://dms.example.gov/toc".to_string(),
            found: 3,
            results: vec![
                DownloadResult {
                    task: task(0, "Good"),
                    outcome: Outcome::Success {
                        path: PathBuf::from("out/Good-1.pdf"),
                        bytes: 10,
                        download_url: "http://dms.example.gov/a.pdf".to_string(),
                    },
                },
                DownloadResult::skipped(task(1, "Empty"), "no download pointer"),
                DownloadResult::failed(task(2, "Broken"), ItemError::Cancelled),
            ],
            elapsed: Duration::from_millis(5),
            stopped: None,
        };

        assert_eq!(
            report.counts(),
            ReportCounts {
                found: 3,
                success: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(report.successes().count(), 1);
        let (skipped, reason) = report.skipped().next().unwrap_or_else(|| panic!("no skip"));
        assert_eq!(skipped.task.anchor.display_text, "Empty");
        assert_eq!(reason, "no download pointer");
        let (failed, error) = report.failures().next().unwrap_or_else(|| panic!("no failure"));
        assert_eq!(failed.task.anchor.display_text, "Broken");
        assert_eq!(error.kind(), "cancelled");
        assert!(!report.was_stopped());
    }

    #[test]
    fn test_stop_reason_labels() {
        assert_eq!(StopReason::Cancelled.as_str(), "cancelled");
        assert_eq!(StopReason::TimedOut.as_str(), "timed_out");
    }
}
