//! Rendering of a [`CrawlReport`] for operators: plain text or JSON.

use serde::Serialize;

use crate::crawl::{CrawlReport, ItemError, Outcome, ReportCounts};
use crate::fetch::FetchError;

#[derive(Debug, Serialize)]
struct ReportView<'a> {
    toc_url: &'a str,
    found: usize,
    success: usize,
    skipped: usize,
    failed: usize,
    elapsed_ms: u64,
    stopped: Option<&'static str>,
    results: Vec<ResultView<'a>>,
}

#[derive(Debug, Serialize)]
struct ResultView<'a> {
    index: usize,
    title: &'a str,
    href: &'a str,
    detail_url: &'a str,
    #[serde(flatten)]
    outcome: OutcomeView<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeView<'a> {
    Success {
        path: String,
        bytes: u64,
        download_url: &'a str,
    },
    Skipped {
        reason: &'a str,
    },
    Failed {
        error_kind: &'static str,
        error: String,
    },
}

impl<'a> From<&'a Outcome> for OutcomeView<'a> {
    fn from(outcome: &'a Outcome) -> Self {
        match outcome {
            Outcome::Success {
                path,
                bytes,
                download_url,
            } => Self::Success {
                path: path.display().to_string(),
                bytes: *bytes,
                download_url,
            },
            Outcome::Skipped { reason } => Self::Skipped { reason },
            Outcome::Failed { error } => Self::Failed {
                error_kind: error.kind(),
                error: error.to_string(),
            },
        }
    }
}

/// Serializes the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns the `serde_json` error if serialization fails.
pub fn report_json(report: &CrawlReport) -> serde_json::Result<String> {
    let counts = report.counts();
    let view = ReportView {
        toc_url: &report.toc_url,
        found: counts.found,
        success: counts.success,
        skipped: counts.skipped,
        failed: counts.failed,
        elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        stopped: report.stopped.map(crate::crawl::StopReason::as_str),
        results: report
            .results
            .iter()
            .map(|r| ResultView {
                index: r.task.index,
                title: &r.task.anchor.display_text,
                href: &r.task.anchor.href,
                detail_url: &r.task.detail_url,
                outcome: (&r.outcome).into(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&view)
}

/// One-line tally, e.g. `found=3 success=1 skipped=1 failed=1`.
#[must_use]
pub fn counts_line(counts: ReportCounts) -> String {
    format!(
        "found={} success={} skipped={} failed={}",
        counts.found, counts.success, counts.skipped, counts.failed
    )
}

/// Human-readable summary: tally, skips with reasons, failures with detail.
#[must_use]
pub fn render_summary(report: &CrawlReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Crawled {} in {:.1}s: {}",
        report.toc_url,
        report.elapsed.as_secs_f64(),
        counts_line(report.counts())
    )];

    if let Some(reason) = report.stopped {
        lines.push(format!(
            "Run stopped early ({}); unfinished anchors are listed as failed.",
            reason.as_str()
        ));
    }
    if report.found == 0 {
        lines.push("No anchors matched the link filter; check the filter or the TOC page.".into());
    }

    let skipped: Vec<_> = report.skipped().collect();
    if !skipped.is_empty() {
        lines.push(format!("Skipped ({}):", skipped.len()));
        for (result, reason) in skipped {
            lines.push(format!(
                "  [{}] {}: {reason}",
                result.task.index, result.task.anchor.display_text
            ));
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        lines.push(format!("Failed ({}):", failures.len()));
        for (result, error) in failures {
            lines.push(format!(
                "  [{}] {} <{}>",
                result.task.index, result.task.anchor.display_text, result.task.detail_url
            ));
            lines.push(format!("      {error}"));
            if let Some(hint) = failure_hint(error) {
                lines.push(format!("      Fix: {hint}"));
            }
        }
    }

    lines
}

/// Suggests a next step for a failure, when there is a useful one.
#[must_use]
pub fn failure_hint(error: &ItemError) -> Option<&'static str> {
    match error {
        ItemError::Fetch { source, .. } => match source {
            FetchError::HttpStatus { status: 429, .. } => {
                Some("The server is rate limiting; raise --rate-limit-ms or lower --concurrency.")
            }
            FetchError::HttpStatus { status: 404 | 410, .. } => {
                Some("The page or document is gone; check --download-base and the pointer field.")
            }
            FetchError::HttpStatus { status, .. } if *status >= 500 => {
                Some("Server error; re-run later or raise --max-attempts.")
            }
            FetchError::Timeout { .. } | FetchError::Network { .. } => {
                Some("Check connectivity, then re-run; consider raising --read-timeout-secs.")
            }
            FetchError::Io { .. } => Some("Check free space and permissions of the output directory."),
            FetchError::HttpStatus { .. } | FetchError::InvalidUrl { .. } => None,
        },
        ItemError::InvalidPointer { .. } => {
            Some("The pointer did not decode to a URL; check --download-base.")
        }
        ItemError::Cancelled => Some("Re-run without a timeout or with a longer --timeout-secs."),
        ItemError::InvalidLink { .. }
        | ItemError::Html(_)
        | ItemError::OutputFile { .. }
        | ItemError::Panicked { .. } => None,
    }
}
