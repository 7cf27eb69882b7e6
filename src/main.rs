//! CLI entry point for the scraping-by crawler.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scraping_by::config::load_file_layer;
use scraping_by::output::{render_summary, report_json};
use scraping_by::{CrawlError, CrawlOrchestrator, HttpClient, StopReason};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

/// Exit status after Ctrl-C, matching shell convention for SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so --json output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "crawl aborted");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ExitCode> {
    let (file_layer, config_path) = load_file_layer(args.config.as_deref())?;
    if let Some(path) = &config_path {
        debug!(path = %path.display(), "loaded config file");
    }
    let resolved = args.config_layer().over(file_layer).resolve()?;

    let client =
        HttpClient::with_timeouts(resolved.connect_timeout_secs, resolved.read_timeout_secs)
            .context("Failed to build HTTP client")?;
    let crawler = CrawlOrchestrator::new(Arc::new(client), resolved.target, resolved.options)?;

    info!(
        toc_url = %crawler.target().toc_url,
        output_dir = %crawler.target().output_dir.display(),
        "scraping-by starting"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let report = match crawler.run_with_cancel(cancel).await {
        Ok(report) => report,
        Err(CrawlError::Cancelled) => {
            warn!("cancelled before any anchor was processed");
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", report_json(&report).context("Failed to serialize report")?);
    } else if !args.quiet {
        for line in render_summary(&report) {
            println!("{line}");
        }
    }

    if report.stopped == Some(StopReason::Cancelled) {
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("received Ctrl-C, cancelling crawl");
            cancel.cancel();
        }
        Err(e) => debug!(error = %e, "cannot listen for Ctrl-C"),
    }
}
