//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use scraping_by::config::ConfigLayer;

/// Crawl a table-of-contents page and download the document behind every
/// matching detail page.
///
/// Settings not given as flags are read from the config file
/// (`$XDG_CONFIG_HOME/scraping-by/config.toml` or `--config`).
#[derive(Parser, Debug)]
#[command(name = "scraping-by")]
#[command(author, version, about)]
pub struct Args {
    /// Table-of-contents page URL
    pub toc_url: Option<String>,

    /// Substring a link's href must contain to be crawled
    #[arg(short = 'f', long = "filter")]
    pub link_filter: Option<String>,

    /// Base URL for resolving relative detail links (defaults to the TOC URL)
    #[arg(short = 'd', long)]
    pub domain: Option<String>,

    /// Base URL for resolving download pointers (defaults to the domain's root)
    #[arg(long)]
    pub download_base: Option<String>,

    /// Directory to write documents into [default: downloads]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Name of the hidden input holding the download pointer [default: src]
    #[arg(long)]
    pub pointer_field: Option<String>,

    /// Extension for saved documents [default: pdf]
    #[arg(long)]
    pub extension: Option<String>,

    /// Maximum anchors processed at once (0 for unbounded, max 100) [default: 10]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub concurrency: Option<u8>,

    /// Abort the whole run after this many seconds (max one week)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=604_800))]
    pub timeout_secs: Option<u64>,

    /// Attempts per request, including the first (1-10) [default: 3]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit_ms: Option<u64>,

    /// HTTP connect timeout in seconds [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout_secs: Option<u64>,

    /// HTTP request timeout in seconds [default: 300]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout_secs: Option<u64>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Settings given on the command line, as the top config layer.
    #[must_use]
    pub fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            toc_url: self.toc_url.clone(),
            link_filter: self.link_filter.clone(),
            domain: self.domain.clone(),
            download_base: self.download_base.clone(),
            output_dir: self.output_dir.clone(),
            pointer_field: self.pointer_field.clone(),
            extension: self.extension.clone(),
            concurrency: self.concurrency.map(usize::from),
            timeout_secs: self.timeout_secs,
            max_attempts: self.max_attempts,
            rate_limit_ms: self.rate_limit_ms,
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
        }
    }
}
