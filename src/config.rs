//! Run configuration: TOML file values layered under command-line flags.
//!
//! Both sources produce a [`ConfigLayer`] of optional values. Layers are
//! stacked (flags over file) and then [`resolve`](ConfigLayer::resolve)d
//! into the validated settings a crawl needs, with defaults filling gaps.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

use crate::crawl::{
    CrawlOptions, CrawlTarget, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_DIR, MAX_CONCURRENCY,
};
use crate::fetch::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::fetch::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_RATE_LIMIT_MS: u64 = 60_000;
const MAX_CLIENT_TIMEOUT_SECS: u64 = 3600;
/// One week.
const MAX_RUN_TIMEOUT_SECS: u64 = 604_800;

/// One source of configuration values. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    /// TOC page URL.
    pub toc_url: Option<String>,
    /// Substring detail links must contain.
    pub link_filter: Option<String>,
    /// Base URL for relative detail links.
    pub domain: Option<String>,
    /// Base URL for download pointers.
    pub download_base: Option<String>,
    /// Output directory.
    pub output_dir: Option<PathBuf>,
    /// Hidden input name holding the download pointer.
    pub pointer_field: Option<String>,
    /// Extension of saved documents.
    pub extension: Option<String>,
    /// Concurrency cap; 0 means unbounded.
    pub concurrency: Option<usize>,
    /// Whole-run timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Attempts per request, including the first.
    pub max_attempts: Option<u32>,
    /// Minimum delay between requests to one host, in milliseconds.
    pub rate_limit_ms: Option<u64>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP per-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

/// Fully validated settings for one run.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// What to crawl and where to write.
    pub target: CrawlTarget,
    /// How to crawl it.
    pub options: CrawlOptions,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP per-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl ConfigLayer {
    /// Parses a layer from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys, or out-of-range values.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let layer: Self = toml::from_str(raw).context("Invalid config syntax")?;
        layer.validate()?;
        Ok(layer)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Returns `self` with unset fields taken from `lower`.
    #[must_use]
    pub fn over(self, lower: Self) -> Self {
        Self {
            toc_url: self.toc_url.or(lower.toc_url),
            link_filter: self.link_filter.or(lower.link_filter),
            domain: self.domain.or(lower.domain),
            download_base: self.download_base.or(lower.download_base),
            output_dir: self.output_dir.or(lower.output_dir),
            pointer_field: self.pointer_field.or(lower.pointer_field),
            extension: self.extension.or(lower.extension),
            concurrency: self.concurrency.or(lower.concurrency),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            max_attempts: self.max_attempts.or(lower.max_attempts),
            rate_limit_ms: self.rate_limit_ms.or(lower.rate_limit_ms),
            connect_timeout_secs: self.connect_timeout_secs.or(lower.connect_timeout_secs),
            read_timeout_secs: self.read_timeout_secs.or(lower.read_timeout_secs),
        }
    }

    /// Checks ranges of every set value.
    ///
    /// # Errors
    ///
    /// Names the offending key and the accepted range.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && concurrency > MAX_CONCURRENCY
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 0..={MAX_CONCURRENCY}"
            );
        }
        if let Some(attempts) = self.max_attempts
            && !(1..=MAX_ATTEMPTS_LIMIT).contains(&attempts)
        {
            bail!(
                "Invalid config value for `max_attempts`: {attempts}. Expected range: 1..={MAX_ATTEMPTS_LIMIT}"
            );
        }
        if let Some(rate_limit) = self.rate_limit_ms
            && rate_limit > MAX_RATE_LIMIT_MS
        {
            bail!(
                "Invalid config value for `rate_limit_ms`: {rate_limit}. Expected range: 0..={MAX_RATE_LIMIT_MS}"
            );
        }
        if let Some(timeout) = self.timeout_secs
            && !(1..=MAX_RUN_TIMEOUT_SECS).contains(&timeout)
        {
            bail!(
                "Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..={MAX_RUN_TIMEOUT_SECS}"
            );
        }
        validate_client_timeout("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_client_timeout("read_timeout_secs", self.read_timeout_secs)?;
        validate_non_blank("link_filter", self.link_filter.as_deref())?;
        validate_non_blank("pointer_field", self.pointer_field.as_deref())?;
        Ok(())
    }

    /// Validates the stacked layer and fills in defaults.
    ///
    /// # Errors
    ///
    /// Fails if `toc_url` or `link_filter` is missing, a URL does not parse,
    /// or any value is out of range.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        self.validate()?;

        let Some(raw_toc) = self.toc_url.as_deref() else {
            bail!("Missing required setting `toc_url`");
        };
        let toc_url = parse_http_url("toc_url", raw_toc)?;
        let Some(link_filter) = self.link_filter else {
            bail!("Missing required setting `link_filter`");
        };
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut target = CrawlTarget::new(toc_url, link_filter, output_dir);
        if let Some(domain) = self.domain.as_deref() {
            let base = parse_http_url("domain", domain)?;
            target = target
                .with_download_base_url(crate::crawl::origin_of(&base))
                .with_base_url(base);
        }
        if let Some(download_base) = self.download_base.as_deref() {
            target = target.with_download_base_url(parse_http_url("download_base", download_base)?);
        }
        if let Some(field) = self.pointer_field {
            target = target.with_pointer_field(field.trim());
        }
        if let Some(extension) = self.extension {
            target = target.with_extension(extension);
        }

        let concurrency = match self.concurrency.unwrap_or(DEFAULT_CONCURRENCY) {
            0 => None,
            n => Some(n),
        };
        let options = CrawlOptions {
            concurrency,
            timeout: self.timeout_secs.map(Duration::from_secs),
            retry_policy: RetryPolicy::with_max_attempts(
                self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            ),
            rate_limit: Duration::from_millis(self.rate_limit_ms.unwrap_or(0)),
        };

        Ok(ResolvedConfig {
            target,
            options,
            connect_timeout_secs: self.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: self.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
        })
    }
}

fn validate_client_timeout(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_CLIENT_TIMEOUT_SECS).contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: 1..={MAX_CLIENT_TIMEOUT_SECS}"
        );
    }
    Ok(())
}

fn validate_non_blank(field: &str, value: Option<&str>) -> Result<()> {
    if value.is_some_and(|v| v.trim().is_empty()) {
        bail!("Invalid config value for `{field}`: must not be empty");
    }
    Ok(())
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())
        .with_context(|| format!("Invalid config value for `{field}`: '{value}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: '{value}'. Expected an http(s) URL");
    }
    Ok(url)
}

/// Default config file location.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/scraping-by/config.toml`
/// 2. `$HOME/.config/scraping-by/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("scraping-by")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("scraping-by")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file layer.
///
/// An explicit path must exist. Without one, the default location is used
/// if a file is there, and an empty layer otherwise.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed.
pub fn load_file_layer(explicit: Option<&Path>) -> Result<(ConfigLayer, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((ConfigLayer::from_file(path)?, Some(path.to_path_buf())));
    }
    match default_config_path() {
        Some(path) if path.is_file() => Ok((ConfigLayer::from_file(&path)?, Some(path))),
        _ => Ok((ConfigLayer::default(), None)),
    }
}
