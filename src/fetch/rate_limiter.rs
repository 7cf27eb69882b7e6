//! Per-host request spacing shared by every crawl task.
//!
//! Two things hold a host back: the configured politeness spacing between
//! consecutive requests, and a server-mandated `Retry-After` pause. A pause
//! reported by one task delays every other task bound for the same host, so
//! a throttled site is not hammered by the rest of the fan-out.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use scraping_by::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(250));
//!
//! // First request proceeds immediately
//! limiter.acquire("https://dms.example.gov/pubdms/search/hitlist.cfm").await;
//!
//! // Second request to the same host waits out the spacing
//! limiter.acquire("https://dms.example.gov/pubdms/search/document.cfm?id=1").await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Host-keyed request gate, shared through `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    /// Arc lets the `DashMap` shard lock go before awaiting a slot.
    hosts: DashMap<String, Arc<HostSlot>>,
}

#[derive(Debug, Default)]
struct HostSlot {
    /// Earliest start of the next request; held across the wait so requests
    /// to one host leave in order.
    next_allowed: Mutex<Option<Instant>>,
    /// Server pause; a plain mutex so it can be extended while a waiter
    /// holds `next_allowed`.
    paused_until: std::sync::Mutex<Option<Instant>>,
    waited_ms: AtomicU64,
}

impl HostSlot {
    fn paused_until(&self) -> Option<Instant> {
        *self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn extend_pause(&self, until: Instant) {
        let mut paused = self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if paused.is_none_or(|at| at < until) {
            *paused = Some(until);
        }
    }

    /// Adds `wait` to the running total and returns the new total.
    fn note_wait(&self, wait: Duration) -> Duration {
        let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        let total = self
            .waited_ms
            .fetch_add(wait_ms, Ordering::Relaxed)
            .saturating_add(wait_ms);
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Spaces requests to one host by at least `spacing`; zero disables spacing.
    #[must_use]
    #[instrument(skip_all, fields(spacing_ms = spacing.as_millis()))]
    pub fn new(spacing: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            spacing,
            hosts: DashMap::new(),
        }
    }

    /// No spacing; server pauses are still honoured.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Waits until a request to `url`'s host may start, then claims the slot.
    ///
    /// The first request to a host proceeds immediately unless a server
    /// pause is in force.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        let host = extract_domain(url);
        tracing::Span::current().record("host", &host);

        let slot = if self.spacing.is_zero() {
            // Nothing to wait for on a host that never asked for a pause.
            let Some(slot) = self.hosts.get(&host).map(|s| Arc::clone(s.value())) else {
                return;
            };
            slot
        } else {
            self.slot(&host)
        };

        let mut next_allowed = slot.next_allowed.lock().await;
        loop {
            let at = (*next_allowed).max(slot.paused_until());
            let now = Instant::now();
            let Some(at) = at.filter(|at| *at > now) else {
                break;
            };

            let wait = at - now;
            let total = slot.note_wait(wait);
            debug!(
                host = %host,
                wait_ms = wait.as_millis(),
                total_wait_ms = total.as_millis(),
                "holding request for host"
            );
            if total >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                warn!(
                    host = %host,
                    total_wait_secs = total.as_secs(),
                    "requests to this host are spending a long time throttled"
                );
            }
            // A pause may be extended while we sleep, so check again.
            tokio::time::sleep_until(at).await;
        }
        *next_allowed = Some(Instant::now() + self.spacing);
    }

    /// Holds every request to `url`'s host for `pause` (from `Retry-After`).
    ///
    /// A shorter pause never cuts an existing longer one short.
    #[instrument(skip(self), fields(host))]
    pub fn pause_host(&self, url: &str, pause: Duration) {
        let host = extract_domain(url);
        tracing::Span::current().record("host", &host);

        self.slot(&host).extend_pause(Instant::now() + pause);
        debug!(host = %host, pause_ms = pause.as_millis(), "server asked to pause requests");
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        Arc::clone(
            self.hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(HostSlot::default()))
                .value(),
        )
    }
}

/// Extracts the lowercase host from a URL, or `"unknown"` when it has none.
///
/// ```
/// use scraping_by::fetch::extract_domain;
///
/// assert_eq!(extract_domain("http://DMS.Example.gov/pubdms/"), "dms.example.gov");
/// assert_eq!(extract_domain("https://localhost:8080/x"), "localhost");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` value (integer seconds or HTTP-date), capped at one hour.
///
/// ```
/// use std::time::Duration;
/// use scraping_by::fetch::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    // A date already in the past means "retry now".
    Some(
        datetime
            .duration_since(std::time::SystemTime::now())
            .map_or(Duration::ZERO, |d| d.min(MAX_RETRY_AFTER)),
    )
}
