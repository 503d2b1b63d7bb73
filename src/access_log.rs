//! Bounded in-memory access-log recorder (spec.md §4.6 — component C6).
//!
//! State lives behind a single `parking_lot::Mutex` guarding a `VecDeque`
//! ring: appends are O(1) amortized, eviction from the front is O(1), and
//! readers (`Query`/`GetStats`) take the same lock briefly and return
//! owned copies, the same defensive-copy discipline as the config store.
//! Never persisted — the ring is gone on restart, per spec.md §3.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LogError;
use crate::models::log_entry::AccessLogEntry;
use crate::store::Page;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_MAX_BODY_CHARS: usize = 2_048;
/// Soft cap on estimated resident bytes; eviction tries to stay under this
/// even if `max_entries` has not yet been reached (spec.md §4.6).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGroup {
    S2xx,
    S3xx,
    S4xx,
    S5xx,
}

impl StatusGroup {
    fn matches(self, status_code: u16) -> bool {
        let group = status_code / 100;
        matches!(
            (self, group),
            (StatusGroup::S2xx, 2) | (StatusGroup::S3xx, 3) | (StatusGroup::S4xx, 4) | (StatusGroup::S5xx, 5)
        )
    }

    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "2xx" => Some(StatusGroup::S2xx),
            "3xx" => Some(StatusGroup::S3xx),
            "4xx" => Some(StatusGroup::S4xx),
            "5xx" => Some(StatusGroup::S5xx),
            _ => None,
        }
    }
}

/// One element of a `status` filter: either a literal code or a `NxxGroup`
/// token (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatcher {
    Code(u16),
    Group(StatusGroup),
}

impl StatusMatcher {
    fn matches(self, status_code: u16) -> bool {
        match self {
            StatusMatcher::Code(c) => c == status_code,
            StatusMatcher::Group(g) => g.matches(status_code),
        }
    }
}

/// Parses a comma-separated `status` filter value, e.g. `"200,404,5xx"`.
pub fn parse_status_filter(raw: &str) -> Result<Vec<StatusMatcher>, LogError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| {
            if let Some(group) = StatusGroup::parse(token) {
                return Ok(StatusMatcher::Group(group));
            }
            token
                .parse::<u16>()
                .map(StatusMatcher::Code)
                .map_err(|_| LogError::InvalidFilter(format!("invalid status token '{token}'")))
        })
        .collect()
}

/// Parses `from`/`to` values, accepting RFC3339 or a bare `YYYY-MM-DD[THH:mm[:ss]]`
/// local-as-UTC form (spec.md §4.8).
pub fn parse_flexible_datetime(raw: &str) -> Result<DateTime<Utc>, LogError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc));
    }
    Err(LogError::InvalidFilter(format!("invalid timestamp '{raw}'")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Timestamp,
    Method,
    TargetHost,
    StatusCode,
    Duration,
    ClientIp,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::Timestamp
    }
}

impl SortBy {
    pub fn parse(raw: &str) -> Result<Self, LogError> {
        match raw {
            "timestamp" => Ok(SortBy::Timestamp),
            "method" => Ok(SortBy::Method),
            "target_host" => Ok(SortBy::TargetHost),
            "status_code" => Ok(SortBy::StatusCode),
            "duration" => Ok(SortBy::Duration),
            "client_ip" => Ok(SortBy::ClientIp),
            other => Err(LogError::InvalidFilter(format!("invalid sort_by '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, LogError> {
        match raw {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(LogError::InvalidFilter(format!("invalid sort_order '{other}'"))),
        }
    }
}

/// Normalized, already-validated query filter (spec.md §4.6/§4.8). HTTP
/// callers parse the raw wire params (`domain`, `status`, `from`, `to`,
/// `sort_by`, `sort_order`) into this shape before calling `query`.
#[derive(Debug, Clone, Default)]
pub struct LogQueryFilter {
    pub domain: Option<String>,
    pub statuses: Vec<StatusMatcher>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LogStats {
    pub total_entries: usize,
    pub status_2xx: usize,
    pub status_3xx: usize,
    pub status_4xx: usize,
    pub status_5xx: usize,
    pub avg_duration_ms: f64,
    pub cleanup_count: u64,
}

struct Inner {
    entries: VecDeque<AccessLogEntry>,
    estimated_bytes: usize,
    cleanup_count: u64,
}

pub struct AccessLogRecorder {
    inner: Mutex<Inner>,
    max_entries: usize,
    max_body_chars: usize,
    max_memory_bytes: usize,
}

impl AccessLogRecorder {
    pub fn new(max_entries: usize, max_memory_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(max_entries.min(1024)),
                estimated_bytes: 0,
                cleanup_count: 0,
            }),
            max_entries,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            max_memory_bytes,
        }
    }

    /// Records one exchange: assigns id/timestamp, truncates oversized
    /// bodies, then evicts from the front until both the entry-count cap
    /// and the soft memory cap are satisfied.
    pub fn record(&self, mut entry: AccessLogEntry) {
        entry.id = Uuid::new_v4();
        entry.timestamp = Some(Utc::now());
        truncate_body(&mut entry.request_body, self.max_body_chars);
        truncate_body(&mut entry.response_body, self.max_body_chars);

        let mut inner = self.inner.lock();
        inner.estimated_bytes += estimate_size(&entry);
        inner.entries.push_back(entry);

        while inner.entries.len() > self.max_entries || inner.estimated_bytes > self.max_memory_bytes {
            let Some(evicted) = inner.entries.pop_front() else {
                break;
            };
            inner.estimated_bytes = inner.estimated_bytes.saturating_sub(estimate_size(&evicted));
            inner.cleanup_count += 1;
        }
    }

    /// Looks up a single recorded entry by id, for `/logs/api?id=<logID>`
    /// (spec.md §4.8).
    pub fn get_by_id(&self, id: Uuid) -> Option<AccessLogEntry> {
        self.inner.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn query(&self, filter: &LogQueryFilter) -> Result<Page<AccessLogEntry>, LogError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(LogError::InvalidFilter("from must not be after to".into()));
            }
        }

        let inner = self.inner.lock();
        let mut items: Vec<AccessLogEntry> = inner.entries.iter().cloned().collect();
        drop(inner);

        if let Some(domain) = &filter.domain {
            items.retain(|e| e.target_host.eq_ignore_ascii_case(domain));
        }
        if !filter.statuses.is_empty() {
            items.retain(|e| filter.statuses.iter().any(|m| m.matches(e.status_code)));
        }
        if let Some(from) = filter.from {
            items.retain(|e| e.timestamp.is_some_and(|t| t >= from));
        }
        if let Some(to) = filter.to {
            items.retain(|e| e.timestamp.is_some_and(|t| t <= to));
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            items.retain(|e| {
                e.target_host.to_lowercase().contains(&needle)
                    || e.target_path.to_lowercase().contains(&needle)
                    || e.client_ip.to_lowercase().contains(&needle)
                    || e.method.to_lowercase().contains(&needle)
            });
        }

        items.sort_by(|a, b| {
            let ord = match filter.sort_by {
                SortBy::Timestamp => a.timestamp.cmp(&b.timestamp),
                SortBy::Method => a.method.cmp(&b.method),
                SortBy::TargetHost => a.target_host.cmp(&b.target_host),
                SortBy::StatusCode => a.status_code.cmp(&b.status_code),
                SortBy::Duration => a.duration_ms.cmp(&b.duration_ms),
                SortBy::ClientIp => a.client_ip.cmp(&b.client_ip),
            };
            match filter.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let page = filter.page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = filter.limit.map(|l| l.clamp(1, 1000)).unwrap_or(50);
        Ok(crate::store::paginate(items, page, limit))
    }

    pub fn stats(&self) -> LogStats {
        let inner = self.inner.lock();
        let mut stats = LogStats {
            total_entries: inner.entries.len(),
            cleanup_count: inner.cleanup_count,
            ..Default::default()
        };
        let mut total_duration = 0u64;
        for e in &inner.entries {
            match e.status_group() {
                2 => stats.status_2xx += 1,
                3 => stats.status_3xx += 1,
                4 => stats.status_4xx += 1,
                5 => stats.status_5xx += 1,
                _ => {}
            }
            total_duration += e.duration_ms;
        }
        if !inner.entries.is_empty() {
            stats.avg_duration_ms = total_duration as f64 / inner.entries.len() as f64;
        }
        stats
    }

    /// Periodic retention sweep: drops entries older than `max_age`. Runs
    /// alongside the config auto-save ticker; cancelled via the same
    /// shutdown token.
    pub async fn run_retention_sweep(
        &self,
        max_age: std::time::Duration,
        interval: std::time::Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_older_than(max_age),
                _ = shutdown.cancelled() => {
                    debug!("access log retention sweep shutting down");
                    return;
                }
            }
        }
    }

    fn sweep_older_than(&self, max_age: std::time::Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.timestamp.is_none_or_keep(cutoff));
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.cleanup_count += removed as u64;
            warn!(removed, "access log retention sweep evicted stale entries");
        }
    }
}

trait KeepIfRecent {
    fn is_none_or_keep(&self, cutoff: DateTime<Utc>) -> bool;
}

impl KeepIfRecent for Option<DateTime<Utc>> {
    fn is_none_or_keep(&self, cutoff: DateTime<Utc>) -> bool {
        match self {
            Some(t) => *t >= cutoff,
            None => true,
        }
    }
}

fn truncate_body(body: &mut Option<String>, max_chars: usize) {
    if let Some(b) = body {
        if b.chars().count() > max_chars {
            *b = b.chars().take(max_chars).collect();
        }
    }
}

fn estimate_size(entry: &AccessLogEntry) -> usize {
    let mut size = std::mem::size_of::<AccessLogEntry>();
    size += entry.method.len() + entry.target_host.len() + entry.target_path.len() + entry.client_ip.len();
    size += entry.user_agent.as_ref().map_or(0, String::len);
    size += entry.request_body.as_ref().map_or(0, String::len);
    size += entry.response_body.as_ref().map_or(0, String::len);
    for (k, v) in &entry.request_headers {
        size += k.len() + v.len();
    }
    for (k, v) in &entry.response_headers {
        size += k.len() + v.len();
    }
    size
}
