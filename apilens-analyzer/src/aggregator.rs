//! Stage 2: group validated entries by endpoint in a single pass.

use apilens_core::{HttpMethod, LogEntry, StatusClass};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Per-endpoint accumulator. Built once by [`aggregate`], read-only after.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointStats {
    pub endpoint: String,
    pub total: u64,
    pub by_status_class: BTreeMap<StatusClass, u64>,
    pub by_status_code: BTreeMap<u16, u64>,
    pub by_method: BTreeMap<HttpMethod, u64>,
    /// Responses with status >= 400.
    pub error_count: u64,
    pub latency_sum_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    /// Ascending once aggregation finishes.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Timestamps of 4xx/5xx responses, ascending once aggregation finishes.
    pub error_timestamps: Vec<DateTime<Utc>>,
    pub users: BTreeSet<String>,
    /// Ascending once aggregation finishes.
    latencies: Vec<f64>,
}

impl EndpointStats {
    fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            total: 0,
            by_status_class: BTreeMap::new(),
            by_status_code: BTreeMap::new(),
            by_method: BTreeMap::new(),
            error_count: 0,
            latency_sum_ms: 0.0,
            latency_min_ms: f64::INFINITY,
            latency_max_ms: 0.0,
            timestamps: Vec::new(),
            error_timestamps: Vec::new(),
            users: BTreeSet::new(),
            latencies: Vec::new(),
        }
    }

    fn add(&mut self, entry: &LogEntry) {
        self.total += 1;
        *self.by_status_class.entry(entry.status_class()).or_insert(0) += 1;
        *self.by_status_code.entry(entry.status_code).or_insert(0) += 1;
        *self.by_method.entry(entry.method.clone()).or_insert(0) += 1;
        if entry.is_error() {
            self.error_count += 1;
            self.error_timestamps.push(entry.timestamp);
        }
        self.latency_sum_ms += entry.latency_ms;
        self.latency_min_ms = self.latency_min_ms.min(entry.latency_ms);
        self.latency_max_ms = self.latency_max_ms.max(entry.latency_ms);
        self.latencies.push(entry.latency_ms);
        self.timestamps.push(entry.timestamp);
        if let Some(user) = &entry.user_id {
            self.users.insert(user.clone());
        }
    }

    fn finish(&mut self) {
        self.timestamps.sort();
        self.error_timestamps.sort();
        self.latencies.sort_by(f64::total_cmp);
    }

    pub fn status_class_count(&self, class: StatusClass) -> u64 {
        self.by_status_class.get(&class).copied().unwrap_or(0)
    }

    pub fn method_count(&self, method: &HttpMethod) -> u64 {
        self.by_method.get(method).copied().unwrap_or(0)
    }

    pub fn mean_latency_ms(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.latency_sum_ms / self.total as f64
    }

    /// Exact nearest-rank percentile over the sorted latencies.
    pub fn latency_percentile_ms(&self, pct: f64) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let rank = (pct * self.latencies.len() as f64 / 100.0).ceil() as usize;
        let idx = rank.clamp(1, self.latencies.len()) - 1;
        self.latencies[idx]
    }

    pub fn p95_latency_ms(&self) -> f64 {
        self.latency_percentile_ms(95.0)
    }

    /// Percentage of responses with status >= 400.
    pub fn error_rate_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.total as f64 * 100.0
    }

    /// Most frequent status code; ties go to the lowest code.
    pub fn most_common_status(&self) -> Option<u16> {
        self.by_status_code
            .iter()
            .max_by(|(a_code, a), (b_code, b)| a.cmp(b).then(b_code.cmp(a_code)))
            .map(|(code, _)| *code)
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }
}

/// Everything the downstream stages read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Keyed by endpoint, iterated name-ascending.
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub total_requests: u64,
    /// Request count per attributed user.
    pub user_requests: BTreeMap<String, u64>,
    pub latency_sum_ms: f64,
    pub error_count: u64,
}

impl Aggregation {
    pub fn unique_users(&self) -> usize {
        self.user_requests.len()
    }

    pub fn mean_latency_ms(&self) -> Option<f64> {
        (self.total_requests > 0).then(|| self.latency_sum_ms / self.total_requests as f64)
    }

    pub fn error_rate_pct(&self) -> Option<f64> {
        (self.total_requests > 0)
            .then(|| self.error_count as f64 / self.total_requests as f64 * 100.0)
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.endpoints.values().filter_map(EndpointStats::first_seen).min()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.endpoints.values().filter_map(EndpointStats::last_seen).max()
    }
}

/// Group entries by endpoint. Each entry feeds exactly one endpoint.
pub fn aggregate(entries: &[LogEntry]) -> Aggregation {
    let mut agg = Aggregation::default();
    for entry in entries {
        agg.endpoints
            .entry(entry.endpoint.clone())
            .or_insert_with(|| EndpointStats::new(&entry.endpoint))
            .add(entry);
        agg.total_requests += 1;
        agg.latency_sum_ms += entry.latency_ms;
        if entry.is_error() {
            agg.error_count += 1;
        }
        if let Some(user) = &entry.user_id {
            *agg.user_requests.entry(user.clone()).or_insert(0) += 1;
        }
    }
    for stats in agg.endpoints.values_mut() {
        stats.finish();
    }
    agg
}
