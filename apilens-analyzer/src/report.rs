use crate::aggregator::{Aggregation, EndpointStats};
use crate::anomaly::AnomalyWindow;
use crate::caching::CachingRecommendation;
use crate::performance::PerformanceIssue;
use crate::traffic::TrafficProfile;
use apilens_core::{HttpMethod, RejectReason, StatusClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of one analysis run. Every collection is ordered, so serializing
/// the same input twice yields identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub endpoints: BTreeMap<String, EndpointSummary>,
    /// Endpoint name-ascending, then window start.
    pub anomalies: Vec<AnomalyWindow>,
    /// Benefit score descending, then endpoint name.
    pub caching_recommendations: Vec<CachingRecommendation>,
    pub invalid_count: usize,
    pub rejections: BTreeMap<RejectReason, usize>,
    pub performance_issues: Vec<PerformanceIssue>,
    pub traffic: TrafficProfile,
    /// Plain-text suggestions summarizing the findings above.
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Records handed to the analyzer, valid or not.
    pub total_records: usize,
    /// Requests counted in the statistics; equals the sum over endpoints.
    pub total_requests: u64,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub unique_users: usize,
    pub unique_endpoints: usize,
    pub time_range: TimeRange,
    /// `None` when no entry survived validation.
    pub avg_latency_ms: Option<f64>,
    pub error_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Serializable view of an endpoint's [`EndpointStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub request_count: u64,
    pub status_classes: BTreeMap<StatusClass, u64>,
    pub methods: BTreeMap<HttpMethod, u64>,
    pub error_count: u64,
    pub most_common_status: Option<u16>,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub unique_users: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<&EndpointStats> for EndpointSummary {
    fn from(stats: &EndpointStats) -> Self {
        Self {
            request_count: stats.total,
            status_classes: stats.by_status_class.clone(),
            methods: stats.by_method.clone(),
            error_count: stats.error_count,
            most_common_status: stats.most_common_status(),
            avg_latency_ms: stats.mean_latency_ms(),
            p95_latency_ms: stats.p95_latency_ms(),
            min_latency_ms: stats.latency_min_ms,
            max_latency_ms: stats.latency_max_ms,
            unique_users: stats.users.len(),
            first_seen: stats.first_seen(),
            last_seen: stats.last_seen(),
        }
    }
}

impl Summary {
    pub(crate) fn new(agg: &Aggregation, total_records: usize, invalid_count: usize) -> Self {
        Self {
            total_records,
            total_requests: agg.total_requests,
            valid_count: total_records - invalid_count,
            invalid_count,
            unique_users: agg.unique_users(),
            unique_endpoints: agg.endpoints.len(),
            time_range: TimeRange {
                start: agg.first_seen(),
                end: agg.last_seen(),
            },
            avg_latency_ms: agg.mean_latency_ms(),
            error_rate_pct: agg.error_rate_pct(),
        }
    }
}

impl Report {
    /// Anomalies of a single endpoint, in window order.
    pub fn anomalies_for<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> impl Iterator<Item = &'a AnomalyWindow> + 'a {
        self.anomalies.iter().filter(move |a| a.endpoint == endpoint)
    }

    pub fn recommendation_for(&self, endpoint: &str) -> Option<&CachingRecommendation> {
        self.caching_recommendations
            .iter()
            .find(|r| r.endpoint == endpoint)
    }

    /// Endpoints that passed every caching gate, best first.
    pub fn recommended_endpoints(&self) -> impl Iterator<Item = &str> {
        self.caching_recommendations
            .iter()
            .filter(|r| r.recommended)
            .map(|r| r.endpoint.as_str())
    }
}
