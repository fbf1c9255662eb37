//! Slow-endpoint, error-rate, latency-degradation and error-cluster findings.

use crate::aggregator::{Aggregation, EndpointStats};
use crate::report::TimeRange;
use apilens_core::Severity;
use apilens_core::config::{ErrorClusterConfig, PerformanceConfig};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Mean latency above the medium latency tier.
    SlowEndpoint,
    /// Error percentage above the medium error-rate tier.
    HighErrorRate,
    /// Slowest request far above the endpoint's mean.
    LatencyDegradation,
    /// Many 4xx/5xx responses close together.
    ErrorCluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceIssue {
    pub kind: IssueKind,
    pub endpoint: String,
    /// Mean latency (ms), error rate (%), peak latency (ms) or error count
    /// by kind.
    pub observed: f64,
    /// The bound `observed` exceeded (or reached, for error clusters).
    pub threshold: f64,
    pub severity: Severity,
    /// First and last error of an error cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeRange>,
}

fn inspect_endpoint(stats: &EndpointStats, config: &PerformanceConfig) -> Vec<PerformanceIssue> {
    let mut issues = Vec::new();
    let mean = stats.mean_latency_ms();

    if let Some(severity) = config.latency_ms.classify(mean) {
        issues.push(PerformanceIssue {
            kind: IssueKind::SlowEndpoint,
            endpoint: stats.endpoint.clone(),
            observed: mean,
            threshold: config.latency_ms.medium,
            severity,
            window: None,
        });
    }

    let error_rate = stats.error_rate_pct();
    if let Some(severity) = config.error_rate_pct.classify(error_rate) {
        issues.push(PerformanceIssue {
            kind: IssueKind::HighErrorRate,
            endpoint: stats.endpoint.clone(),
            observed: error_rate,
            threshold: config.error_rate_pct.medium,
            severity,
            window: None,
        });
    }

    let peak = stats.latency_max_ms;
    let degradation_bound = config.degradation_factor * mean;
    if peak > degradation_bound && peak > config.latency_ms.medium {
        issues.push(PerformanceIssue {
            kind: IssueKind::LatencyDegradation,
            endpoint: stats.endpoint.clone(),
            observed: peak,
            threshold: degradation_bound,
            severity: Severity::High,
            window: None,
        });
    }

    issues.extend(error_cluster(stats, &config.error_cluster));
    issues
}

/// Densest run of errors spanning at most `window`, as inclusive indices.
/// The earliest run wins a tie.
fn densest_run(errors: &[DateTime<Utc>], window: Duration) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut left = 0;
    for right in 0..errors.len() {
        while errors[right] - errors[left] > window {
            left += 1;
        }
        if best.is_none_or(|(l, r)| right - left > r - l) {
            best = Some((left, right));
        }
    }
    best
}

fn error_cluster(stats: &EndpointStats, config: &ErrorClusterConfig) -> Option<PerformanceIssue> {
    let window = i64::try_from(config.window_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    let errors = &stats.error_timestamps;
    let (left, right) = densest_run(errors, window)?;
    let count = (right - left + 1) as u64;
    if count < config.min_errors {
        return None;
    }
    Some(PerformanceIssue {
        kind: IssueKind::ErrorCluster,
        endpoint: stats.endpoint.clone(),
        observed: count as f64,
        threshold: config.min_errors as f64,
        severity: if count > config.critical_errors {
            Severity::Critical
        } else {
            Severity::High
        },
        window: Some(TimeRange {
            start: Some(errors[left]),
            end: Some(errors[right]),
        }),
    })
}

/// Findings for every endpoint, name-ascending, in [`IssueKind`] order
/// within an endpoint.
pub fn inspect(agg: &Aggregation, config: &PerformanceConfig) -> Vec<PerformanceIssue> {
    agg.endpoints
        .values()
        .flat_map(|stats| inspect_endpoint(stats, config))
        .collect()
}
