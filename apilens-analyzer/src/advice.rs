//! Human-readable suggestions derived from a finished report.
//!
//! Order is fixed: caching candidates, then performance findings, then
//! request-rate anomalies, then the dominant user.

use crate::performance::{IssueKind, PerformanceIssue};
use crate::report::Report;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn for_issue(issue: &PerformanceIssue) -> String {
    let ep = &issue.endpoint;
    match issue.kind {
        IssueKind::SlowEndpoint => format!(
            "Investigate slow responses on {ep}: mean {:.0} ms exceeds {:.0} ms",
            issue.observed, issue.threshold
        ),
        IssueKind::HighErrorRate => format!(
            "Reduce errors on {ep}: {:.1}% of responses are 4xx/5xx",
            issue.observed
        ),
        IssueKind::LatencyDegradation => format!(
            "Check latency outliers on {ep}: slowest request took {:.0} ms",
            issue.observed
        ),
        IssueKind::ErrorCluster => match issue.window.as_ref().and_then(|w| w.start.zip(w.end)) {
            Some((start, end)) => format!(
                "Review the error burst on {ep}: {:.0} errors between {} and {}",
                issue.observed,
                start.format(TIME_FORMAT),
                end.format(TIME_FORMAT)
            ),
            None => format!("Review the error burst on {ep}: {:.0} errors", issue.observed),
        },
    }
}

pub fn recommendations(report: &Report) -> Vec<String> {
    let mut out = Vec::new();

    for rec in report.caching_recommendations.iter().filter(|r| r.recommended) {
        let requests = report
            .endpoints
            .get(&rec.endpoint)
            .map_or(0, |e| e.request_count);
        out.push(format!(
            "Consider caching responses for {}: {} requests, about {} could be served from cache",
            rec.endpoint, requests, rec.potential_requests_saved
        ));
    }

    out.extend(report.performance_issues.iter().map(for_issue));

    for anomaly in &report.anomalies {
        out.push(format!(
            "Check the request spike on {} at {}: {} requests against a baseline of {:.1}",
            anomaly.endpoint,
            anomaly.start.format(TIME_FORMAT),
            anomaly.count,
            anomaly.baseline_rate
        ));
    }

    if let Some(user) = &report.traffic.dominant_user {
        out.push(format!(
            "Review traffic from user {}: {:.0}% of attributed requests",
            user.user_id,
            user.share * 100.0
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TimeRange;
    use apilens_core::Severity;
    use chrono::{TimeZone, Utc};

    fn issue(kind: IssueKind, observed: f64, threshold: f64) -> PerformanceIssue {
        PerformanceIssue {
            kind,
            endpoint: "/api/orders".to_string(),
            observed,
            threshold,
            severity: Severity::High,
            window: None,
        }
    }

    #[test]
    fn slow_endpoint_text_names_mean_and_threshold() {
        let text = for_issue(&issue(IssueKind::SlowEndpoint, 1234.4, 500.0));
        assert_eq!(
            text,
            "Investigate slow responses on /api/orders: mean 1234 ms exceeds 500 ms"
        );
    }

    #[test]
    fn error_rate_text_uses_percent() {
        let text = for_issue(&issue(IssueKind::HighErrorRate, 12.5, 5.0));
        assert_eq!(text, "Reduce errors on /api/orders: 12.5% of responses are 4xx/5xx");
    }

    #[test]
    fn error_cluster_text_includes_window() {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 15, 10, 4, 30).unwrap();
        let mut cluster = issue(IssueKind::ErrorCluster, 12.0, 10.0);
        cluster.window = Some(TimeRange {
            start: Some(start),
            end: Some(end),
        });
        assert_eq!(
            for_issue(&cluster),
            "Review the error burst on /api/orders: 12 errors \
             between 2025-01-15T10:00:00Z and 2025-01-15T10:04:30Z"
        );
    }
}
