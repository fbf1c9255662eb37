//! Batch analytics over API access logs.
//!
//! A run is a forward-only pipeline over an in-memory batch:
//!
//! ```text
//! validator ─▶ aggregator ─┬─▶ anomaly      (request-rate windows)
//!                          ├─▶ caching      (cache candidates)
//!                          ├─▶ performance  (slow / failing endpoints, error bursts)
//!                          └─▶ traffic      (hourly + per-user profile)
//!                                    │
//!                                    ▼
//!                                  advice       (text recommendations)
//! ```
//!
//! Nothing is shared between runs. Malformed records are counted and
//! skipped; only an invalid [`AnalyzerConfig`] is an error.
//!
//! ```
//! use apilens_analyzer::analyze_api_logs;
//! use apilens_core::{AnalyzerConfig, RawLogEntry};
//!
//! let logs = vec![
//!     RawLogEntry::new("2025-01-15T10:00:00Z", "/api/users", "GET", 200, 120.0),
//!     RawLogEntry::default(),
//! ];
//! let report = analyze_api_logs(&logs, &AnalyzerConfig::default()).unwrap();
//! assert_eq!(report.summary.total_requests, 1);
//! assert_eq!(report.invalid_count, 1);
//! ```

pub mod advice;
pub mod aggregator;
pub mod anomaly;
pub mod caching;
pub mod normalize;
pub mod performance;
pub mod report;
pub mod traffic;
pub mod validator;

pub use anomaly::AnomalyWindow;
pub use caching::{CachingRecommendation, ReasonCode};
pub use performance::{IssueKind, PerformanceIssue};
pub use report::{EndpointSummary, Report, Summary, TimeRange};
pub use traffic::TrafficProfile;

use apilens_core::{AnalyzerConfig, AnalyzerError, RawLogEntry};
use serde_json::Value;
use tracing::{info, warn};
use validator::{Validated, Validator};

/// A validated configuration, reusable across runs.
pub struct Analyzer {
    config: AnalyzerConfig,
    validator: Validator,
}

impl Analyzer {
    /// Fails fast on configuration misuse, before any record is looked at.
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        config.validate()?;
        let validator = Validator::new(&config);
        Ok(Self { config, validator })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, records: &[RawLogEntry]) -> Report {
        info!(records = records.len(), "Analyzing access logs");
        let validated = self.validator.validate_all(records);
        self.run(records.len(), validated)
    }

    /// Like [`Analyzer::analyze`] for untyped JSON records.
    pub fn analyze_values(&self, records: &[Value]) -> Report {
        info!(records = records.len(), "Analyzing access logs");
        let validated = self.validator.validate_values(records);
        self.run(records.len(), validated)
    }

    fn run(&self, total_records: usize, validated: Validated) -> Report {
        let Validated {
            entries,
            invalid_count,
            rejections,
        } = validated;
        if total_records > 0 && entries.is_empty() {
            warn!(total_records, "Every log entry was rejected");
        }

        let agg = aggregator::aggregate(&entries);
        let anomalies = anomaly::detect(&agg, &self.config.anomaly);
        let caching_recommendations = caching::advise(&agg, &self.config.caching);
        let performance_issues = performance::inspect(&agg, &self.config.performance);
        let traffic = traffic::profile(&agg, &self.config.traffic);

        let mut report = Report {
            summary: Summary::new(&agg, total_records, invalid_count),
            endpoints: agg
                .endpoints
                .iter()
                .map(|(name, stats)| (name.clone(), EndpointSummary::from(stats)))
                .collect(),
            anomalies,
            caching_recommendations,
            invalid_count,
            rejections,
            performance_issues,
            traffic,
            recommendations: Vec::new(),
        };
        report.recommendations = advice::recommendations(&report);
        info!(
            requests = report.summary.total_requests,
            invalid = report.invalid_count,
            endpoints = report.summary.unique_endpoints,
            anomalies = report.anomalies.len(),
            cacheable = report.recommended_endpoints().count(),
            "Analysis complete"
        );
        report
    }
}

/// Analyze typed log records with the given configuration.
pub fn analyze_api_logs(
    records: &[RawLogEntry],
    config: &AnalyzerConfig,
) -> Result<Report, AnalyzerError> {
    Ok(Analyzer::new(config.clone())?.analyze(records))
}

/// Analyze untyped JSON records; non-object records count as invalid.
pub fn analyze_json_logs(
    records: &[Value],
    config: &AnalyzerConfig,
) -> Result<Report, AnalyzerError> {
    Ok(Analyzer::new(config.clone())?.analyze_values(records))
}
