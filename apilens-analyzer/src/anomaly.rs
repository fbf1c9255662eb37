//! Stage 3: per-endpoint request-rate anomaly detection.
//!
//! Each endpoint's timestamps are bucketed into fixed windows anchored at its
//! first request. The baseline is the mean count over every window in the
//! observed span (empty windows included), computed once per endpoint. A
//! window is flagged when its count is strictly above
//! `threshold_multiplier × baseline`.

use crate::aggregator::{Aggregation, EndpointStats};
use apilens_core::config::AnomalyConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

/// A flagged window. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyWindow {
    pub endpoint: String,
    /// Inclusive.
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    pub count: u64,
    pub baseline_rate: f64,
    /// `count / baseline_rate`.
    pub ratio: f64,
}

/// Non-empty windows of one endpoint's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSeries {
    pub origin: DateTime<Utc>,
    pub window: Duration,
    /// `(window index, count)` for every non-empty window, ascending.
    pub buckets: Vec<(u64, u64)>,
    /// Windows spanned from the first to the last request, empty ones included.
    pub window_count: u64,
    pub total: u64,
}

impl WindowSeries {
    /// Bucket `timestamps` into windows of `window` anchored at the earliest
    /// one. Returns `None` for an empty slice.
    pub fn build(timestamps: &[DateTime<Utc>], window: Duration) -> Option<Self> {
        let sorted: Cow<'_, [DateTime<Utc>]> = if timestamps.windows(2).all(|w| w[0] <= w[1]) {
            Cow::Borrowed(timestamps)
        } else {
            let mut owned = timestamps.to_vec();
            owned.sort();
            Cow::Owned(owned)
        };
        let origin = *sorted.first()?;
        let window_ms = window.num_milliseconds().max(1);

        let mut buckets: Vec<(u64, u64)> = Vec::new();
        for ts in sorted.iter() {
            let idx = ((*ts - origin).num_milliseconds() / window_ms) as u64;
            match buckets.last_mut() {
                Some((last, count)) if *last == idx => *count += 1,
                _ => buckets.push((idx, 1)),
            }
        }
        let window_count = buckets.last().map_or(0, |(idx, _)| idx + 1);

        Some(Self {
            origin,
            window,
            buckets,
            window_count,
            total: sorted.len() as u64,
        })
    }

    /// Mean requests per window over the whole span.
    pub fn baseline_rate(&self) -> f64 {
        if self.window_count == 0 {
            return 0.0;
        }
        self.total as f64 / self.window_count as f64
    }

    /// `None` when the start lies beyond the representable time range.
    pub fn window_start(&self, idx: u64) -> Option<DateTime<Utc>> {
        let idx = i64::try_from(idx).ok()?;
        let offset_ms = self.window.num_milliseconds().checked_mul(idx)?;
        self.origin
            .checked_add_signed(Duration::try_milliseconds(offset_ms)?)
    }

    /// Exclusive end of a window, clamped to the last representable instant.
    pub fn window_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Flag anomalous windows for a single endpoint, ordered by start time.
pub fn detect_endpoint(stats: &EndpointStats, config: &AnomalyConfig) -> Vec<AnomalyWindow> {
    if stats.timestamps.len() < 2 {
        return Vec::new();
    }
    let window = Duration::seconds(config.window_secs.min(i64::MAX as u64 / 1000) as i64);
    let Some(series) = WindowSeries::build(&stats.timestamps, window) else {
        return Vec::new();
    };
    if series.window_count <= 1 {
        return Vec::new();
    }
    let baseline = series.baseline_rate();
    if baseline <= 0.0 {
        return Vec::new();
    }
    let threshold = config.threshold_multiplier * baseline;

    series
        .buckets
        .iter()
        .filter(|(_, count)| *count as f64 > threshold)
        .filter_map(|&(idx, count)| {
            let start = series.window_start(idx)?;
            let anomaly = AnomalyWindow {
                endpoint: stats.endpoint.clone(),
                start,
                end: series.window_end(start),
                count,
                baseline_rate: baseline,
                ratio: count as f64 / baseline,
            };
            debug!(
                endpoint = %anomaly.endpoint,
                start = %anomaly.start,
                count,
                baseline,
                "Request-rate anomaly"
            );
            Some(anomaly)
        })
        .collect()
}

/// Flag anomalous windows for every endpoint, endpoints name-ascending.
pub fn detect(agg: &Aggregation, config: &AnomalyConfig) -> Vec<AnomalyWindow> {
    agg.endpoints
        .values()
        .flat_map(|stats| detect_endpoint(stats, config))
        .collect()
}
