//! Stage 4: score each endpoint as a response-caching candidate.
//!
//! Three hard gates decide `recommended`: read-only dominance, status
//! stability and volume. Mean latency is a soft signal that only feeds the
//! benefit score. Every evaluated signal leaves a [`ReasonCode`], so a
//! rejected endpoint says why.

use crate::aggregator::{Aggregation, EndpointStats};
use apilens_core::StatusClass;
use apilens_core::config::CachingConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    /// Cacheable methods reach the read-only threshold.
    ReadOnly,
    /// Too much traffic from non-cacheable methods.
    MutatingTraffic,
    StableStatus,
    UnstableStatus,
    HighVolume,
    LowVolume,
    /// Mean latency reaches the configured minimum; boosts the score.
    HighLatency,
    LowLatency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachingRecommendation {
    pub endpoint: String,
    pub recommended: bool,
    pub reasons: Vec<ReasonCode>,
    /// In `[0, 1]`; always 0 when not recommended.
    pub benefit_score: f64,
    pub read_only_fraction: f64,
    pub success_fraction: f64,
    /// Read-only requests times the assumed hit rate, rounded down.
    pub potential_requests_saved: u64,
}

/// Reference maxima the benefit score is normalized against.
struct Scale {
    max_volume: u64,
    max_latency_ms: f64,
}

impl Scale {
    fn of(agg: &Aggregation) -> Self {
        let max_volume = agg.endpoints.values().map(|s| s.total).max().unwrap_or(0);
        let max_latency_ms = agg
            .endpoints
            .values()
            .map(EndpointStats::mean_latency_ms)
            .fold(0.0, f64::max);
        Self {
            max_volume,
            max_latency_ms,
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

fn evaluate(stats: &EndpointStats, config: &CachingConfig, scale: &Scale) -> CachingRecommendation {
    let read_only: u64 = config
        .cacheable_methods
        .iter()
        .map(|m| stats.method_count(m))
        .sum();
    let read_only_fraction = ratio(read_only, stats.total);
    let success_fraction = ratio(stats.status_class_count(StatusClass::Success), stats.total);
    let mean_latency = stats.mean_latency_ms();

    let read_only_ok = read_only_fraction >= config.min_read_only_fraction;
    let stable_ok = success_fraction >= config.min_success_fraction;
    let volume_ok = stats.total >= config.min_volume;
    let slow = mean_latency >= config.min_latency_ms;

    let reasons = vec![
        if read_only_ok { ReasonCode::ReadOnly } else { ReasonCode::MutatingTraffic },
        if stable_ok { ReasonCode::StableStatus } else { ReasonCode::UnstableStatus },
        if volume_ok { ReasonCode::HighVolume } else { ReasonCode::LowVolume },
        if slow { ReasonCode::HighLatency } else { ReasonCode::LowLatency },
    ];
    let recommended = read_only_ok && stable_ok && volume_ok;

    let benefit_score = if recommended {
        let volume_term = ratio(stats.total, scale.max_volume);
        let latency_term = if slow && scale.max_latency_ms > 0.0 {
            mean_latency / scale.max_latency_ms
        } else {
            0.0
        };
        let weight_sum = config.volume_weight + config.latency_weight;
        ((config.volume_weight * volume_term + config.latency_weight * latency_term) / weight_sum)
            .clamp(0.0, 1.0)
    } else {
        0.0
    };
    let potential_requests_saved = if recommended {
        (read_only as f64 * config.assumed_hit_rate).floor() as u64
    } else {
        0
    };

    CachingRecommendation {
        endpoint: stats.endpoint.clone(),
        recommended,
        reasons,
        benefit_score,
        read_only_fraction,
        success_fraction,
        potential_requests_saved,
    }
}

/// One recommendation per endpoint, best candidates first.
///
/// Ordered by benefit score descending, ties broken by endpoint name.
pub fn advise(agg: &Aggregation, config: &CachingConfig) -> Vec<CachingRecommendation> {
    let scale = Scale::of(agg);
    let mut out: Vec<_> = agg
        .endpoints
        .values()
        .map(|stats| evaluate(stats, config, &scale))
        .collect();
    out.sort_by(|a, b| {
        b.benefit_score
            .total_cmp(&a.benefit_score)
            .then_with(|| a.endpoint.cmp(&b.endpoint))
    });
    out
}

impl CachingRecommendation {
    pub fn has_reason(&self, reason: ReasonCode) -> bool {
        self.reasons.contains(&reason)
    }
}
