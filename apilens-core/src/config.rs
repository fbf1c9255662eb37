use crate::entry::HttpMethod;
use crate::error::AnalyzerError;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level analyzer configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub caching: CachingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub traffic: TrafficConfig,
    /// Collapse id-like path segments (`/users/42` → `/users/:id`) and drop
    /// query strings before grouping.
    #[serde(default)]
    pub normalize_endpoints: bool,
    /// Extra regexes; a path segment fully matching one becomes `:id`.
    #[serde(default)]
    pub id_patterns: Vec<String>,
}

/// Request-rate anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Bucket length. Windows are anchored at each endpoint's first request.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// A window is anomalous when `count > threshold_multiplier × baseline`.
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f64,
}

/// Caching advisor gates and score weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachingConfig {
    /// Hard gate: share of requests using a cacheable method.
    #[serde(default = "default_min_read_only_fraction")]
    pub min_read_only_fraction: f64,
    /// Hard gate: share of 2xx responses.
    #[serde(default = "default_min_success_fraction")]
    pub min_success_fraction: f64,
    /// Hard gate: minimum request count.
    #[serde(default = "default_min_volume")]
    pub min_volume: u64,
    /// Soft signal: mean latency at or above this feeds the benefit score.
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: f64,
    #[serde(default = "default_volume_weight")]
    pub volume_weight: f64,
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,
    /// Expected hit rate used to estimate saved upstream requests.
    #[serde(default = "default_assumed_hit_rate")]
    pub assumed_hit_rate: f64,
    #[serde(default = "default_cacheable_methods")]
    pub cacheable_methods: Vec<HttpMethod>,
}

/// Slow-endpoint and error-rate findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_latency_tiers")]
    pub latency_ms: SeverityTiers,
    #[serde(default = "default_error_rate_tiers")]
    pub error_rate_pct: SeverityTiers,
    /// Flag an endpoint whose slowest request exceeds `factor × mean`.
    #[serde(default = "default_degradation_factor")]
    pub degradation_factor: f64,
    #[serde(default)]
    pub error_cluster: ErrorClusterConfig,
}

/// Bursts of 4xx/5xx responses on one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClusterConfig {
    /// Errors at most this far apart (first to last) form one cluster.
    #[serde(default = "default_cluster_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cluster_min_errors")]
    pub min_errors: u64,
    /// Clusters strictly larger than this are critical, the rest high.
    #[serde(default = "default_cluster_critical_errors")]
    pub critical_errors: u64,
}

/// Per-user traffic profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    #[serde(default = "default_top_users")]
    pub top_users: usize,
    /// Report the busiest user when its share of attributed requests is
    /// strictly above this fraction.
    #[serde(default = "default_dominant_user_share")]
    pub dominant_user_share: f64,
}

/// Ascending thresholds; a value strictly above a tier earns that severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityTiers {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_window_secs() -> u64 { 60 }
fn default_threshold_multiplier() -> f64 { 3.0 }
fn default_min_read_only_fraction() -> f64 { 0.95 }
fn default_min_success_fraction() -> f64 { 0.90 }
fn default_min_volume() -> u64 { 50 }
fn default_min_latency_ms() -> f64 { 100.0 }
fn default_volume_weight() -> f64 { 0.6 }
fn default_latency_weight() -> f64 { 0.4 }
fn default_assumed_hit_rate() -> f64 { 0.8 }
fn default_cacheable_methods() -> Vec<HttpMethod> { vec![HttpMethod::Get] }
fn default_latency_tiers() -> SeverityTiers {
    SeverityTiers { medium: 500.0, high: 1000.0, critical: 2000.0 }
}
fn default_error_rate_tiers() -> SeverityTiers {
    SeverityTiers { medium: 5.0, high: 10.0, critical: 15.0 }
}
fn default_degradation_factor() -> f64 { 2.0 }
fn default_cluster_window_secs() -> u64 { 300 }
fn default_cluster_min_errors() -> u64 { 10 }
fn default_cluster_critical_errors() -> u64 { 50 }
fn default_top_users() -> usize { 5 }
fn default_dominant_user_share() -> f64 { 0.5 }

// ── Impls ─────────────────────────────────────────────────────

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            anomaly: AnomalyConfig::default(),
            caching: CachingConfig::default(),
            performance: PerformanceConfig::default(),
            traffic: TrafficConfig::default(),
            normalize_endpoints: false,
            id_patterns: Vec::new(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            threshold_multiplier: default_threshold_multiplier(),
        }
    }
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            min_read_only_fraction: default_min_read_only_fraction(),
            min_success_fraction: default_min_success_fraction(),
            min_volume: default_min_volume(),
            min_latency_ms: default_min_latency_ms(),
            volume_weight: default_volume_weight(),
            latency_weight: default_latency_weight(),
            assumed_hit_rate: default_assumed_hit_rate(),
            cacheable_methods: default_cacheable_methods(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_tiers(),
            error_rate_pct: default_error_rate_tiers(),
            degradation_factor: default_degradation_factor(),
            error_cluster: ErrorClusterConfig::default(),
        }
    }
}

impl Default for ErrorClusterConfig {
    fn default() -> Self {
        Self {
            window_secs: default_cluster_window_secs(),
            min_errors: default_cluster_min_errors(),
            critical_errors: default_cluster_critical_errors(),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            top_users: default_top_users(),
            dominant_user_share: default_dominant_user_share(),
        }
    }
}

impl SeverityTiers {
    /// Highest tier strictly exceeded by `value`.
    pub fn classify(&self, value: f64) -> Option<Severity> {
        if value > self.critical {
            Some(Severity::Critical)
        } else if value > self.high {
            Some(Severity::High)
        } else if value > self.medium {
            Some(Severity::Medium)
        } else {
            None
        }
    }

    fn validate(&self, name: &str) -> Result<(), AnalyzerError> {
        let tiers = [self.medium, self.high, self.critical];
        if tiers.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "{name} tiers must be finite and non-negative"
            )));
        }
        if !(self.medium <= self.high && self.high <= self.critical) {
            return Err(AnalyzerError::invalid_config(format!(
                "{name} tiers must be ascending (medium <= high <= critical)"
            )));
        }
        Ok(())
    }
}

impl AnalyzerConfig {
    /// Load configuration from a YAML or TOML file + `APILENS_` env overrides.
    ///
    /// Nested keys use a double underscore:
    /// `APILENS_ANOMALY__WINDOW_SECS=300`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => Figment::new().merge(Yaml::file(path)),
        };
        let config: AnalyzerConfig = figment
            .merge(Env::prefixed("APILENS_").split("__"))
            .extract()?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded analyzer config");
        Ok(config)
    }

    /// Reject settings that would make results meaningless or divide by zero.
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let anomaly = &self.anomaly;
        if anomaly.window_secs == 0 {
            return Err(AnalyzerError::invalid_config("anomaly.window_secs must be > 0"));
        }
        if !anomaly.threshold_multiplier.is_finite() || anomaly.threshold_multiplier <= 0.0 {
            return Err(AnalyzerError::invalid_config(
                "anomaly.threshold_multiplier must be a positive number",
            ));
        }

        let caching = &self.caching;
        for (name, value) in [
            ("caching.min_read_only_fraction", caching.min_read_only_fraction),
            ("caching.min_success_fraction", caching.min_success_fraction),
            ("caching.assumed_hit_rate", caching.assumed_hit_rate),
            ("traffic.dominant_user_share", self.traffic.dominant_user_share),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalyzerError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !caching.min_latency_ms.is_finite() || caching.min_latency_ms < 0.0 {
            return Err(AnalyzerError::invalid_config(
                "caching.min_latency_ms must be finite and non-negative",
            ));
        }
        let weights = [caching.volume_weight, caching.latency_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalyzerError::invalid_config(
                "caching weights must be finite and non-negative",
            ));
        }
        if caching.volume_weight + caching.latency_weight <= 0.0 {
            return Err(AnalyzerError::invalid_config(
                "caching.volume_weight + caching.latency_weight must be > 0",
            ));
        }
        if caching.cacheable_methods.is_empty() {
            return Err(AnalyzerError::invalid_config(
                "caching.cacheable_methods must not be empty",
            ));
        }

        let performance = &self.performance;
        performance.latency_ms.validate("performance.latency_ms")?;
        performance.error_rate_pct.validate("performance.error_rate_pct")?;
        if !performance.degradation_factor.is_finite() || performance.degradation_factor < 1.0 {
            return Err(AnalyzerError::invalid_config(
                "performance.degradation_factor must be >= 1",
            ));
        }
        let cluster = &performance.error_cluster;
        if cluster.window_secs == 0 || cluster.min_errors == 0 {
            return Err(AnalyzerError::invalid_config(
                "performance.error_cluster window_secs and min_errors must be > 0",
            ));
        }
        if cluster.critical_errors < cluster.min_errors {
            return Err(AnalyzerError::invalid_config(
                "performance.error_cluster.critical_errors must be >= min_errors",
            ));
        }
        Ok(())
    }
}
