//! Stage 1: filter and coerce raw records into canonical [`LogEntry`] values.

use crate::normalize::EndpointNormalizer;
use apilens_core::{AnalyzerConfig, HttpMethod, LogEntry, RawLogEntry, RejectReason};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Naive formats accepted after RFC 3339 fails; read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Output of the validation pass.
#[derive(Debug, Default)]
pub struct Validated {
    /// Accepted entries in input order.
    pub entries: Vec<LogEntry>,
    pub invalid_count: usize,
    pub rejections: BTreeMap<RejectReason, usize>,
}

impl Validated {
    fn record(&mut self, index: usize, result: Result<LogEntry, RejectReason>) {
        match result {
            Ok(entry) => self.entries.push(entry),
            Err(reason) => {
                debug!(index, %reason, "Skipping log entry");
                self.invalid_count += 1;
                *self.rejections.entry(reason).or_insert(0) += 1;
            }
        }
    }
}

pub struct Validator {
    normalizer: Option<EndpointNormalizer>,
}

impl Validator {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let normalizer = config
            .normalize_endpoints
            .then(|| EndpointNormalizer::new(&config.id_patterns));
        Self { normalizer }
    }

    /// Validate typed records, preserving the order of accepted entries.
    pub fn validate_all(&self, records: &[RawLogEntry]) -> Validated {
        let mut out = Validated {
            entries: Vec::with_capacity(records.len()),
            ..Validated::default()
        };
        for (index, raw) in records.iter().enumerate() {
            out.record(index, self.validate(raw));
        }
        out
    }

    /// Validate untyped JSON records. Anything that is not an object, or an
    /// object whose fields have the wrong shape, is rejected as malformed.
    pub fn validate_values(&self, records: &[Value]) -> Validated {
        let mut out = Validated {
            entries: Vec::with_capacity(records.len()),
            ..Validated::default()
        };
        for (index, value) in records.iter().enumerate() {
            let result = if value.is_object() {
                RawLogEntry::deserialize(value)
                    .map_err(|_| RejectReason::Malformed)
                    .and_then(|raw| self.validate(&raw))
            } else {
                Err(RejectReason::Malformed)
            };
            out.record(index, result);
        }
        out
    }

    /// Validate a single record.
    pub fn validate(&self, raw: &RawLogEntry) -> Result<LogEntry, RejectReason> {
        let timestamp = parse_timestamp(raw.timestamp.as_ref())?;

        let endpoint = raw
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(RejectReason::MissingEndpoint)?;
        let endpoint = match &self.normalizer {
            Some(normalizer) => normalizer.normalize(endpoint),
            None => endpoint.to_string(),
        };

        let method = match raw.method.as_deref().map(str::trim) {
            None | Some("") => HttpMethod::Get,
            Some(token) => HttpMethod::from(token),
        };

        let status_code = coerce_status(raw.status_code.as_ref())?;
        let latency_ms = coerce_latency(raw.latency_ms.as_ref())?;

        Ok(LogEntry {
            timestamp,
            endpoint,
            method,
            status_code,
            latency_ms,
            user_id: coerce_user(raw.user_id.as_ref()),
        })
    }
}

/// RFC 3339, naive ISO-8601 (UTC assumed), or unix seconds.
pub fn parse_timestamp(value: Option<&Value>) -> Result<DateTime<Utc>, RejectReason> {
    match value {
        None => Err(RejectReason::MissingTimestamp),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(RejectReason::MissingTimestamp);
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Ok(ts.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
                .ok_or(RejectReason::InvalidTimestamp)
        }
        Some(Value::Number(n)) => {
            let secs = n.as_f64().filter(|s| s.is_finite()).ok_or(RejectReason::InvalidTimestamp)?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
                return Err(RejectReason::InvalidTimestamp);
            }
            DateTime::from_timestamp(whole as i64, nanos).ok_or(RejectReason::InvalidTimestamp)
        }
        Some(_) => Err(RejectReason::InvalidTimestamp),
    }
}

fn coerce_status(value: Option<&Value>) -> Result<u16, RejectReason> {
    let status = match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) => Some(v),
            None => n
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64),
        },
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    status
        .and_then(|s| u16::try_from(s).ok())
        .ok_or(RejectReason::InvalidStatus)
}

fn coerce_latency(value: Option<&Value>) -> Result<f64, RejectReason> {
    let latency = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    latency
        .filter(|l| l.is_finite() && *l >= 0.0)
        .ok_or(RejectReason::InvalidLatency)
}

fn coerce_user(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn validator() -> Validator {
        Validator::new(&AnalyzerConfig::default())
    }

    fn raw() -> RawLogEntry {
        RawLogEntry::new("2025-01-15T10:00:00Z", "/api/users", "GET", 200, 120.0)
    }

    // ── Accepted records ─────────────────────────────────────────

    #[test]
    fn well_formed_entry_is_accepted() {
        let entry = validator().validate(&raw().with_user("user_001")).unwrap();
        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap());
        assert_eq!(entry.endpoint, "/api/users");
        assert_eq!(entry.method, HttpMethod::Get);
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.latency_ms, 120.0);
        assert_eq!(entry.user_id.as_deref(), Some("user_001"));
    }

    #[test]
    fn missing_method_defaults_to_get() {
        let mut r = raw();
        r.method = None;
        assert_eq!(validator().validate(&r).unwrap().method, HttpMethod::Get);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let mut r = raw();
        r.status_code = Some(json!("404"));
        r.latency_ms = Some(json!(" 12.5 "));
        let entry = validator().validate(&r).unwrap();
        assert_eq!(entry.status_code, 404);
        assert_eq!(entry.latency_ms, 12.5);
    }

    #[test]
    fn integral_float_status_is_accepted() {
        let mut r = raw();
        r.status_code = Some(json!(201.0));
        assert_eq!(validator().validate(&r).unwrap().status_code, 201);
    }

    #[test]
    fn offset_and_naive_timestamps_parse_to_utc() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        for ts in ["2025-01-15T12:00:00+02:00", "2025-01-15T10:00:00", "2025-01-15 10:00:00.000"] {
            assert_eq!(parse_timestamp(Some(&json!(ts))).unwrap(), expected, "{ts}");
        }
    }

    #[test]
    fn unix_seconds_timestamp_parses() {
        let ts = parse_timestamp(Some(&json!(1_736_935_200))).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap());
        let ts = parse_timestamp(Some(&json!(1_736_935_200.5))).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn numeric_user_id_is_stringified_and_blank_is_absent() {
        let mut r = raw();
        r.user_id = Some(json!(42));
        assert_eq!(validator().validate(&r).unwrap().user_id.as_deref(), Some("42"));
        r.user_id = Some(json!("  "));
        assert!(validator().validate(&r).unwrap().user_id.is_none());
    }

    #[test]
    fn endpoints_are_normalized_when_enabled() {
        let config = AnalyzerConfig {
            normalize_endpoints: true,
            ..AnalyzerConfig::default()
        };
        let mut r = raw();
        r.endpoint = Some("/api/users/42?verbose=1".into());
        let entry = Validator::new(&config).validate(&r).unwrap();
        assert_eq!(entry.endpoint, "/api/users/:id");
    }

    // ── Rejected records ─────────────────────────────────────────

    #[test]
    fn missing_timestamp_is_rejected() {
        let mut r = raw();
        r.timestamp = None;
        assert_eq!(validator().validate(&r), Err(RejectReason::MissingTimestamp));
    }

    #[test]
    fn out_of_range_month_is_rejected() {
        let mut r = raw();
        r.timestamp = Some(json!("2025-13-01T00:00:00Z"));
        assert_eq!(validator().validate(&r), Err(RejectReason::InvalidTimestamp));
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let mut r = raw();
        r.endpoint = Some("   ".into());
        assert_eq!(validator().validate(&r), Err(RejectReason::MissingEndpoint));
    }

    #[test]
    fn unknown_method_is_kept() {
        let mut r = raw();
        r.method = Some("purge".into());
        let entry = validator().validate(&r).unwrap();
        assert_eq!(entry.method, HttpMethod::Other("PURGE".to_string()));
    }

    #[test]
    fn non_numeric_or_out_of_range_status_is_rejected() {
        for bad in [json!("ok"), json!(70_000), json!(-1), json!(200.5), json!(true)] {
            let mut r = raw();
            r.status_code = Some(bad.clone());
            assert_eq!(validator().validate(&r), Err(RejectReason::InvalidStatus), "{bad}");
        }
    }

    #[test]
    fn negative_or_non_numeric_latency_is_rejected() {
        for bad in [json!(-10), json!("fast"), json!("NaN"), json!(null)] {
            let mut r = raw();
            r.latency_ms = Some(bad.clone());
            assert_eq!(validator().validate(&r), Err(RejectReason::InvalidLatency), "{bad}");
        }
    }

    // ── Batch validation ─────────────────────────────────────────

    #[test]
    fn batch_preserves_order_and_counts_rejections() {
        let mut missing = raw();
        missing.timestamp = None;
        let mut second = raw();
        second.endpoint = Some("/second".into());

        let out = validator().validate_all(&[raw(), missing.clone(), second, missing]);
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].endpoint, "/api/users");
        assert_eq!(out.entries[1].endpoint, "/second");
        assert_eq!(out.invalid_count, 2);
        assert_eq!(out.rejections.get(&RejectReason::MissingTimestamp), Some(&2));
    }

    #[test]
    fn json_values_that_are_not_objects_are_malformed() {
        let values = vec![
            json!(null),
            json!([1, 2, 3]),
            json!({
                "timestamp": "2025-01-15T10:00:00Z",
                "endpoint": 7,
                "status_code": 200,
                "latency_ms": 1
            }),
            json!({
                "timestamp": "2025-01-15T10:00:00Z",
                "endpoint": "/x",
                "status_code": 200,
                "response_time_ms": 1
            }),
        ];
        let out = validator().validate_values(&values);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.invalid_count, 3);
        assert_eq!(out.rejections.get(&RejectReason::Malformed), Some(&3));
    }
}
