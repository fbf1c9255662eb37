use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for apilens.
///
/// Only configuration misuse is fatal. Malformed log entries never surface
/// here; they are counted as [`RejectReason`]s in the report instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl AnalyzerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AnalyzerError::InvalidConfig(msg.into())
    }
}

/// Why a raw log entry was dropped by the validator.
///
/// Serialised in kebab-case so the report's rejection breakdown reads
/// `{"missing-timestamp": 3, "invalid-latency": 1}`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    #[error("record is not an object")]
    Malformed,

    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("unparseable timestamp")]
    InvalidTimestamp,

    #[error("missing or empty endpoint")]
    MissingEndpoint,

    #[error("missing or non-numeric status code")]
    InvalidStatus,

    #[error("missing, negative or non-numeric latency")]
    InvalidLatency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_message_includes_detail() {
        let err = AnalyzerError::invalid_config("anomaly.window_secs must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid config: anomaly.window_secs must be > 0"
        );
    }

    #[test]
    fn reject_reason_serializes_to_kebab_case() {
        let json = serde_json::to_string(&RejectReason::MissingTimestamp).unwrap();
        assert_eq!(json, "\"missing-timestamp\"");
        let json = serde_json::to_string(&RejectReason::InvalidLatency).unwrap();
        assert_eq!(json, "\"invalid-latency\"");
    }

    #[test]
    fn reject_reason_display_is_human_readable() {
        assert_eq!(RejectReason::MissingEndpoint.to_string(), "missing or empty endpoint");
    }
}
