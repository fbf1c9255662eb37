use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A log record as handed over by an ingestion step.
///
/// Every field is optional and the numeric ones stay untyped JSON so the
/// validator can decide what is coercible. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// RFC 3339 string, naive ISO-8601 (read as UTC), or unix seconds.
    #[serde(default)]
    pub timestamp: Option<Value>,

    /// Route path or path template.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// HTTP method token; missing means GET.
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub status_code: Option<Value>,

    #[serde(default, alias = "response_time_ms")]
    pub latency_ms: Option<Value>,

    /// String or numeric user identifier.
    #[serde(default)]
    pub user_id: Option<Value>,
}

impl RawLogEntry {
    /// Build a fully-populated record; mostly useful for fixtures.
    pub fn new(
        timestamp: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        latency_ms: f64,
    ) -> Self {
        Self {
            timestamp: Some(Value::String(timestamp.into())),
            endpoint: Some(endpoint.into()),
            method: Some(method.into()),
            status_code: Some(Value::from(status_code)),
            latency_ms: Some(Value::from(latency_ms)),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(Value::String(user_id.into()));
        self
    }
}

/// A validated, canonical log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub method: HttpMethod,
    pub status_code: u16,
    pub latency_ms: f64,
    pub user_id: Option<String>,
}

impl LogEntry {
    pub fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status_code)
    }

    /// 4xx and 5xx responses count as errors.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// HTTP method of a logged request.
///
/// Tokens outside the standard set (`PURGE`, `PROPFIND`, ...) are kept as
/// [`HttpMethod::Other`], uppercased, so those requests still count.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Other(token) => token,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for HttpMethod {
    /// Case-insensitive; surrounding whitespace is ignored.
    fn from(token: &str) -> Self {
        let upper = token.trim().to_ascii_uppercase();
        match upper.as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "CONNECT" => HttpMethod::Connect,
            "TRACE" => HttpMethod::Trace,
            _ => HttpMethod::Other(upper),
        }
    }
}

impl From<String> for HttpMethod {
    fn from(token: String) -> Self {
        HttpMethod::from(token.as_str())
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Other(token) => token,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(HttpMethod::from(s))
    }
}

/// Response status bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusClass {
    #[serde(rename = "2xx")]
    Success,
    #[serde(rename = "3xx")]
    Redirection,
    #[serde(rename = "4xx")]
    ClientError,
    #[serde(rename = "5xx")]
    ServerError,
    /// 1xx and anything outside 100..=599.
    #[serde(rename = "other")]
    Other,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── HttpMethod ───────────────────────────────────────────────

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!(" Patch ".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
    }

    #[test]
    fn unknown_method_is_kept_uppercased() {
        assert_eq!(
            HttpMethod::from("purge"),
            HttpMethod::Other("PURGE".to_string())
        );
        assert_eq!(HttpMethod::from("PROPFIND").as_str(), "PROPFIND");
    }

    #[test]
    fn method_serializes_uppercase() {
        let json = serde_json::to_string(&HttpMethod::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
        let json = serde_json::to_string(&HttpMethod::from("purge")).unwrap();
        assert_eq!(json, "\"PURGE\"");
    }

    #[test]
    fn method_deserializes_any_token() {
        let methods: Vec<HttpMethod> = serde_json::from_str(r#"["get","HEAD","Purge"]"#).unwrap();
        assert_eq!(
            methods,
            vec![
                HttpMethod::Get,
                HttpMethod::Head,
                HttpMethod::Other("PURGE".to_string())
            ]
        );
    }

    #[test]
    fn method_works_as_json_map_key() {
        let counts = std::collections::BTreeMap::from([
            (HttpMethod::Get, 2u64),
            (HttpMethod::from("PURGE"), 1),
        ]);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"GET":2,"PURGE":1}"#);
    }

    // ── StatusClass ──────────────────────────────────────────────

    #[test]
    fn status_class_buckets() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(204), StatusClass::Success);
        assert_eq!(StatusClass::of(304), StatusClass::Redirection);
        assert_eq!(StatusClass::of(404), StatusClass::ClientError);
        assert_eq!(StatusClass::of(503), StatusClass::ServerError);
        assert_eq!(StatusClass::of(101), StatusClass::Other);
        assert_eq!(StatusClass::of(600), StatusClass::Other);
        assert_eq!(StatusClass::of(0), StatusClass::Other);
    }

    #[test]
    fn status_class_serializes_as_bucket_label() {
        assert_eq!(serde_json::to_string(&StatusClass::Success).unwrap(), "\"2xx\"");
        assert_eq!(serde_json::to_string(&StatusClass::Other).unwrap(), "\"other\"");
    }

    // ── RawLogEntry ──────────────────────────────────────────────

    #[test]
    fn raw_entry_accepts_response_time_alias() {
        let raw: RawLogEntry = serde_json::from_str(
            r#"{"timestamp":"2025-01-15T10:00:00Z","endpoint":"/a","response_time_ms":12}"#,
        )
        .unwrap();
        assert_eq!(raw.latency_ms, Some(Value::from(12)));
        assert!(raw.method.is_none());
        assert!(raw.status_code.is_none());
    }

    #[test]
    fn raw_entry_null_fields_become_none() {
        let raw: RawLogEntry =
            serde_json::from_str(r#"{"timestamp":null,"endpoint":"/a","user_id":null}"#).unwrap();
        assert!(raw.timestamp.is_none());
        assert!(raw.user_id.is_none());
    }

    #[test]
    fn log_entry_error_flag_follows_status() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            endpoint: "/a".into(),
            method: HttpMethod::Get,
            status_code: 404,
            latency_ms: 1.0,
            user_id: None,
        };
        assert!(entry.is_error());
        assert_eq!(entry.status_class(), StatusClass::ClientError);
    }
}
