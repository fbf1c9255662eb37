pub mod config;
pub mod entry;
pub mod error;

pub use config::{AnalyzerConfig, Severity, SeverityTiers};
pub use entry::{HttpMethod, LogEntry, RawLogEntry, StatusClass};
pub use error::{AnalyzerError, RejectReason};
