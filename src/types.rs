//! Shared data types for client-side log entries.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::str::FromStr;

/// Open key/value payload attached to a log entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The severity of a log entry. Closed set, no sub-levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
    Trace,
}

impl LogLevel {
    /// All levels, in the order the viewer lists them.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// A single client-side log entry.
///
/// Entries are created by the `LogStore` and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique within one unbroken sequence of the store.
    pub id: String,
    /// Creation time, RFC 3339 with millisecond precision.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    /// Label of the logical operation that produced the entry.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Captured call stack, when backtraces are enabled for the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Converts a JSON object into metadata. Anything else yields `None`.
pub fn metadata(value: serde_json::Value) -> Option<Metadata> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Formats a timestamp the way every record in this crate carries it.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Call stack at the point of the call, when backtraces are enabled.
///
/// Used for client entries and for server error records alike.
pub fn capture_stack() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Single-field equality filter over a log snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogFilter {
    #[default]
    All,
    Level(LogLevel),
    Action(String),
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Level(level) => entry.level == *level,
            LogFilter::Action(action) => entry.action == *action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(level: LogLevel, action: &str) -> LogEntry {
        LogEntry {
            id: "log-1-0".into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            level,
            message: "m".into(),
            action: action.into(),
            metadata: None,
            stack: None,
        }
    }

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!(
            "fatal".parse::<LogLevel>(),
            Err(UnknownLevel("fatal".into()))
        );
    }

    #[test]
    fn test_entry_omits_absent_optionals() {
        let value = serde_json::to_value(entry(LogLevel::Info, "act")).unwrap();
        assert_eq!(value["level"], json!("info"));
        assert!(value.get("metadata").is_none());
        assert!(value.get("stack").is_none());
    }

    #[test]
    fn test_filter_matches_single_field() {
        let e = entry(LogLevel::Error, "DB_QUERY");
        assert!(LogFilter::All.matches(&e));
        assert!(LogFilter::Level(LogLevel::Error).matches(&e));
        assert!(!LogFilter::Level(LogLevel::Info).matches(&e));
        assert!(LogFilter::Action("DB_QUERY".into()).matches(&e));
        assert!(!LogFilter::Action("db_query".into()).matches(&e));
    }

    #[test]
    fn test_metadata_only_from_objects() {
        assert_eq!(metadata(json!({ "a": 1 })).unwrap()["a"], json!(1));
        assert!(metadata(json!([1, 2])).is_none());
        assert!(metadata(json!(null)).is_none());
    }

    #[test]
    fn test_capture_stack_follows_backtrace_setting() {
        let enabled = Backtrace::capture().status() == BacktraceStatus::Captured;
        let stack = capture_stack();
        assert_eq!(stack.is_some(), enabled);
        assert!(stack.map_or(true, |text| !text.is_empty()));
    }

    #[test]
    fn test_iso_timestamp_has_millis_and_z() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T10:20:30.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso_timestamp(at), "2024-03-05T10:20:30.123Z");
    }
}
