//! Builds server log records and writes them to a sink.
use super::entry::{function_name_for, ServerLogEntry, ServerLogFields};
use super::sink::LogSink;
use crate::metrics::Metrics;
use crate::types::{iso_timestamp, LogLevel};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// Default `service` field of every record.
pub const DEFAULT_SERVICE: &str = "log-monitoring-app";

/// Emits `ServerLogEntry` records, one JSON line per call.
#[derive(Clone)]
pub struct ServerLogger {
    service: String,
    environment: String,
    metrics: Metrics,
    sink: Arc<dyn LogSink>,
}

impl ServerLogger {
    /// Creates a new `ServerLogger`.
    ///
    /// # Arguments
    ///
    /// * `service` - Value of the `service` field.
    /// * `environment` - Value of the `environment` field.
    /// * `metrics` - Source of the randomized base fields.
    /// * `sink` - Destination of the serialized lines.
    pub fn new(
        service: impl Into<String>,
        environment: impl Into<String>,
        metrics: Metrics,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            service: service.into(),
            environment: environment.into(),
            metrics,
            sink,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Builds a record, writes it and returns it.
    ///
    /// Serialization or sink failures are reported through `tracing` and
    /// never surface to the caller.
    pub fn log(
        &self,
        level: LogLevel,
        message: &str,
        action: &str,
        fields: ServerLogFields,
    ) -> ServerLogEntry {
        let entry = fields.apply(self.base_entry(level, message, action));

        match serde_json::to_string(&entry) {
            Ok(line) => {
                if let Err(e) = self.sink.write_line(&line) {
                    warn!("Failed to write server log line: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize server log entry: {}", e),
        }

        entry
    }

    pub fn info(&self, message: &str, action: &str, fields: ServerLogFields) -> ServerLogEntry {
        self.log(LogLevel::Info, message, action, fields)
    }

    pub fn warn(&self, message: &str, action: &str, fields: ServerLogFields) -> ServerLogEntry {
        self.log(LogLevel::Warn, message, action, fields)
    }

    /// Logs at error level. `status_code` defaults to 500.
    pub fn error(&self, message: &str, action: &str, fields: ServerLogFields) -> ServerLogEntry {
        let fields = ServerLogFields {
            status_code: fields.status_code.or(Some(500)),
            ..fields
        };
        self.log(LogLevel::Error, message, action, fields)
    }

    pub fn debug(&self, message: &str, action: &str, fields: ServerLogFields) -> ServerLogEntry {
        self.log(LogLevel::Debug, message, action, fields)
    }

    pub fn trace(&self, message: &str, action: &str, fields: ServerLogFields) -> ServerLogEntry {
        self.log(LogLevel::Trace, message, action, fields)
    }

    /// The record every call starts from, before call-site overrides.
    fn base_entry(&self, level: LogLevel, message: &str, action: &str) -> ServerLogEntry {
        let now = Utc::now();
        let millis = now.timestamp_millis();

        ServerLogEntry {
            timestamp: iso_timestamp(now),
            level,
            message: message.to_string(),
            service: self.service.clone(),
            environment: self.environment.clone(),
            request_id: format!("req_{}_{}", millis, self.metrics.alphanumeric(9)),
            session_id: format!("sess_{}", self.metrics.alphanumeric(16)),
            user_id: format!("user_{}", self.metrics.range(0, 1000)),
            ip_address: self.metrics.ip_address(),
            user_agent: "Rust Server".to_string(),
            method: "POST".to_string(),
            endpoint: "/api/logs".to_string(),
            status_code: 200,
            response_time_ms: self.metrics.range(50, 550),
            action: action.to_string(),
            module: "api".to_string(),
            function_name: function_name_for(action),
            cpu_usage: None,
            memory_usage_mb: None,
            query_time_ms: None,
            cache_hit: None,
            items_processed: None,
            data_size_bytes: None,
            page_number: None,
            limit: None,
            error_type: None,
            error_code: None,
            error_message: None,
            stack_trace: None,
            tags: Some(vec![
                "monitoring".to_string(),
                "demo".to_string(),
                action.to_lowercase(),
            ]),
            correlation_id: Some(format!("corr_{}", millis)),
            parent_request_id: None,
            metadata: None,
            country: None,
            region: None,
            city: None,
            isp: None,
            device_type: None,
            browser: None,
            os: None,
            screen_resolution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_log::MemorySink;
    use serde_json::json;

    fn logger() -> (ServerLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let logger = ServerLogger::new(
            DEFAULT_SERVICE,
            "test",
            Metrics::from_seed(Some(11)),
            sink.clone(),
        );
        (logger, sink)
    }

    #[test]
    fn test_error_defaults_status_500() {
        let (logger, sink) = logger();

        let entry = logger.error("boom", "X", ServerLogFields::default());
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.status_code, 500);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], json!("error"));
        assert_eq!(records[0]["status_code"], json!(500));
    }

    #[test]
    fn test_error_status_can_be_overridden() {
        let (logger, _sink) = logger();
        let entry = logger.error(
            "denied",
            "auth_error",
            ServerLogFields {
                status_code: Some(401),
                ..Default::default()
            },
        );
        assert_eq!(entry.status_code, 401);
    }

    #[test]
    fn test_base_fields_are_populated() {
        let (logger, _sink) = logger();
        let entry = logger.info("hello", "Auth Start", ServerLogFields::default());

        assert_eq!(entry.service, DEFAULT_SERVICE);
        assert_eq!(entry.environment, "test");
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.module, "api");
        assert_eq!(entry.function_name, "auth_start");
        assert!((50..550).contains(&entry.response_time_ms));
        assert!(entry.request_id.starts_with("req_"));
        assert_eq!(entry.request_id.rsplit('_').next().unwrap().len(), 9);
        assert_eq!(entry.session_id.len(), "sess_".len() + 16);
        assert!(entry.user_id.starts_with("user_"));
        assert_eq!(
            entry.tags,
            Some(vec!["monitoring".into(), "demo".into(), "auth start".into()])
        );
        assert!(entry.correlation_id.unwrap().starts_with("corr_"));
    }

    #[test]
    fn test_call_site_fields_override_base() {
        let (logger, sink) = logger();
        logger.debug(
            "query",
            "db_query",
            ServerLogFields {
                endpoint: Some("/api/database".into()),
                query_time_ms: Some(42),
                tags: ServerLogFields::tags(["sql"]),
                metadata: json!({ "table": "users" }).as_object().cloned(),
                ..Default::default()
            },
        );

        let record = &sink.records()[0];
        assert_eq!(record["endpoint"], json!("/api/database"));
        assert_eq!(record["query_time_ms"], json!(42));
        assert_eq!(record["tags"], json!(["sql"]));
        assert_eq!(record["metadata"]["table"], json!("users"));
        assert!(record.get("cpu_usage").is_none());
        assert!(record.get("error_type").is_none());
    }

    #[test]
    fn test_one_line_per_call() {
        let (logger, sink) = logger();
        logger.info("a", "a", ServerLogFields::default());
        logger.trace("b", "b", ServerLogFields::default());
        logger.warn("c", "c", ServerLogFields::default());

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| !line.contains('\n')));
    }
}
