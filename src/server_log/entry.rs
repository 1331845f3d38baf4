//! The wide structured record written for every server-side logging call.
use crate::types::{LogLevel, Metadata};
use serde::{Deserialize, Serialize};

/// One structured server log line, shaped for ingestion by a log pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLogEntry {
    // Core
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub service: String,
    pub environment: String,

    // Request context
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: String,

    // HTTP
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    pub response_time_ms: u64,

    // Application context
    pub action: String,
    pub module: String,
    pub function_name: String,

    // Performance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,

    // Business
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    // Errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    // Correlation and free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    // Geography / network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,

    // Device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
}

/// Call-site overrides applied on top of the generated base record.
///
/// Every field left as `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerLogFields {
    pub service: Option<String>,
    pub environment: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub endpoint: Option<String>,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub action: Option<String>,
    pub module: Option<String>,
    pub function_name: Option<String>,
    pub cpu_usage: Option<u64>,
    pub memory_usage_mb: Option<u64>,
    pub query_time_ms: Option<u64>,
    pub cache_hit: Option<bool>,
    pub items_processed: Option<u64>,
    pub data_size_bytes: Option<u64>,
    pub page_number: Option<u64>,
    pub limit: Option<u64>,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub tags: Option<Vec<String>>,
    pub correlation_id: Option<String>,
    pub parent_request_id: Option<String>,
    pub metadata: Option<Metadata>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub screen_resolution: Option<String>,
}

/// Copies each set field of `$fields` onto `$entry`.
macro_rules! overlay {
    ($entry:ident, $fields:ident; required: $($req:ident),*; optional: $($opt:ident),*) => {
        $(
            if let Some(value) = $fields.$req {
                $entry.$req = value;
            }
        )*
        $(
            if $fields.$opt.is_some() {
                $entry.$opt = $fields.$opt;
            }
        )*
    };
}

impl ServerLogFields {
    /// Tags from string slices.
    pub fn tags<I, S>(tags: I) -> Option<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Some(tags.into_iter().map(Into::into).collect())
    }

    /// Applies these overrides to `entry`.
    pub fn apply(self, mut entry: ServerLogEntry) -> ServerLogEntry {
        let fields = self;
        overlay!(entry, fields;
            required: service, environment, request_id, session_id, user_id, ip_address,
                user_agent, method, endpoint, status_code, response_time_ms, action, module,
                function_name;
            optional: cpu_usage, memory_usage_mb, query_time_ms, cache_hit, items_processed,
                data_size_bytes, page_number, limit, error_type, error_code, error_message,
                stack_trace, tags, correlation_id, parent_request_id, metadata, country, region,
                city, isp, device_type, browser, os, screen_resolution
        );
        entry
    }
}

/// Derives a function name from an action label: whitespace runs become a
/// single `_` and the result is lowercased.
pub fn function_name_for(action: &str) -> String {
    let mut name = String::with_capacity(action.len());
    let mut in_whitespace = false;
    for c in action.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
        } else {
            name.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }
    name
}
