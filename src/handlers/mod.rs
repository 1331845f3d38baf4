//! Simulated API handlers.
//!
//! Each handler parses a JSON request body, fabricates a few steps of work
//! and writes a structured server log record for every step. The handlers
//! are plain async functions so they can be driven over HTTP or in-process
//! by the simulator.
mod analytics;
mod auth;
mod database;
mod search;
mod user;

use crate::server_log::{ServerLogFields, ServerLogger};
use crate::types::iso_timestamp;
use axum::http::StatusCode;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Default probability of the injected database failure.
pub const DEFAULT_FAILURE_RATE: f64 = 0.1;

/// The simulated APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Analytics,
    Auth,
    Database,
    Search,
    User,
}

impl Api {
    pub const ALL: [Api; 5] = [Api::Analytics, Api::Auth, Api::Database, Api::Search, Api::User];

    pub fn name(&self) -> &'static str {
        match self {
            Api::Analytics => "analytics",
            Api::Auth => "auth",
            Api::Database => "database",
            Api::Search => "search",
            Api::User => "user",
        }
    }

    /// The HTTP path the API is served on.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Api::Analytics => "/api/analytics",
            Api::Auth => "/api/auth",
            Api::Database => "/api/database",
            Api::Search => "/api/search",
            Api::User => "/api/user",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Api {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Api::ALL
            .into_iter()
            .find(|api| api.name() == s || api.endpoint() == s)
            .ok_or_else(|| format!("unknown api '{}'", s))
    }
}

/// Failures raised inside a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("{0}")]
    Authentication(String),
    #[error("Database connection timeout")]
    DatabaseTimeout,
}

impl HandlerError {
    /// Name recorded in the `error_type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            HandlerError::InvalidBody(_) => "SyntaxError",
            HandlerError::Authentication(_) => "AuthenticationError",
            HandlerError::DatabaseTimeout => "TimeoutError",
        }
    }
}

/// Client details recorded on the first log line of each request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

/// Status and JSON body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl HandlerResponse {
    /// A 200 response with `success: true` and a `timestamp` added to `fields`.
    fn success(fields: Value) -> Self {
        let mut body = json!({ "success": true });
        if let (Some(body), Value::Object(fields)) = (body.as_object_mut(), fields) {
            body.extend(fields);
            body.insert(
                "timestamp".to_string(),
                Value::String(iso_timestamp(Utc::now())),
            );
        }
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The set of simulated handlers sharing one server logger.
#[derive(Clone)]
pub struct Handlers {
    logger: ServerLogger,
    failure_rate: f64,
}

impl Handlers {
    /// Creates the handlers.
    ///
    /// # Arguments
    ///
    /// * `logger` - Logger receiving every record.
    /// * `failure_rate` - Probability of the injected database failure.
    pub fn new(logger: ServerLogger, failure_rate: f64) -> Self {
        Self {
            logger,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn logger(&self) -> &ServerLogger {
        &self.logger
    }

    /// Runs the handler for `api` on a raw request body.
    pub async fn handle(&self, api: Api, body: &[u8], ctx: &RequestContext) -> HandlerResponse {
        match api {
            Api::Analytics => analytics::handle(self, body, ctx).await,
            Api::Auth => auth::handle(self, body, ctx).await,
            Api::Database => database::handle(self, body, ctx).await,
            Api::Search => search::handle(self, body, ctx).await,
            Api::User => user::handle(self, body, ctx).await,
        }
    }

    /// Random integer in `low..high` from the logger's metric source.
    fn random(&self, low: u64, high: u64) -> u64 {
        self.logger.metrics().range(low, high)
    }

    fn chance(&self, probability: f64) -> bool {
        self.logger.metrics().chance(probability)
    }
}

/// Decodes a request body. An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, HandlerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Fields recorded on the first line of every request.
fn request_fields(api: Api, ctx: &RequestContext) -> ServerLogFields {
    ServerLogFields {
        method: Some("POST".to_string()),
        endpoint: Some(api.endpoint().to_string()),
        ip_address: Some(ctx.ip_address.clone()),
        user_agent: Some(ctx.user_agent.clone()),
        ..Default::default()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Treats a missing or empty string as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::server_log::MemorySink;
    use std::sync::Arc;

    pub(crate) fn handlers(failure_rate: f64) -> (Handlers, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let logger = ServerLogger::new(
            crate::server_log::DEFAULT_SERVICE,
            "test",
            Metrics::from_seed(Some(5)),
            sink.clone(),
        );
        (Handlers::new(logger, failure_rate), sink)
    }

    pub(crate) fn actions(sink: &MemorySink) -> Vec<String> {
        sink.records()
            .iter()
            .map(|record| record["function_name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_api_lookup() {
        assert_eq!("search".parse::<Api>().unwrap(), Api::Search);
        assert_eq!("/api/auth".parse::<Api>().unwrap(), Api::Auth);
        assert!("metrics".parse::<Api>().is_err());
    }

    #[test]
    fn test_success_body_shape() {
        let response = HandlerResponse::success(json!({ "action": "login" }));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["success"], json!(true));
        assert_eq!(response.body["action"], json!("login"));
        assert!(response.body["timestamp"].is_string());
    }

    #[test]
    fn test_empty_body_reads_as_object() {
        let value: Value = parse_body(b"  ").unwrap();
        assert_eq!(value, json!({}));
        assert!(parse_body::<Value>(b"{not json").is_err());
    }

    #[tokio::test]
    async fn test_every_api_answers_on_default_body() {
        let (handlers, sink) = handlers(0.0);
        for api in Api::ALL {
            let response = handlers.handle(api, b"{}", &RequestContext::default()).await;
            assert_eq!(response.status, StatusCode::OK, "{}", api);
        }
        assert!(sink.lines().len() >= Api::ALL.len() * 4);
    }
}
