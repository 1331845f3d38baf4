//! This module defines the HTTP API endpoints.
use super::AppState;
use crate::handlers::{Api, RequestContext};
use crate::logging::{export_file_name, export_json};
use crate::types::{LogFilter, LogLevel, Metadata};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, error};

/// Query parameters for listing client logs. At most one may be set.
#[derive(Deserialize, Default)]
pub struct LogsQuery {
    level: Option<String>,
    action: Option<String>,
}

/// Request structure for submitting a client log entry.
#[derive(Deserialize)]
pub struct SubmitLogRequest {
    level: String,
    message: String,
    action: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Client details taken from the forwarding header, the peer address or
/// neither.
fn request_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    let defaults = RequestContext::default();

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or(defaults.ip_address);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or(defaults.user_agent);

    RequestContext {
        ip_address,
        user_agent,
    }
}

async fn run_api(
    api: Api,
    state: AppState,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = request_context(&headers, peer.map(|ConnectInfo(addr)| addr));
    let response = state.handlers.handle(api, &body, &ctx).await;
    debug!("{} answered {}", api.endpoint(), response.status);
    (response.status, Json(response.body)).into_response()
}

/// Simulated analytics event.
#[axum::debug_handler]
pub async fn analytics(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_api(Api::Analytics, state, peer, headers, body).await
}

/// Simulated authentication.
#[axum::debug_handler]
pub async fn auth(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_api(Api::Auth, state, peer, headers, body).await
}

/// Simulated database operation.
#[axum::debug_handler]
pub async fn database(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_api(Api::Database, state, peer, headers, body).await
}

/// Simulated search.
#[axum::debug_handler]
pub async fn search(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_api(Api::Search, state, peer, headers, body).await
}

/// Simulated user operation.
#[axum::debug_handler]
pub async fn user(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_api(Api::User, state, peer, headers, body).await
}

/// Lists client log entries, optionally filtered on one field.
#[axum::debug_handler]
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let filter = match (query.level, query.action) {
        (Some(_), Some(_)) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Filter on either level or action, not both",
            )
        }
        (Some(level), None) => match level.parse::<LogLevel>() {
            Ok(level) => LogFilter::Level(level),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        (None, Some(action)) => LogFilter::Action(action),
        (None, None) => LogFilter::All,
    };

    Json(state.store.filtered(&filter)).into_response()
}

/// Appends a client log entry.
#[axum::debug_handler]
pub async fn submit_log(
    State(state): State<AppState>,
    Json(req): Json<SubmitLogRequest>,
) -> Response {
    let level = match req.level.parse::<LogLevel>() {
        Ok(level) => level,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let entry = state
        .store
        .submit(level, req.message, req.action, req.metadata);
    (StatusCode::CREATED, Json(entry)).into_response()
}

/// Clears the client log.
#[axum::debug_handler]
pub async fn clear_logs(State(state): State<AppState>) -> StatusCode {
    state.store.clear();
    StatusCode::NO_CONTENT
}

/// Downloads the full client log as indented JSON.
#[axum::debug_handler]
pub async fn export_logs(State(state): State<AppState>) -> Response {
    match export_json(&state.store.snapshot()) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export_file_name(Utc::now())),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Export failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Export failed")
        }
    }
}
