//! `POST /api/database`: simulated query with an injected timeout.
use super::{
    elapsed_ms, non_empty, parse_body, request_fields, Api, HandlerError, HandlerResponse,
    Handlers, RequestContext,
};
use crate::server_log::ServerLogFields;
use crate::types::{capture_stack, iso_timestamp};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Deserialize)]
struct DatabaseRequest {
    operation: Option<String>,
}

pub(super) async fn handle(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
) -> HandlerResponse {
    let started = Instant::now();

    match process(handlers, body, ctx, started) {
        Ok(fields) => HandlerResponse::success(fields),
        Err(e) => {
            handlers.logger.error(
                "Database operation failed",
                "db_error",
                ServerLogFields {
                    status_code: Some(500),
                    response_time_ms: Some(elapsed_ms(started)),
                    error_type: Some(e.error_type().to_string()),
                    error_code: Some("DB_ERROR".to_string()),
                    error_message: Some(e.to_string()),
                    stack_trace: capture_stack(),
                    tags: ServerLogFields::tags(["error", "database", "critical"]),
                    metadata: json!({
                        "retry_count": 3,
                        "last_attempt": iso_timestamp(Utc::now()),
                    })
                    .as_object()
                    .cloned(),
                    ..Default::default()
                },
            );
            HandlerResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn process(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
    started: Instant,
) -> Result<Value, HandlerError> {
    let request: DatabaseRequest = parse_body(body)?;
    let operation = non_empty(request.operation).unwrap_or_else(|| "read".to_string());
    let logger = &handlers.logger;

    logger.info(
        "Database operation initiated",
        "db_start",
        ServerLogFields {
            action: Some(operation.clone()),
            tags: ServerLogFields::tags(["database", operation.as_str(), "sql"]),
            ..request_fields(Api::Database, ctx)
        },
    );

    logger.debug(
        "Acquiring database connection",
        "db_connection",
        ServerLogFields {
            query_time_ms: Some(handlers.random(5, 25)),
            cache_hit: Some(true),
            metadata: json!({
                "pool_size": 10,
                "active_connections": handlers.random(1, 9),
            })
            .as_object()
            .cloned(),
            ..Default::default()
        },
    );

    logger.debug(
        "Executing database query",
        "db_query",
        ServerLogFields {
            query_time_ms: Some(handlers.random(30, 180)),
            items_processed: Some(handlers.random(10, 510)),
            tags: ServerLogFields::tags(["sql", "execution"]),
            metadata: json!({ "table": "users", "operation": operation }).as_object().cloned(),
            ..Default::default()
        },
    );

    logger.trace(
        "Transaction processing",
        "db_transaction",
        ServerLogFields {
            query_time_ms: Some(handlers.random(10, 60)),
            items_processed: Some(handlers.random(0, 100)),
            metadata: json!({ "isolation_level": "READ_COMMITTED" }).as_object().cloned(),
            ..Default::default()
        },
    );

    if handlers.chance(handlers.failure_rate) {
        return Err(HandlerError::DatabaseTimeout);
    }

    let response_time = elapsed_ms(started);

    logger.info(
        "Database operation completed",
        "db_success",
        ServerLogFields {
            status_code: Some(200),
            response_time_ms: Some(response_time),
            action: Some(operation.clone()),
            items_processed: Some(handlers.random(1, 101)),
            data_size_bytes: Some(handlers.random(1000, 11000)),
            ..Default::default()
        },
    );

    Ok(json!({
        "operation": operation,
        "responseTime": response_time,
    }))
}
