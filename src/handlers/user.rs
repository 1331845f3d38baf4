//! `POST /api/user`: simulated user CRUD operation with a short delay.
use super::{
    elapsed_ms, non_empty, parse_body, request_fields, Api, HandlerError, HandlerResponse,
    Handlers, RequestContext,
};
use crate::server_log::ServerLogFields;
use crate::types::capture_stack;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[derive(Deserialize)]
struct UserRequest {
    action: Option<String>,
}

pub(super) async fn handle(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
) -> HandlerResponse {
    let started = Instant::now();

    match process(handlers, body, ctx, started).await {
        Ok(fields) => HandlerResponse::success(fields),
        Err(e) => {
            handlers.logger.error(
                "User API request failed",
                "user_api_error",
                ServerLogFields {
                    status_code: Some(500),
                    response_time_ms: Some(elapsed_ms(started)),
                    error_type: Some(e.error_type().to_string()),
                    error_message: Some(e.to_string()),
                    stack_trace: capture_stack(),
                    tags: ServerLogFields::tags(["error", "user", "api"]),
                    ..Default::default()
                },
            );
            HandlerResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn process(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
    started: Instant,
) -> Result<Value, HandlerError> {
    let request: UserRequest = parse_body(body)?;
    let action = non_empty(request.action).unwrap_or_else(|| "user_operation".to_string());
    let logger = &handlers.logger;

    logger.info(
        "User API request received",
        "user_api_start",
        ServerLogFields {
            tags: ServerLogFields::tags(["user", "api", "crud"]),
            ..request_fields(Api::User, ctx)
        },
    );

    logger.debug(
        "Querying user database",
        "database_query",
        ServerLogFields {
            query_time_ms: Some(handlers.random(10, 60)),
            cache_hit: Some(handlers.chance(0.5)),
            items_processed: Some(handlers.random(0, 100)),
            ..Default::default()
        },
    );

    logger.trace(
        "Memory usage check",
        "memory_check",
        ServerLogFields {
            memory_usage_mb: Some(handlers.random(128, 640)),
            cpu_usage: Some(handlers.random(0, 100)),
            ..Default::default()
        },
    );

    let delay = handlers.random(0, 100);
    tokio::time::sleep(Duration::from_millis(delay)).await;

    let response_time = elapsed_ms(started);

    logger.info(
        "User operation completed successfully",
        "user_api_success",
        ServerLogFields {
            status_code: Some(200),
            response_time_ms: Some(response_time),
            action: Some(action.clone()),
            items_processed: Some(1),
            data_size_bytes: Some(handlers.random(1000, 6000)),
            ..Default::default()
        },
    );

    Ok(json!({
        "action": action,
        "responseTime": response_time,
    }))
}
