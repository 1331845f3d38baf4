//! `POST /api/auth`: simulated credential check and session creation.
use super::{
    elapsed_ms, non_empty, parse_body, request_fields, Api, HandlerError, HandlerResponse,
    Handlers, RequestContext,
};
use crate::server_log::ServerLogFields;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Deserialize)]
struct AuthRequest {
    action: Option<String>,
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
                "Authentication failed",
                "auth_error",
                ServerLogFields {
                    status_code: Some(401),
                    response_time_ms: Some(elapsed_ms(started)),
                    error_type: Some(e.error_type().to_string()),
                    error_code: Some("AUTH_FAILED".to_string()),
                    error_message: Some(e.to_string()),
                    tags: ServerLogFields::tags(["error", "auth", "security"]),
                    ..Default::default()
                },
            );
            HandlerResponse::failure(StatusCode::UNAUTHORIZED, "Authentication failed")
        }
    }
}

fn process(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
    started: Instant,
) -> Result<Value, HandlerError> {
    let request: AuthRequest =
        parse_body(body).map_err(|e| HandlerError::Authentication(e.to_string()))?;
    let action = non_empty(request.action).unwrap_or_else(|| "login".to_string());
    let logger = &handlers.logger;

    logger.info(
        "Authentication request received",
        "auth_start",
        ServerLogFields {
            action: Some(action.clone()),
            tags: ServerLogFields::tags(["auth", "security", action.as_str()]),
            device_type: Some("desktop".to_string()),
            browser: Some("Chrome".to_string()),
            os: Some("Windows".to_string()),
            ..request_fields(Api::Auth, ctx)
        },
    );

    logger.debug(
        "Validating credentials",
        "auth_validate",
        ServerLogFields {
            query_time_ms: Some(handlers.random(10, 40)),
            cache_hit: Some(false),
            tags: ServerLogFields::tags(["validation", "security"]),
            ..Default::default()
        },
    );

    logger.debug(
        "Generating auth token",
        "auth_token",
        ServerLogFields {
            query_time_ms: Some(handlers.random(5, 25)),
            tags: ServerLogFields::tags(["jwt", "token"]),
            metadata: json!({ "token_type": "JWT", "expiry": "24h" }).as_object().cloned(),
            ..Default::default()
        },
    );

    logger.trace(
        "Creating user session",
        "auth_session",
        ServerLogFields {
            query_time_ms: Some(handlers.random(5, 20)),
            cache_hit: Some(false),
            metadata: json!({ "session_duration": "7d" }).as_object().cloned(),
            ..Default::default()
        },
    );

    logger.info(
        "Authentication successful",
        "auth_success",
        ServerLogFields {
            status_code: Some(200),
            response_time_ms: Some(elapsed_ms(started)),
            action: Some(action.clone()),
            tags: ServerLogFields::tags(["success", "auth"]),
            metadata: json!({ "auth_method": "password" }).as_object().cloned(),
            ..Default::default()
        },
    );

    Ok(json!({
        "action": action,
        "authenticated": true,
    }))
}
