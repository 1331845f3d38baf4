//! `POST /api/analytics`: records a tracking event.
use super::{
    elapsed_ms, non_empty, parse_body, request_fields, Api, HandlerError, HandlerResponse,
    Handlers, RequestContext,
};
use crate::server_log::ServerLogFields;
use crate::types::capture_stack;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Deserialize)]
struct AnalyticsRequest {
    #[serde(rename = "eventType")]
    event_type: Option<String>,
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
                "Analytics processing failed",
                "analytics_error",
                ServerLogFields {
                    status_code: Some(500),
                    response_time_ms: Some(elapsed_ms(started)),
                    error_type: Some(e.error_type().to_string()),
                    error_message: Some(e.to_string()),
                    stack_trace: capture_stack(),
                    ..Default::default()
                },
            );
            HandlerResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Analytics processing failed")
        }
    }
}

fn process(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
    started: Instant,
) -> Result<Value, HandlerError> {
    let request: AnalyticsRequest = parse_body(body)?;
    let event_type = non_empty(request.event_type).unwrap_or_else(|| "page_view".to_string());
    let logger = &handlers.logger;

    logger.info(
        "Analytics event received",
        "analytics_start",
        ServerLogFields {
            tags: ServerLogFields::tags(["analytics", "tracking", event_type.as_str()]),
            country: Some("US".to_string()),
            region: Some("California".to_string()),
            city: Some("San Francisco".to_string()),
            ..request_fields(Api::Analytics, ctx)
        },
    );

    logger.debug(
        "Processing analytics event",
        "analytics_process",
        ServerLogFields {
            action: Some(event_type.clone()),
            items_processed: Some(handlers.random(1, 51)),
            data_size_bytes: Some(handlers.random(500, 2500)),
            cache_hit: Some(false),
            ..Default::default()
        },
    );

    logger.trace(
        "Aggregating analytics data",
        "analytics_aggregate",
        ServerLogFields {
            query_time_ms: Some(handlers.random(20, 120)),
            items_processed: Some(handlers.random(100, 1100)),
            memory_usage_mb: Some(handlers.random(64, 320)),
            ..Default::default()
        },
    );

    logger.info(
        "Analytics event processed",
        "analytics_success",
        ServerLogFields {
            status_code: Some(200),
            response_time_ms: Some(elapsed_ms(started)),
            action: Some(event_type.clone()),
            tags: ServerLogFields::tags(["success", "analytics"]),
            ..Default::default()
        },
    );

    Ok(json!({
        "eventType": event_type,
        "processed": true,
    }))
}
