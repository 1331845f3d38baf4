//! `POST /api/search`: simulated index search with paging.
use super::{
    elapsed_ms, parse_body, request_fields, Api, HandlerError, HandlerResponse, Handlers,
    RequestContext,
};
use crate::server_log::ServerLogFields;
use crate::types::capture_stack;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Deserialize)]
struct SearchRequest {
    query: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
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
                "Search request failed",
                "search_error",
                ServerLogFields {
                    status_code: Some(500),
                    response_time_ms: Some(elapsed_ms(started)),
                    error_type: Some(e.error_type().to_string()),
                    error_code: Some("SEARCH_ERROR".to_string()),
                    error_message: Some(e.to_string()),
                    stack_trace: capture_stack(),
                    ..Default::default()
                },
            );
            HandlerResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Search failed")
        }
    }
}

fn process(
    handlers: &Handlers,
    body: &[u8],
    ctx: &RequestContext,
    started: Instant,
) -> Result<Value, HandlerError> {
    let request: SearchRequest = parse_body(body)?;
    let query = request.query.unwrap_or_default();
    let page = request.page.filter(|page| *page > 0).unwrap_or(1);
    let limit = request.limit.filter(|limit| *limit > 0).unwrap_or(20);
    let logger = &handlers.logger;

    logger.info(
        "Search request received",
        "search_start",
        ServerLogFields {
            page_number: Some(page),
            limit: Some(limit),
            tags: ServerLogFields::tags(["search", "query"]),
            metadata: json!({ "search_query": query }).as_object().cloned(),
            ..request_fields(Api::Search, ctx)
        },
    );

    logger.debug(
        "Searching index",
        "search_index",
        ServerLogFields {
            query_time_ms: Some(handlers.random(50, 250)),
            cache_hit: Some(handlers.chance(0.3)),
            items_processed: Some(handlers.random(1000, 11000)),
            tags: ServerLogFields::tags(["elasticsearch", "index"]),
            ..Default::default()
        },
    );

    logger.trace(
        "Ranking results",
        "search_rank",
        ServerLogFields {
            items_processed: Some(handlers.random(10, 110)),
            cpu_usage: Some(handlers.random(20, 100)),
            memory_usage_mb: Some(handlers.random(128, 640)),
            ..Default::default()
        },
    );

    logger.debug(
        "Applying filters",
        "search_filter",
        ServerLogFields {
            query_time_ms: Some(handlers.random(10, 60)),
            items_processed: Some(limit),
            page_number: Some(page),
            ..Default::default()
        },
    );

    let result_count = handlers.random(1, 51);

    logger.info(
        "Search completed successfully",
        "search_success",
        ServerLogFields {
            status_code: Some(200),
            response_time_ms: Some(elapsed_ms(started)),
            items_processed: Some(result_count),
            page_number: Some(page),
            limit: Some(limit),
            data_size_bytes: Some(result_count * 512),
            tags: ServerLogFields::tags(["success", "search"]),
            ..Default::default()
        },
    );

    Ok(json!({
        "results": result_count,
        "page": page,
        "query": query,
    }))
}
