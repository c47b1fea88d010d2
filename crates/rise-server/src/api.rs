pub mod investors;
pub mod pagination;
pub mod startups;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rise_storage::StorageError;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Error envelope, as documented in the OpenAPI schema.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// Numeric error code
    pub err_code: i32,
    /// Error message
    pub err_msg: String,
    /// Trace id of the request
    pub trace_id: String,
}

/// Envelope wrapping every JSON response.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success
    pub err_code: i32,
    /// `success` on success
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn success_paginated_response<T>(
    status: StatusCode,
    trace_id: &str,
    items: Vec<T>,
    total: u64,
    limit: usize,
    offset: usize,
) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items,
            total,
            limit,
            offset,
        },
    )
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "conflict" => 1005,
        "analysis_in_progress" => 1201,
        "upstream_error" => 1202,
        "malformed_response" => 1203,
        "persistence_error" => 1204,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    error_response_with_data::<Value>(status, trace_id, code, msg, None)
}

pub fn error_response_with_data<T>(
    status: StatusCode,
    trace_id: &str,
    code: &str,
    msg: &str,
    data: Option<T>,
) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data,
        }),
    )
        .into_response()
}

/// Maps a storage failure onto the envelope. Missing rows become 404,
/// everything else is logged and reported as 500.
pub fn storage_error_response(trace_id: &str, err: &StorageError) -> Response {
    match err {
        StorageError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &err.to_string())
        }
        _ => {
            tracing::error!(trace_id = %trace_id, error = %err, "Storage operation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Parses a numeric path id, answering 400 in the envelope when it is not
/// a positive integer.
pub fn parse_path_id(trace_id: &str, entity: &str, raw: &str) -> Result<i64, Response> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                trace_id,
                "bad_request",
                &format!("Invalid {entity} id: {raw}"),
            )
        })
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    /// Configured AI provider and model, e.g. `openai/gpt-4o-mini`
    ai_model: String,
    /// `ok`, or `unavailable` when the provider reports it cannot serve requests
    ai_status: String,
    storage_status: String,
}

/// Service health.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let storage_status = match state.store.count_startups().await {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            "error".to_string()
        }
    };
    let ai_status = match state.analyzer.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "AI provider health check failed");
            "unavailable".to_string()
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            ai_model: format!("{}/{}", state.analyzer.provider(), state.analyzer.model_name()),
            ai_status,
            storage_status,
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(startups::startup_routes())
        .merge(investors::investor_routes())
}
