use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, parse_path_id, storage_error_response, success_paginated_response,
    success_response, ApiError,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rise_common::types::{NewStartupProfile, StartupProfile};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Register a startup profile.
///
/// The analysis is not started automatically; clients call
/// `POST /v1/analysis/request` or the insert webhook afterwards.
#[utoipa::path(
    post,
    path = "/v1/startups",
    tag = "Startups",
    request_body = NewStartupProfile,
    responses(
        (status = 201, description = "Startup created", body = StartupProfile),
        (status = 400, description = "Invalid profile", body = ApiError)
    )
)]
async fn create_startup(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(profile): Json<NewStartupProfile>,
) -> impl IntoResponse {
    if profile.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "Startup name must not be empty",
        );
    }

    match state.store.insert_startup(&profile).await {
        Ok(created) => {
            tracing::info!(startup_id = created.id, name = %created.details.name, "Startup registered");
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// List startups, newest first.
#[utoipa::path(
    get,
    path = "/v1/startups",
    tag = "Startups",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated startups", body = Vec<StartupProfile>)
    )
)]
async fn list_startups(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    let limit = pagination.limit();
    let offset = pagination.offset();

    let total = match state.store.count_startups().await {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state.store.list_startups(limit, offset).await {
        Ok(items) => success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

#[utoipa::path(
    get,
    path = "/v1/startups/{id}",
    tag = "Startups",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Startup profile", body = StartupProfile),
        (status = 400, description = "Invalid id", body = ApiError),
        (status = 404, description = "Startup not found", body = ApiError)
    )
)]
async fn get_startup(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_path_id(&trace_id, "startup", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get_startup(id).await {
        Ok(Some(profile)) => success_response(StatusCode::OK, &trace_id, profile),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Startup {id} not found"),
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn startup_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_startup, list_startups))
        .routes(routes!(get_startup))
}
