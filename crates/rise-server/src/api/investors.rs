use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, parse_path_id, storage_error_response, success_empty_response,
    success_response, ApiError,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rise_common::types::{InteractionKind, InterestedInvestor, InvestorProfile, NewInvestorProfile};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

#[utoipa::path(
    post,
    path = "/v1/investors",
    tag = "Investors",
    request_body = NewInvestorProfile,
    responses(
        (status = 201, description = "Investor created", body = InvestorProfile),
        (status = 400, description = "Invalid profile", body = ApiError)
    )
)]
async fn create_investor(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(profile): Json<NewInvestorProfile>,
) -> impl IntoResponse {
    if profile.full_name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "Investor full_name must not be empty",
        );
    }
    match state.store.insert_investor(&profile).await {
        Ok(created) => success_response(StatusCode::CREATED, &trace_id, created),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

#[utoipa::path(
    get,
    path = "/v1/investors",
    tag = "Investors",
    params(PaginationParams),
    responses(
        (status = 200, description = "Investors, newest first", body = Vec<InvestorProfile>)
    )
)]
async fn list_investors(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    match state
        .store
        .list_investors(pagination.limit(), pagination.offset())
        .await
    {
        Ok(items) => success_response(StatusCode::OK, &trace_id, items),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

#[utoipa::path(
    get,
    path = "/v1/investors/{id}",
    tag = "Investors",
    params(("id" = String, Path, description = "Investor id")),
    responses(
        (status = 200, description = "Investor profile", body = InvestorProfile),
        (status = 404, description = "Investor not found", body = ApiError)
    )
)]
async fn get_investor(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_path_id(&trace_id, "investor", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get_investor(id).await {
        Ok(Some(profile)) => success_response(StatusCode::OK, &trace_id, profile),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Investor {id} not found"),
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize, ToSchema)]
struct RecordInterestRequest {
    investor_id: i64,
    /// Defaults to `profile_view`
    #[serde(default)]
    kind: Option<InteractionKind>,
}

/// Record one investor interaction with a startup profile.
#[utoipa::path(
    post,
    path = "/v1/startups/{id}/interested-investors",
    tag = "Investors",
    params(("id" = String, Path, description = "Startup id")),
    request_body = RecordInterestRequest,
    responses(
        (status = 201, description = "Interaction recorded"),
        (status = 404, description = "Startup or investor not found", body = ApiError)
    )
)]
async fn record_interest(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RecordInterestRequest>,
) -> impl IntoResponse {
    let startup_id = match parse_path_id(&trace_id, "startup", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let kind = body.kind.unwrap_or(InteractionKind::ProfileView);
    match state
        .store
        .record_investor_interest(startup_id, body.investor_id, kind)
        .await
    {
        Ok(()) => {
            tracing::debug!(
                startup_id,
                investor_id = body.investor_id,
                kind = kind.as_str(),
                "Investor interaction recorded"
            );
            success_empty_response(StatusCode::CREATED, &trace_id, "recorded")
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Investors who interacted with the startup, most recent activity first.
#[utoipa::path(
    get,
    path = "/v1/startups/{id}/interested-investors",
    tag = "Investors",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Interested investors", body = Vec<InterestedInvestor>),
        (status = 404, description = "Startup not found", body = ApiError)
    )
)]
async fn list_interested_investors(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let startup_id = match parse_path_id(&trace_id, "startup", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get_startup(startup_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Startup {startup_id} not found"),
            )
        }
        Err(e) => return storage_error_response(&trace_id, &e),
    }
    match state.store.list_interested_investors(startup_id).await {
        Ok(items) => success_response(StatusCode::OK, &trace_id, items),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn investor_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_investor, list_investors))
        .routes(routes!(get_investor))
        .routes(routes!(record_interest, list_interested_investors))
}
