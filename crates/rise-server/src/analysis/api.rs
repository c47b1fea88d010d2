use super::handler::{parse_startup_id, AnalysisError, AnalysisOutcome};
use super::presentation::{render_html, AnalysisView};
use crate::api::{
    error_response, error_response_with_data, parse_path_id, storage_error_response,
    success_empty_response, success_response, ApiError,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rise_common::analysis::ReadinessBand;
use rise_common::types::{AIInsight, ChatTurn, StartupProfile, StartupSuggestion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const WEBHOOK_TABLE: &str = "startups";
const WEBHOOK_EVENT: &str = "INSERT";

#[derive(Deserialize, ToSchema)]
struct AnalysisRequestBody {
    /// Startup id as a number or a numeric string
    #[serde(default)]
    #[schema(value_type = Object)]
    startup_id: Value,
}

#[derive(Serialize, ToSchema)]
struct AnalysisRequestResponse {
    message: String,
    startup_id: i64,
    #[schema(value_type = Object)]
    analysis: Map<String, Value>,
}

/// Payload posted by the database on row changes.
#[derive(Deserialize, ToSchema)]
struct WebhookPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    record: Option<Value>,
}

#[derive(Deserialize, ToSchema)]
struct AssistantRequestBody {
    messages: Vec<ChatTurn>,
    /// Profile the conversation is about; takes precedence over `investor_id`
    #[serde(default)]
    startup_id: Option<i64>,
    #[serde(default)]
    investor_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
struct AssistantReply {
    message: String,
}

#[derive(Serialize, ToSchema)]
struct FailureData {
    error: String,
}

#[derive(Serialize, ToSchema)]
struct ReadinessScoreResponse {
    startup_id: i64,
    funding_readiness_score: Option<u8>,
    band: Option<ReadinessBand>,
}

fn analysis_error_response(trace_id: &str, err: &AnalysisError) -> Response {
    let msg = err.to_string();
    match err {
        AnalysisError::InvalidStartupId(_) | AnalysisError::InvalidConversation(_) => {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", &msg)
        }
        AnalysisError::NotFound(_) | AnalysisError::InvestorNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &msg)
        }
        AnalysisError::AlreadyInProgress { .. } => {
            error_response(StatusCode::CONFLICT, trace_id, "analysis_in_progress", &msg)
        }
        AnalysisError::UpstreamError(_)
        | AnalysisError::MalformedResponse(_)
        | AnalysisError::PersistenceError(_)
        | AnalysisError::Aborted(_) => {
            let code = match err {
                AnalysisError::UpstreamError(_) => "upstream_error",
                AnalysisError::MalformedResponse(_) => "malformed_response",
                AnalysisError::PersistenceError(_) => "persistence_error",
                _ => "internal_error",
            };
            error_response_with_data(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                code,
                &msg,
                Some(FailureData { error: msg.clone() }),
            )
        }
    }
}

/// Runs the analysis on its own task so a dropped client connection cannot
/// cancel a run that already claimed the row. A task that panics or is
/// cancelled leaves the row `failed`, not `processing`.
async fn run_detached(state: &AppState, startup_id: i64) -> Result<AnalysisOutcome, AnalysisError> {
    let service = state.analysis.clone();
    match tokio::spawn(async move { service.request_analysis(startup_id).await }).await {
        Ok(result) => result,
        Err(e) => {
            let reason = if e.is_panic() {
                "analysis task panicked".to_string()
            } else {
                format!("analysis task aborted: {e}")
            };
            state.analysis.record_aborted_run(startup_id, &reason).await;
            Err(AnalysisError::Aborted(reason))
        }
    }
}

fn rejected_body(trace_id: &str, rejection: &JsonRejection) -> Response {
    tracing::warn!(status = %rejection.status(), error = %rejection.body_text(), "Rejected request body");
    error_response(
        StatusCode::BAD_REQUEST,
        trace_id,
        "bad_request",
        &format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn analysis_success(trace_id: &str, outcome: AnalysisOutcome) -> Response {
    success_response(
        StatusCode::OK,
        trace_id,
        AnalysisRequestResponse {
            message: "Analysis completed successfully".to_string(),
            startup_id: outcome.startup_id,
            analysis: outcome.analysis,
        },
    )
}

/// Analyze a startup profile with the configured AI provider.
///
/// On any failure after the run started, the profile is left in `failed`
/// with the error message stored in `ai_analysis.error`.
#[utoipa::path(
    post,
    path = "/v1/analysis/request",
    tag = "Analysis",
    request_body = AnalysisRequestBody,
    responses(
        (status = 200, description = "Analysis completed", body = AnalysisRequestResponse),
        (status = 400, description = "Invalid startup id or request body", body = ApiError),
        (status = 404, description = "Startup not found", body = ApiError),
        (status = 409, description = "Analysis already in progress", body = ApiError),
        (status = 500, description = "Provider, parse or persistence failure", body = ApiError)
    )
)]
async fn request_analysis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Result<Json<AnalysisRequestBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(&trace_id, &rejection),
    };
    let startup_id = match parse_startup_id(&body.startup_id) {
        Ok(id) => id,
        Err(e) => return analysis_error_response(&trace_id, &e),
    };
    match run_detached(&state, startup_id).await {
        Ok(outcome) => analysis_success(&trace_id, outcome),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

/// Database insert hook. Only `INSERT` events on the `startups` table start
/// an analysis; anything else is acknowledged and ignored.
#[utoipa::path(
    post,
    path = "/v1/analysis/webhook",
    tag = "Analysis",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Analysis completed or event ignored", body = AnalysisRequestResponse),
        (status = 400, description = "Record id missing or body is not a webhook payload", body = ApiError),
        (status = 409, description = "Analysis already in progress", body = ApiError),
        (status = 500, description = "Provider, parse or persistence failure", body = ApiError)
    )
)]
async fn analysis_webhook(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected_body(&trace_id, &rejection),
    };
    if payload.kind != WEBHOOK_EVENT || payload.table.as_deref() != Some(WEBHOOK_TABLE) {
        tracing::info!(
            event = %payload.kind,
            table = ?payload.table,
            "Ignoring non-insert event or wrong table"
        );
        return success_empty_response(StatusCode::OK, &trace_id, "Ignoring event");
    }

    let id = payload
        .record
        .as_ref()
        .and_then(|r| r.get("id"))
        .cloned()
        .unwrap_or(Value::Null);
    let startup_id = match parse_startup_id(&id) {
        Ok(id) => id,
        Err(e) => return analysis_error_response(&trace_id, &e),
    };

    tracing::info!(startup_id, "Analysis triggered by insert event");
    match run_detached(&state, startup_id).await {
        Ok(outcome) => analysis_success(&trace_id, outcome),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

async fn load_startup(state: &AppState, trace_id: &str, raw_id: &str) -> Result<StartupProfile, Response> {
    let id = parse_path_id(trace_id, "startup", raw_id)?;
    match state.store.get_startup(id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            trace_id,
            "not_found",
            &format!("Startup {id} not found"),
        )),
        Err(e) => Err(storage_error_response(trace_id, &e)),
    }
}

/// Current analysis state of a startup. Polling this endpoint is the
/// "check status" action: it only reads.
#[utoipa::path(
    get,
    path = "/v1/startups/{id}/analysis",
    tag = "Analysis",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Analysis view", body = AnalysisView),
        (status = 404, description = "Startup not found", body = ApiError)
    )
)]
async fn get_analysis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match load_startup(&state, &trace_id, &id).await {
        Ok(profile) => success_response(StatusCode::OK, &trace_id, AnalysisView::from_profile(&profile)),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    get,
    path = "/v1/startups/{id}/analysis/report",
    tag = "Analysis",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "HTML analysis report", content_type = "text/html", body = String),
        (status = 404, description = "Startup not found", body = ApiError)
    )
)]
async fn get_analysis_report(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match load_startup(&state, &trace_id, &id).await {
        Ok(profile) => {
            let view = AnalysisView::from_profile(&profile);
            let html = render_html(&view, &profile.details.name);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response()
        }
        Err(resp) => resp,
    }
}

/// Ask the model for a 0-100 funding readiness score and store it.
#[utoipa::path(
    post,
    path = "/v1/startups/{id}/readiness-score",
    tag = "Analysis",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Score (null when the reply had no number)", body = ReadinessScoreResponse),
        (status = 404, description = "Startup not found", body = ApiError),
        (status = 500, description = "Provider or persistence failure", body = ApiError)
    )
)]
async fn calculate_readiness_score(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let startup_id = match parse_path_id(&trace_id, "startup", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.analysis.calculate_readiness_score(startup_id).await {
        Ok(score) => success_response(
            StatusCode::OK,
            &trace_id,
            ReadinessScoreResponse {
                startup_id,
                funding_readiness_score: score,
                band: score.map(ReadinessBand::from_score),
            },
        ),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

/// Generate investor-facing insights, replacing any stored ones.
#[utoipa::path(
    post,
    path = "/v1/startups/{id}/insights",
    tag = "Analysis",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Generated insights", body = Vec<AIInsight>),
        (status = 404, description = "Startup not found", body = ApiError),
        (status = 500, description = "Provider, parse or persistence failure", body = ApiError)
    )
)]
async fn generate_insights(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let startup_id = match parse_path_id(&trace_id, "startup", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.analysis.generate_insights(startup_id).await {
        Ok(insights) => success_response(StatusCode::OK, &trace_id, insights),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

#[utoipa::path(
    get,
    path = "/v1/startups/{id}/insights",
    tag = "Analysis",
    params(("id" = String, Path, description = "Startup id")),
    responses(
        (status = 200, description = "Stored insights", body = Vec<AIInsight>),
        (status = 404, description = "Startup not found", body = ApiError)
    )
)]
async fn list_insights(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let profile = match load_startup(&state, &trace_id, &id).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    match state.store.list_insights(profile.id).await {
        Ok(insights) => success_response(StatusCode::OK, &trace_id, insights),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Rank startups for an investor. Candidates are pre-filtered by the
/// investor's industry, geography and stage preferences before the model
/// scores them; at most 10 are returned, best match first.
#[utoipa::path(
    post,
    path = "/v1/investors/{id}/suggestions",
    tag = "Investors",
    params(("id" = String, Path, description = "Investor id")),
    responses(
        (status = 200, description = "Suggested startups", body = Vec<StartupSuggestion>),
        (status = 404, description = "Investor not found", body = ApiError),
        (status = 500, description = "Provider, parse or persistence failure", body = ApiError)
    )
)]
async fn suggest_startups(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let investor_id = match parse_path_id(&trace_id, "investor", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.analysis.suggest_startups(investor_id).await {
        Ok(suggestions) => success_response(StatusCode::OK, &trace_id, suggestions),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

/// Chat with the RISE assistant about a startup or investor profile.
#[utoipa::path(
    post,
    path = "/v1/assistant/chat",
    tag = "Assistant",
    request_body = AssistantRequestBody,
    responses(
        (status = 200, description = "Assistant reply", body = AssistantReply),
        (status = 400, description = "Empty conversation or unreadable body", body = ApiError),
        (status = 404, description = "Startup or investor not found", body = ApiError),
        (status = 500, description = "Provider failure", body = ApiError)
    )
)]
async fn assistant_chat(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    body: Result<Json<AssistantRequestBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(&trace_id, &rejection),
    };
    match state
        .analysis
        .assistant_reply(body.messages, body.startup_id, body.investor_id)
        .await
    {
        Ok(message) => success_response(StatusCode::OK, &trace_id, AssistantReply { message }),
        Err(e) => analysis_error_response(&trace_id, &e),
    }
}

pub fn analysis_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(request_analysis))
        .routes(routes!(analysis_webhook))
        .routes(routes!(get_analysis))
        .routes(routes!(get_analysis_report))
        .routes(routes!(calculate_readiness_score))
        .routes(routes!(generate_insights, list_insights))
        .routes(routes!(suggest_startups))
        .routes(routes!(assistant_chat))
}
