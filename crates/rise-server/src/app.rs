use crate::config::AiConfig;
use crate::state::AppState;
use crate::{analysis, api, logging, openapi};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use rise_ai::providers::openai::OpenAICompatibleProvider;
use rise_ai::AIAnalyzer;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RISE API",
        description = "Startup and investor profiles with AI-assisted startup analysis",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Startups", description = "Startup profiles"),
        (name = "Investors", description = "Investor profiles, interest tracking and startup suggestions"),
        (name = "Analysis", description = "AI analysis, readiness score and insights"),
        (name = "Assistant", description = "Conversational assistant for founders and investors")
    )
)]
struct ApiDoc;

/// Builds the generative-text client named by `[ai].provider`.
pub fn build_analyzer(ai: &AiConfig) -> anyhow::Result<Arc<dyn AIAnalyzer>> {
    match ai.provider.trim().to_lowercase().as_str() {
        "openai" | "openai_compatible" | "openai-compatible" => {
            let api_key = ai.resolved_api_key().unwrap_or_else(|| {
                tracing::warn!(
                    env = crate::config::API_KEY_ENV,
                    "No AI API key configured; analysis requests will fail upstream"
                );
                String::new()
            });
            let provider = OpenAICompatibleProvider::new(
                api_key,
                ai.model.clone(),
                ai.base_url.clone(),
                Some(ai.timeout_secs),
                ai.max_tokens,
                Some(ai.temperature),
            )?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("Unsupported AI provider '{other}'"),
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (analysis_router, analysis_spec) = analysis::api::analysis_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(analysis_spec);
    let spec = Arc::new(merged_spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    public_router
        .merge(analysis_router)
        .with_state(state)
        .merge(openapi::json_route(spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_provider_is_built() {
        let ai = AiConfig {
            api_key: Some("sk-test".to_string()),
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        let analyzer = build_analyzer(&ai).unwrap();
        assert_eq!(analyzer.provider(), "openai");
        assert_eq!(analyzer.model_name(), "gpt-4o");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let ai = AiConfig {
            provider: "gemini".to_string(),
            ..Default::default()
        };
        let err = build_analyzer(&ai).err().unwrap();
        assert!(err.to_string().contains("gemini"));
    }
}
