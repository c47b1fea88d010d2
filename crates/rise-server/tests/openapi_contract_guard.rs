mod common;

use anyhow::{anyhow, Result};
use common::{build_test_context, request_json, FakeAnalyzer};
use std::collections::BTreeSet;

#[tokio::test]
async fn openapi_paths_should_match_routed_endpoints() -> Result<()> {
    let ctx = build_test_context(FakeAnalyzer::new())?;
    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/openapi.json", None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["info"]["title"], "RISE API");

    let Some(paths) = body["paths"].as_object() else {
        return Err(anyhow!("openapi paths should be object"));
    };

    let mut exposed: BTreeSet<String> = BTreeSet::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else {
            return Err(anyhow!("path methods should be object for {path}"));
        };
        for method in methods.keys() {
            let method = method.to_ascii_uppercase();
            exposed.insert(format!("{method} {path}"));
        }
    }

    let covered: BTreeSet<String> = [
        "GET /v1/health",
        "POST /v1/startups",
        "GET /v1/startups",
        "GET /v1/startups/{id}",
        "POST /v1/investors",
        "GET /v1/investors",
        "GET /v1/investors/{id}",
        "POST /v1/investors/{id}/suggestions",
        "POST /v1/startups/{id}/interested-investors",
        "GET /v1/startups/{id}/interested-investors",
        "POST /v1/analysis/request",
        "POST /v1/analysis/webhook",
        "POST /v1/assistant/chat",
        "GET /v1/startups/{id}/analysis",
        "GET /v1/startups/{id}/analysis/report",
        "POST /v1/startups/{id}/readiness-score",
        "POST /v1/startups/{id}/insights",
        "GET /v1/startups/{id}/insights",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();

    let missing: Vec<_> = exposed.difference(&covered).collect();
    assert!(missing.is_empty(), "untested endpoints in openapi: {missing:?}");
    let stale: Vec<_> = covered.difference(&exposed).collect();
    assert!(stale.is_empty(), "endpoints missing from openapi: {stale:?}");
    Ok(())
}

#[tokio::test]
async fn every_response_carries_a_trace_id_header() -> Result<()> {
    let ctx = build_test_context(FakeAnalyzer::new())?;
    let (_, body, trace_id) = request_json(&ctx.app, "GET", "/v1/startups/1", None).await;
    let trace_id = trace_id.ok_or_else(|| anyhow!("X-Trace-Id header missing"))?;
    assert_eq!(trace_id.len(), 16);
    assert_eq!(body["trace_id"], trace_id.as_str());
    Ok(())
}
