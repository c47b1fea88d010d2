mod common;

use axum::http::StatusCode;
use common::{assert_ok, build_test_context, create_investor, create_startup, request_json, FakeAnalyzer};
use serde_json::json;

#[tokio::test]
async fn health_reports_model_and_storage() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();

    let (status, body, trace_id) = request_json(&ctx.app, "GET", "/v1/health", None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"]["ai_model"], "fake/fake-model");
    assert_eq!(body["data"]["storage_status"], "ok");
    assert_eq!(body["data"]["ai_status"], "ok");
    assert_eq!(body["trace_id"].as_str(), trace_id.as_deref());
}

#[tokio::test]
async fn health_reports_unavailable_provider_without_calling_it() {
    let ctx = build_test_context(FakeAnalyzer::new().unhealthy()).unwrap();

    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/health", None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"]["ai_status"], "unavailable");
    assert_eq!(body["data"]["storage_status"], "ok");
    assert_eq!(ctx.analyzer.call_count(), 0);
}

#[tokio::test]
async fn startup_crud_and_pagination() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();
    let first = create_startup(&ctx.app, "Acme").await;
    let second = create_startup(&ctx.app, "Globex").await;
    let third = create_startup(&ctx.app, "Initech").await;

    let (status, body, _) =
        request_json(&ctx.app, "GET", &format!("/v1/startups/{second}"), None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"]["name"], "Globex");
    assert_eq!(body["data"]["num_customers"], 12);
    assert!(body["data"]["analysis_status"].is_null());

    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/startups?limit=2", None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["limit"], 2);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], third);

    let (status, body, _) =
        request_json(&ctx.app, "GET", "/v1/startups?limit=2&offset=2", None).await;
    assert_ok(status, &body);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], first);
}

#[tokio::test]
async fn startup_validation_and_lookup_errors() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();

    let (status, body, _) =
        request_json(&ctx.app, "POST", "/v1/startups", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err_code"], 1001);

    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/startups/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err_code"], 1001);

    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/startups/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err_code"], 1004);
}

#[tokio::test]
async fn investor_crud() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();
    let id = create_investor(&ctx.app, "Dana Reyes").await;

    let (status, body, _) = request_json(&ctx.app, "GET", &format!("/v1/investors/{id}"), None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"]["full_name"], "Dana Reyes");
    assert_eq!(body["data"]["investor_type"], "VC");

    let (status, body, _) = request_json(&ctx.app, "GET", "/v1/investors", None).await;
    assert_ok(status, &body);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/investors",
        Some(json!({ "full_name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err_code"], 1001);

    let (status, _, _) = request_json(&ctx.app, "GET", "/v1/investors/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn interested_investors_are_aggregated() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();
    let startup = create_startup(&ctx.app, "Acme").await;
    let curious = create_investor(&ctx.app, "Dana Reyes").await;
    let serious = create_investor(&ctx.app, "Sam Okafor").await;
    let uri = format!("/v1/startups/{startup}/interested-investors");

    let (status, body, _) =
        request_json(&ctx.app, "POST", &uri, Some(json!({ "investor_id": curious }))).await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");

    for kind in ["profile_view", "deck_view", "financials_view"] {
        let (status, body, _) = request_json(
            &ctx.app,
            "POST",
            &uri,
            Some(json!({ "investor_id": serious, "kind": kind })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "body: {body}");
    }

    let (status, body, _) = request_json(&ctx.app, "GET", &uri, None).await;
    assert_ok(status, &body);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let serious_row = items.iter().find(|i| i["id"] == serious).unwrap();
    assert_eq!(serious_row["view_count"], 3);
    assert_eq!(serious_row["has_viewed_deck"], true);
    assert_eq!(serious_row["has_viewed_financials"], true);
    assert_eq!(serious_row["interest_level"], "High");
    assert_eq!(serious_row["name"], "Sam Okafor");

    let curious_row = items.iter().find(|i| i["id"] == curious).unwrap();
    assert_eq!(curious_row["view_count"], 1);
    assert_eq!(curious_row["interest_level"], "Low");
}

#[tokio::test]
async fn interest_for_unknown_rows_is_not_found() {
    let ctx = build_test_context(FakeAnalyzer::new()).unwrap();
    let startup = create_startup(&ctx.app, "Acme").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/startups/{startup}/interested-investors"),
        Some(json!({ "investor_id": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err_code"], 1004);

    let (status, _, _) =
        request_json(&ctx.app, "GET", "/v1/startups/999/interested-investors", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
