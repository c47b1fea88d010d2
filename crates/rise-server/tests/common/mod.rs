#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use rise_ai::{AIAnalyzer, GenerationRequest};
use rise_server::analysis::AnalysisOptions;
use rise_server::app;
use rise_server::config::ServerConfig;
use rise_server::state::AppState;
use rise_storage::SqliteProfileStore;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

/// Analyzer double: answers from a queue of scripted replies, optionally
/// after a delay, and records every request it receives.
pub struct FakeAnalyzer {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    delay: Option<Duration>,
    panics: bool,
    healthy: bool,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: None,
            panics: false,
            healthy: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every `generate` call panics after recording the request.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Queues a reply on an analyzer already shared with the app.
    pub fn push_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AIAnalyzer for FakeAnalyzer {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("fake analyzer crashed mid-request");
        }
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(anyhow::anyhow!("fake provider is down"))
        }
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteProfileStore>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context(analyzer: FakeAnalyzer) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteProfileStore::open(temp_dir.path())?);
    let analyzer = Arc::new(analyzer);

    let config = ServerConfig {
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        ..Default::default()
    };

    let state = AppState::new(
        store.clone(),
        analyzer.clone(),
        AnalysisOptions::default(),
        config,
    );
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        store,
        analyzer,
        state,
        app,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.unwrap_or(Value::Null).to_string()))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should succeed");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("X-Trace-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value, trace_id)
}

/// Sends `body` verbatim, with the given content type if any.
pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    let req = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should succeed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn request_text(app: &axum::Router, uri: &str) -> (StatusCode, String, Option<String>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should succeed");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, String::from_utf8_lossy(&bytes).to_string(), content_type)
}

pub fn assert_ok(status: StatusCode, body: &Value) {
    assert!(
        status.is_success(),
        "unexpected status {status}, body: {body}"
    );
    assert_eq!(body["err_code"], 0, "unexpected body: {body}");
}

pub async fn create_startup(app: &axum::Router, name: &str) -> i64 {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/startups",
        Some(json!({
            "name": name,
            "industry": "Fintech",
            "num_customers": 12,
            "annual_revenue": 250000.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    body["data"]["id"].as_i64().expect("created startup should have an id")
}

pub async fn create_investor(app: &axum::Router, name: &str) -> i64 {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/investors",
        Some(json!({
            "full_name": name,
            "company_name": "Seed Partners",
            "job_title": "Partner",
            "investor_type": "VC",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    body["data"]["id"].as_i64().expect("created investor should have an id")
}
