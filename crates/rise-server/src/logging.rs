//! Per-request tracing: every request gets a trace id that is logged on
//! both the request and response lines, stored in request extensions for
//! the envelope, and returned in the `X-Trace-Id` header.

use crate::api::error_response;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

const TRACE_ID_LEN: usize = 16;
const MAX_BODY_LOG_CHARS: usize = 200;
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(TRACE_ID_LEN);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Reuses the caller's trace id when it has the same shape as ours, so a
/// webhook retry can be followed across both systems.
fn resolve_trace_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| id.len() == TRACE_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(generate_trace_id)
}

/// How much of a body may appear in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLog {
    Snippet,
    /// Only the size. Webhook records carry a whole startup row.
    SizeOnly,
    Omit,
}

fn request_body_log(method: &Method, path: &str) -> BodyLog {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        BodyLog::Omit
    } else if path == "/v1/analysis/webhook" {
        BodyLog::SizeOnly
    } else {
        BodyLog::Snippet
    }
}

/// The OpenAPI document is large and the HTML report is not JSON.
fn response_body_log(path: &str, headers: &HeaderMap) -> BodyLog {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json || path == "/v1/openapi.json" || path.ends_with("/analysis/report") {
        BodyLog::Omit
    } else {
        BodyLog::Snippet
    }
}

fn describe_body(bytes: &[u8], policy: BodyLog) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    match policy {
        BodyLog::Snippet => Some(truncate_body(bytes, MAX_BODY_LOG_CHARS)),
        BodyLog::SizeOnly => Some(format!("<{} bytes>", bytes.len())),
        BodyLog::Omit => None,
    }
}

/// Truncates to at most `max` bytes without splitting a character.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

/// Startup id of `/v1/startups/{id}` and its sub-resources, when numeric.
fn startup_id_of(path: &str) -> Option<i64> {
    path.strip_prefix("/v1/startups/")?
        .split('/')
        .next()?
        .parse()
        .ok()
}

/// Fields shared by the request and response lines.
struct RequestLine {
    trace_id: String,
    method: Method,
    url: String,
    startup_id: Option<i64>,
}

impl RequestLine {
    fn log_request(&self, user_agent: &str, body: Option<&str>) {
        tracing::info!(
            trace_id = %self.trace_id,
            method = %self.method,
            path = %self.url,
            startup_id = self.startup_id,
            body = body,
            ua = %user_agent,
            "--> request"
        );
    }

    fn log_response(&self, status: StatusCode, elapsed_ms: u64, body: Option<&str>) {
        let status_code = status.as_u16();
        let trace_id = &self.trace_id;
        let startup_id = self.startup_id;
        macro_rules! response_line {
            ($level:ident) => {
                tracing::$level!(
                    trace_id = %trace_id,
                    status = status_code,
                    startup_id,
                    elapsed_ms,
                    body = body,
                    "<-- response"
                )
            };
        }
        if status.is_server_error() {
            response_line!(error);
        } else if status.is_client_error() {
            response_line!(warn);
        } else {
            response_line!(info);
        }
    }
}

async fn buffer(body: Body, limit: usize) -> Result<Bytes, axum::Error> {
    axum::body::to_bytes(body, limit).await
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, val);
    }
    response
}

/// Request/response logging middleware.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = resolve_trace_id(req.headers());
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let path = req.uri().path().to_string();
    let line = RequestLine {
        trace_id: trace_id.clone(),
        method: req.method().clone(),
        url: match req.uri().query() {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.clone(),
        },
        startup_id: startup_id_of(&path),
    };
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let policy = request_body_log(&line.method, &path);
    let req = if policy == BodyLog::Omit {
        line.log_request(&user_agent, None);
        req
    } else {
        let (parts, body) = req.into_parts();
        let bytes = match buffer(body, MAX_REQUEST_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                line.log_request(&user_agent, None);
                tracing::warn!(trace_id = %trace_id, error = %e, "Request body rejected");
                let response = error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &trace_id,
                    "bad_request",
                    "Request body too large",
                );
                line.log_response(response.status(), 0, None);
                return with_trace_header(response, &trace_id);
            }
        };
        line.log_request(&user_agent, describe_body(&bytes, policy).as_deref());
        Request::from_parts(parts, Body::from(bytes))
    };

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let (parts, body) = response.into_parts();
    let bytes = buffer(body, usize::MAX).await.unwrap_or_default();
    let snippet = describe_body(&bytes, response_body_log(&path, &parts.headers));
    line.log_response(parts.status, elapsed_ms, snippet.as_deref());

    with_trace_header(Response::from_parts(parts, Body::from(bytes)), &trace_id)
}
