//! Boundary between raw model text and typed data.
//!
//! Model output is never trusted: it may be fenced in markdown, wrapped in
//! prose, or not JSON at all. Everything here returns a tagged result or an
//! empty value instead of failing.

use rise_common::analysis::{clamp_score, AnalysisDocument};
use rise_common::types::{InsightCategory, InsightDraft, InsightSeverity, SuggestionDraft};
use serde_json::{Map, Value};

/// Outcome of parsing the analysis text returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnalysis {
    /// The text held a JSON object. `value` is stored as-is; `document` is
    /// its normalized form.
    Parsed {
        value: Map<String, Value>,
        document: AnalysisDocument,
    },
    /// The text did not hold a JSON object. `raw` is kept for logging.
    Malformed { reason: String, raw: String },
}

/// Parses the analysis response, tolerating a surrounding code fence or
/// prose around the JSON object.
///
/// # Examples
///
/// ```
/// use rise_ai::parse::{parse_analysis_response, ParsedAnalysis};
///
/// let parsed = parse_analysis_response("```json\n{\"executive_summary\":\"x\"}\n```");
/// let ParsedAnalysis::Parsed { value, .. } = parsed else { panic!("should parse") };
/// assert_eq!(serde_json::Value::Object(value), serde_json::json!({"executive_summary": "x"}));
///
/// assert!(matches!(
///     parse_analysis_response("sorry, I cannot help"),
///     ParsedAnalysis::Malformed { .. }
/// ));
/// ```
pub fn parse_analysis_response(raw: &str) -> ParsedAnalysis {
    let malformed = |reason: String| ParsedAnalysis::Malformed {
        reason,
        raw: raw.to_string(),
    };

    let candidate = strip_code_fence(raw);
    if candidate.is_empty() {
        return malformed("empty response".to_string());
    }

    let first_error = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(value)) => return parsed(value),
        Ok(other) => format!("expected a JSON object, got {}", json_kind(&other)),
        Err(e) => format!("invalid JSON: {e}"),
    };

    // Fall back to the outermost object when the model wrapped it in prose.
    if let Some(span) = delimited_span(candidate, '{', '}') {
        if let Ok(Value::Object(value)) = serde_json::from_str::<Value>(span) {
            return parsed(value);
        }
    }

    malformed(first_error)
}

fn parsed(value: Map<String, Value>) -> ParsedAnalysis {
    let document = AnalysisDocument::from_map(&value);
    ParsedAnalysis::Parsed { value, document }
}

/// Extracts a 0-100 score from a free-text reply: the first run of digits,
/// clamped into range. Returns `None` when the reply has no digits.
///
/// # Examples
///
/// ```
/// use rise_ai::parse::extract_readiness_score;
///
/// assert_eq!(extract_readiness_score("Score: 72"), Some(72));
/// assert_eq!(extract_readiness_score("250"), Some(100));
/// assert_eq!(extract_readiness_score("unknown"), None);
/// ```
pub fn extract_readiness_score(raw: &str) -> Option<u8> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let digits: String = raw[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let value = digits.parse::<f64>().ok()?;
    Some(clamp_score(value))
}

/// Parses the insights reply: a JSON array of objects, or an object with an
/// `insights` array. Entries without a title or summary are skipped.
pub fn parse_insights_response(raw: &str) -> Vec<InsightDraft> {
    let candidate = strip_code_fence(raw);

    let value = serde_json::from_str::<Value>(candidate).ok().or_else(|| {
        delimited_span(candidate, '[', ']').and_then(|span| serde_json::from_str(span).ok())
    });

    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut map)) => match map.remove("insights") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let title = non_empty(item.get("title"))?;
            let summary = non_empty(item.get("summary"))?;
            let category = non_empty(item.get("category"))
                .and_then(|c| c.parse::<InsightCategory>().ok())
                .unwrap_or(InsightCategory::Recommendation);
            let severity =
                non_empty(item.get("severity")).and_then(|s| s.parse::<InsightSeverity>().ok());
            Some(InsightDraft {
                title,
                summary,
                category,
                severity,
            })
        })
        .collect()
}

/// Parses the matchmaking reply: a JSON array, or an object with a
/// `suggestions` array. Both camelCase and snake_case keys are read, and ids
/// may arrive as numeric strings. Entries without a usable id are skipped.
///
/// Returns `None` when the reply holds no array at all, which callers treat
/// as a malformed response rather than "no matches".
///
/// # Examples
///
/// ```
/// use rise_ai::parse::parse_suggestions_response;
///
/// let drafts = parse_suggestions_response(r#"[{"id": "4", "matchScore": 88}]"#).unwrap();
/// assert_eq!(drafts[0].startup_id, 4);
/// assert_eq!(drafts[0].match_score, 88);
/// assert!(parse_suggestions_response("no matches today").is_none());
/// ```
pub fn parse_suggestions_response(raw: &str) -> Option<Vec<SuggestionDraft>> {
    let candidate = strip_code_fence(raw);

    let value = serde_json::from_str::<Value>(candidate).ok().or_else(|| {
        delimited_span(candidate, '[', ']').and_then(|span| serde_json::from_str(span).ok())
    });

    let items = match value? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("suggestions") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let drafts = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let startup_id = id_field(item.get("id").or_else(|| item.get("startup_id")))?;
            let match_score = item
                .get("matchScore")
                .or_else(|| item.get("match_score"))
                .and_then(number_like)
                .map(clamp_score)
                .unwrap_or(0);
            let highlights = match item.get("highlights") {
                Some(Value::Array(values)) => values
                    .iter()
                    .filter_map(|v| non_empty(Some(v)))
                    .collect(),
                Some(single) => non_empty(Some(single)).into_iter().collect(),
                None => Vec::new(),
            };
            let match_reason =
                non_empty(item.get("matchReason").or_else(|| item.get("match_reason")));
            Some(SuggestionDraft {
                startup_id,
                match_score,
                highlights,
                match_reason,
            })
        })
        .collect();
    Some(drafts)
}

fn id_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// Removes one surrounding triple-backtick fence, with or without a
/// language tag, and trims whitespace.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[idx + 1..]
        }
        _ => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
