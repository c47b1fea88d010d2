//! The analysis workflow: load the profile, claim the row, ask the model,
//! parse, persist.
//!
//! Once a run has moved the row to `processing`, every exit path writes a
//! terminal status. Failures after the claim are recorded with
//! [`ProfileStore::fail_analysis`] before the error is returned.

use chrono::{DateTime, Duration, Utc};
use rise_ai::parse::{extract_readiness_score, parse_insights_response, parse_suggestions_response};
use rise_ai::prompt::{
    build_analysis_prompt, build_assistant_system_prompt, build_insights_prompt,
    build_readiness_prompt, build_suggestions_prompt, AssistantContext,
};
use rise_ai::{parse_analysis_response, AIAnalyzer, GenerationRequest, ParsedAnalysis};
use rise_common::analysis::AnalysisDocument;
use rise_common::types::{
    AIInsight, AnalysisStatus, ChatRole, ChatTurn, StartupProfile, StartupSuggestion,
};
use rise_storage::{BeginOutcome, ProfileStore};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const READINESS_TEMPERATURE: f32 = 0.1;
const READINESS_MAX_TOKENS: usize = 15;
const INSIGHTS_TEMPERATURE: f32 = 0.6;
const SUGGESTION_POOL: usize = 500;
const MAX_SUGGESTION_CANDIDATES: usize = 100;
const MAX_SUGGESTIONS: usize = 10;
const ASSISTANT_TEMPERATURE: f32 = 0.7;
const ASSISTANT_FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";
const MAX_LOGGED_RESPONSE_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid startup id: {0}")]
    InvalidStartupId(String),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Startup {0} not found")]
    NotFound(i64),

    #[error("Investor {0} not found")]
    InvestorNotFound(i64),

    #[error("Analysis already in progress for startup {startup_id}")]
    AlreadyInProgress {
        startup_id: i64,
        since: Option<DateTime<Utc>>,
    },

    #[error("AI provider request failed: {0}")]
    UpstreamError(String),

    #[error("AI response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("Failed to persist analysis: {0}")]
    PersistenceError(String),

    #[error("Analysis aborted: {0}")]
    Aborted(String),
}

/// Accepts a positive integer id given either as a JSON number or as a
/// numeric string.
///
/// # Examples
///
/// ```
/// use rise_server::analysis::handler::parse_startup_id;
/// use serde_json::json;
///
/// assert_eq!(parse_startup_id(&json!(7)).unwrap(), 7);
/// assert_eq!(parse_startup_id(&json!(" 12 ")).unwrap(), 12);
/// assert!(parse_startup_id(&json!("abc")).is_err());
/// assert!(parse_startup_id(&json!(null)).is_err());
/// ```
pub fn parse_startup_id(value: &Value) -> Result<i64, AnalysisError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| AnalysisError::InvalidStartupId(n.to_string())),
        Value::String(s) => parse_startup_id_str(s),
        other => Err(AnalysisError::InvalidStartupId(other.to_string())),
    }
}

pub fn parse_startup_id_str(raw: &str) -> Result<i64, AnalysisError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AnalysisError::InvalidStartupId(raw.to_string()))
}

/// Model settings for the main analysis call plus the stale-run window.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub json_response: bool,
    /// A `processing` row older than this is treated as abandoned.
    pub stale_after: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            json_response: true,
            stale_after: Duration::minutes(10),
        }
    }
}

/// A completed analysis: the object as the model produced it, and its
/// normalized form.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub startup_id: i64,
    pub analysis: Map<String, Value>,
    pub document: AnalysisDocument,
}

pub struct AnalysisService<S: ?Sized, A: ?Sized> {
    store: Arc<S>,
    analyzer: Arc<A>,
    options: AnalysisOptions,
}

impl<S, A> AnalysisService<S, A>
where
    S: ProfileStore + ?Sized,
    A: AIAnalyzer + ?Sized,
{
    pub fn new(store: Arc<S>, analyzer: Arc<A>, options: AnalysisOptions) -> Self {
        Self {
            store,
            analyzer,
            options,
        }
    }

    /// Runs one analysis of the startup and stores the result.
    pub async fn request_analysis(&self, startup_id: i64) -> Result<AnalysisOutcome, AnalysisError> {
        let profile = self
            .store
            .get_startup(startup_id)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?
            .ok_or(AnalysisError::NotFound(startup_id))?;

        match self
            .store
            .try_begin_analysis(startup_id, self.options.stale_after)
            .await
        {
            Ok(BeginOutcome::Started) => {}
            Ok(BeginOutcome::AlreadyProcessing { since }) => {
                tracing::info!(
                    startup_id,
                    since = ?since,
                    "Analysis already in progress, rejecting request"
                );
                return Err(AnalysisError::AlreadyInProgress { startup_id, since });
            }
            Ok(BeginOutcome::NotFound) => return Err(AnalysisError::NotFound(startup_id)),
            Err(e) => {
                tracing::warn!(
                    startup_id,
                    error = %e,
                    "Failed to mark analysis as processing, continuing"
                );
            }
        }

        tracing::info!(
            startup_id,
            provider = self.analyzer.provider(),
            model = self.analyzer.model_name(),
            "Starting startup analysis"
        );
        let start = Instant::now();

        match self.run_analysis(&profile).await {
            Ok(outcome) => {
                tracing::info!(
                    startup_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    sections = outcome.analysis.len(),
                    "Startup analysis completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(
                    startup_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "Startup analysis failed"
                );
                if let Err(e) = self.store.fail_analysis(startup_id, &err.to_string()).await {
                    tracing::error!(
                        startup_id,
                        error = %e,
                        "Failed to record analysis failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_analysis(&self, profile: &StartupProfile) -> Result<AnalysisOutcome, AnalysisError> {
        let mut request = GenerationRequest::new(build_analysis_prompt(profile))
            .temperature(self.options.temperature)
            .json(self.options.json_response);
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.max_tokens(max_tokens);
        }

        let raw = self
            .analyzer
            .generate(&request)
            .await
            .map_err(|e| AnalysisError::UpstreamError(format!("{e:#}")))?;

        let (analysis, document) = match parse_analysis_response(&raw) {
            ParsedAnalysis::Parsed { value, document } => (value, document),
            ParsedAnalysis::Malformed { reason, raw } => {
                tracing::warn!(
                    startup_id = profile.id,
                    reason = %reason,
                    raw = %truncate_chars(&raw, MAX_LOGGED_RESPONSE_CHARS),
                    "AI analysis response is not a JSON object"
                );
                return Err(AnalysisError::MalformedResponse(reason));
            }
        };

        self.store
            .complete_analysis(profile.id, &Value::Object(analysis.clone()))
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?;

        Ok(AnalysisOutcome {
            startup_id: profile.id,
            analysis,
            document,
        })
    }

    /// Asks the model for a bare 0-100 funding readiness score and stores
    /// it. A reply without a number clears the stored score.
    pub async fn calculate_readiness_score(&self, startup_id: i64) -> Result<Option<u8>, AnalysisError> {
        let profile = self.load(startup_id).await?;

        let request = GenerationRequest::new(build_readiness_prompt(&profile))
            .temperature(READINESS_TEMPERATURE)
            .max_tokens(READINESS_MAX_TOKENS);
        let raw = self
            .analyzer
            .generate(&request)
            .await
            .map_err(|e| AnalysisError::UpstreamError(format!("{e:#}")))?;

        let score = extract_readiness_score(&raw);
        if score.is_none() {
            tracing::warn!(
                startup_id,
                raw = %truncate_chars(&raw, MAX_LOGGED_RESPONSE_CHARS),
                "Readiness reply contained no score"
            );
        }

        self.store
            .set_readiness_score(startup_id, score)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?;
        tracing::info!(startup_id, score = ?score, "Funding readiness score updated");
        Ok(score)
    }

    /// Generates investor-facing insights and replaces the stored set.
    pub async fn generate_insights(&self, startup_id: i64) -> Result<Vec<AIInsight>, AnalysisError> {
        let profile = self.load(startup_id).await?;

        let request = GenerationRequest::new(build_insights_prompt(&profile))
            .temperature(INSIGHTS_TEMPERATURE);
        let raw = self
            .analyzer
            .generate(&request)
            .await
            .map_err(|e| AnalysisError::UpstreamError(format!("{e:#}")))?;

        let drafts = parse_insights_response(&raw);
        if drafts.is_empty() {
            tracing::warn!(
                startup_id,
                raw = %truncate_chars(&raw, MAX_LOGGED_RESPONSE_CHARS),
                "Insights reply contained no usable insights"
            );
            return Err(AnalysisError::MalformedResponse(
                "no insights in response".to_string(),
            ));
        }

        let stored = self
            .store
            .replace_insights(startup_id, &drafts)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?;
        tracing::info!(startup_id, count = stored.len(), "AI insights generated");
        Ok(stored)
    }

    /// Records a run that ended without returning, such as a panicked task.
    /// Only a row still in `processing` is touched.
    pub async fn record_aborted_run(&self, startup_id: i64, reason: &str) {
        let status = match self.store.get_startup(startup_id).await {
            Ok(Some(profile)) => profile.analysis_status,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(startup_id, error = %e, "Failed to load aborted analysis");
                return;
            }
        };
        if status != Some(AnalysisStatus::Processing) {
            return;
        }
        tracing::error!(startup_id, reason, "Analysis run aborted, marking failed");
        if let Err(e) = self.store.fail_analysis(startup_id, reason).await {
            tracing::error!(startup_id, error = %e, "Failed to record analysis failure");
        }
    }

    /// Ranks startups for one investor. Candidates are pre-filtered by the
    /// investor's preferences; the model's picks are kept only when they
    /// name a candidate, deduplicated, sorted by score and capped at 10.
    pub async fn suggest_startups(
        &self,
        investor_id: i64,
    ) -> Result<Vec<StartupSuggestion>, AnalysisError> {
        let investor = self
            .store
            .get_investor(investor_id)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?
            .ok_or(AnalysisError::InvestorNotFound(investor_id))?;

        let candidates: Vec<StartupProfile> = self
            .store
            .list_startups(SUGGESTION_POOL, 0)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?
            .into_iter()
            .filter(|s| investor.details.accepts(&s.details))
            .take(MAX_SUGGESTION_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            tracing::info!(investor_id, "No startups match investor preferences");
            return Ok(Vec::new());
        }

        let request = GenerationRequest::new(build_suggestions_prompt(&investor, &candidates))
            .temperature(self.options.temperature);
        let raw = self
            .analyzer
            .generate(&request)
            .await
            .map_err(|e| AnalysisError::UpstreamError(format!("{e:#}")))?;

        let Some(mut drafts) = parse_suggestions_response(&raw) else {
            tracing::warn!(
                investor_id,
                raw = %truncate_chars(&raw, MAX_LOGGED_RESPONSE_CHARS),
                "Suggestions reply is not a JSON array"
            );
            return Err(AnalysisError::MalformedResponse(
                "AI returned invalid JSON format for suggestions".to_string(),
            ));
        };

        drafts.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        let mut seen = HashSet::new();
        let suggestions: Vec<StartupSuggestion> = drafts
            .into_iter()
            .filter(|d| seen.insert(d.startup_id))
            .filter_map(|d| {
                let profile = candidates.iter().find(|c| c.id == d.startup_id)?;
                Some(StartupSuggestion::new(profile, d))
            })
            .take(MAX_SUGGESTIONS)
            .collect();

        tracing::info!(
            investor_id,
            candidates = candidates.len(),
            suggestions = suggestions.len(),
            "Investor suggestions generated"
        );
        Ok(suggestions)
    }

    /// Answers the last user turn of a conversation. The system instruction
    /// is built from the startup or investor profile when one is named;
    /// client-sent `system` turns are dropped.
    pub async fn assistant_reply(
        &self,
        messages: Vec<ChatTurn>,
        startup_id: Option<i64>,
        investor_id: Option<i64>,
    ) -> Result<String, AnalysisError> {
        let mut turns: Vec<ChatTurn> = messages
            .into_iter()
            .filter(|turn| turn.role != ChatRole::System)
            .collect();
        let question = match turns.pop() {
            Some(turn) if turn.role == ChatRole::User && !turn.content.trim().is_empty() => turn,
            Some(_) => {
                return Err(AnalysisError::InvalidConversation(
                    "the last message must be a non-empty user message".to_string(),
                ))
            }
            None => {
                return Err(AnalysisError::InvalidConversation(
                    "'messages' must hold at least one message".to_string(),
                ))
            }
        };

        let startup = match startup_id {
            Some(id) => Some(self.load(id).await?),
            None => None,
        };
        let investor = match (startup.is_none(), investor_id) {
            (true, Some(id)) => Some(
                self.store
                    .get_investor(id)
                    .await
                    .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?
                    .ok_or(AnalysisError::InvestorNotFound(id))?,
            ),
            _ => None,
        };
        let context = match (&startup, &investor) {
            (Some(s), _) => AssistantContext::Startup(s),
            (None, Some(i)) => AssistantContext::Investor(i),
            (None, None) => AssistantContext::Anonymous,
        };

        let request = GenerationRequest::new(question.content)
            .system(build_assistant_system_prompt(context, Utc::now()))
            .history(turns)
            .temperature(ASSISTANT_TEMPERATURE);
        let reply = self
            .analyzer
            .generate(&request)
            .await
            .map_err(|e| AnalysisError::UpstreamError(format!("{e:#}")))?;

        tracing::info!(
            startup_id,
            investor_id,
            history = request.history.len(),
            reply_chars = reply.chars().count(),
            "Assistant reply generated"
        );
        if reply.trim().is_empty() {
            return Ok(ASSISTANT_FALLBACK_REPLY.to_string());
        }
        Ok(reply)
    }

    async fn load(&self, startup_id: i64) -> Result<StartupProfile, AnalysisError> {
        self.store
            .get_startup(startup_id)
            .await
            .map_err(|e| AnalysisError::PersistenceError(e.to_string()))?
            .ok_or(AnalysisError::NotFound(startup_id))
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
