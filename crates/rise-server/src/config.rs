use crate::analysis::AnalysisOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when `ai.api_key` is not set in the file.
pub const API_KEY_ENV: &str = "RISE_AI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Only OpenAI-compatible chat completion endpoints are supported.
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Temperature of the main analysis call.
    #[serde(default = "default_ai_temperature")]
    pub temperature: f32,
    /// Request a bare JSON object via `response_format`.
    #[serde(default = "default_json_response")]
    pub json_response: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: default_ai_timeout_secs(),
            max_tokens: None,
            temperature: default_ai_temperature(),
            json_response: default_json_response(),
        }
    }
}

impl AiConfig {
    /// The configured key, or the one from [`API_KEY_ENV`].
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
    }
}

fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| from_env.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// A run stuck in `processing` longer than this may be restarted.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            cors_allowed_origins: Vec::new(),
            ai: AiConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_ai_provider() -> String {
    "openai".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    120
}

fn default_ai_temperature() -> f32 {
    0.7
}

fn default_json_response() -> bool {
    true
}

fn default_stale_after_secs() -> u64 {
    600
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            temperature: self.ai.temperature,
            max_tokens: self.ai.max_tokens,
            json_response: self.ai.json_response,
            stale_after: chrono::Duration::seconds(
                self.analysis.stale_after_secs.min(u64::from(u32::MAX)) as i64,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.timeout_secs, 120);
        assert!(config.ai.json_response);
        assert_eq!(config.analysis.stale_after_secs, 600);
    }

    #[test]
    fn full_file_parses() {
        let config: ServerConfig = toml::from_str(
            r#"
            http_port = 9000
            data_dir = "/var/lib/rise"
            cors_allowed_origins = ["https://app.example.com"]

            [ai]
            provider = "openai"
            api_key = "sk-file"
            base_url = "https://llm.internal/v1"
            model = "gpt-4o"
            timeout_secs = 30
            max_tokens = 4096
            temperature = 0.5
            json_response = false

            [analysis]
            stale_after_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.cors_allowed_origins.len(), 1);
        assert_eq!(config.ai.model.as_deref(), Some("gpt-4o"));

        let options = config.analysis_options();
        assert_eq!(options.temperature, 0.5);
        assert_eq!(options.max_tokens, Some(4096));
        assert!(!options.json_response);
        assert_eq!(options.stale_after, chrono::Duration::seconds(120));
    }

    #[test]
    fn api_key_prefers_file_then_env() {
        assert_eq!(
            resolve_api_key(Some("sk-file"), Some("sk-env".to_string())).as_deref(),
            Some("sk-file")
        );
        assert_eq!(
            resolve_api_key(Some("  "), Some("sk-env".to_string())).as_deref(),
            Some("sk-env")
        );
        assert_eq!(resolve_api_key(None, None), None);
        assert_eq!(resolve_api_key(None, Some(String::new())), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ServerConfig::load("/nonexistent/rise.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rise.toml"));
    }
}
