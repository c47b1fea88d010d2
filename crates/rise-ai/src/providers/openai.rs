use crate::analyzer::{AIAnalyzer, GenerationRequest};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rise_common::types::ChatRole;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Provider for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl OpenAICompatibleProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        max_tokens: Option<usize>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let timeout = timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client,
            max_tokens,
            temperature,
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.extend(request.history.iter().filter_map(|turn| match turn.role {
            ChatRole::User => Some(ChatMessage::user(turn.content.as_str())),
            ChatRole::Assistant => Some(ChatMessage::assistant(turn.content.as_str())),
            ChatRole::System => None,
        }));
        messages.push(ChatMessage::user(request.prompt.as_str()));

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens.or(self.max_tokens),
            response_format: request.json_response.then(ResponseFormat::json_object),
        }
    }
}

#[async_trait]
impl AIAnalyzer for OpenAICompatibleProvider {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let req = self.build_request(request);

        tracing::debug!(
            model = %self.model,
            prompt_length = request.prompt.len(),
            history = request.history.len(),
            json_response = request.json_response,
            "Calling chat completion API"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("Failed to send request to chat completion API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Chat completion request failed"
            );
            anyhow::bail!("Chat completion API error {}: {}", status, body);
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .context("Failed to decode chat completion response")?;

        tracing::debug!(
            usage = ?chat_resp.usage,
            "Chat completion response received"
        );

        chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Empty response from chat completion API"))
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("No API key configured for {}", self.base_url);
        }
        Ok(())
    }
}
