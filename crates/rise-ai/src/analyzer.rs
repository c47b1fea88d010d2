use anyhow::Result;
use async_trait::async_trait;
use rise_common::types::ChatTurn;

/// A single prompt submission to a generative-text model. `prompt` is always
/// sent last, as a user turn, after the optional system instruction and any
/// earlier conversation turns.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub history: Vec<ChatTurn>,
    /// Falls back to the provider's configured temperature when `None`.
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Ask the model to answer with a bare JSON object.
    pub json_response: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            history: Vec::new(),
            temperature: None,
            max_tokens: None,
            json_response: false,
        }
    }

    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system = Some(instruction.into());
        self
    }

    pub fn history(mut self, turns: Vec<ChatTurn>) -> Self {
        self.history = turns;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self, json_response: bool) -> Self {
        self.json_response = json_response;
        self
    }
}

/// Generative-text backend used by the analysis workflow.
///
/// Implementations are injected into the handler at construction time, so a
/// test can substitute a scripted fake for the network client.
#[async_trait]
pub trait AIAnalyzer: Send + Sync {
    /// Provider name, e.g. `openai`.
    fn provider(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Submits the prompt and returns the raw text of the first choice.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Cheap readiness check reported by `/v1/health`. Must not call the
    /// model.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_options() {
        let req = GenerationRequest::new("p")
            .temperature(0.1)
            .max_tokens(15)
            .json(true);
        assert_eq!(req.prompt, "p");
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(req.max_tokens, Some(15));
        assert!(req.json_response);
        assert!(req.system.is_none());
        assert!(req.history.is_empty());
    }

    #[test]
    fn builder_sets_conversation() {
        let req = GenerationRequest::new("and now?")
            .system("be brief")
            .history(vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")]);
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.history.len(), 2);
    }
}
