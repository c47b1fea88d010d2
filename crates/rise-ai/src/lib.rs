//! Generative-text seam of the analysis workflow: the [`AIAnalyzer`] trait,
//! an OpenAI-compatible provider, prompt templates and tolerant parsing of
//! model output.

pub mod analyzer;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod providers;

pub use analyzer::{AIAnalyzer, GenerationRequest};
pub use parse::{parse_analysis_response, ParsedAnalysis};
pub use providers::openai::OpenAICompatibleProvider;
