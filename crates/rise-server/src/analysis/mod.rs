//! Startup analysis: the request handler, its HTTP routes and the
//! status-driven presentation of the stored result.

pub mod api;
pub mod handler;
pub mod presentation;

pub use handler::{AnalysisError, AnalysisOptions, AnalysisOutcome, AnalysisService};
pub use presentation::{render_html, AnalysisView};
