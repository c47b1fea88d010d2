use crate::analysis::{AnalysisOptions, AnalysisService};
use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use rise_ai::AIAnalyzer;
use rise_storage::ProfileStore;
use std::sync::Arc;

pub type SharedAnalysisService = AnalysisService<dyn ProfileStore, dyn AIAnalyzer>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub analyzer: Arc<dyn AIAnalyzer>,
    pub analysis: Arc<SharedAnalysisService>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        analyzer: Arc<dyn AIAnalyzer>,
        options: AnalysisOptions,
        config: ServerConfig,
    ) -> Self {
        let analysis = Arc::new(AnalysisService::new(
            store.clone(),
            analyzer.clone(),
            options,
        ));
        Self {
            store,
            analyzer,
            analysis,
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }
}
