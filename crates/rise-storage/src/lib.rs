//! Persistence for startup and investor profiles, analysis state and
//! generated insights.
//!
//! The default implementation ([`sqlite::SqliteProfileStore`]) keeps every
//! table in a single SQLite database in WAL mode. The analysis workflow only
//! talks to the [`ProfileStore`] trait, so tests can swap the backend.

pub mod error;
pub mod sqlite;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rise_common::types::{
    AIInsight, InsightDraft, InteractionKind, InterestedInvestor, InvestorProfile,
    NewInvestorProfile, NewStartupProfile, StartupProfile,
};
use serde_json::Value;

pub use error::{Result, StorageError};
pub use sqlite::SqliteProfileStore;

/// Result of the compare-and-swap that moves a startup into `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The row was moved to `processing`; the caller owns this run.
    Started,
    /// Another run stamped the row at `since` and has not gone stale yet.
    AlreadyProcessing { since: Option<DateTime<Utc>> },
    /// No startup with that id.
    NotFound,
}

/// Persistence backend for profiles and analysis state.
///
/// Implementations must be `Send + Sync`: the same store is shared by every
/// HTTP handler and by analysis runs still in flight.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn insert_startup(&self, profile: &NewStartupProfile) -> Result<StartupProfile>;

    async fn get_startup(&self, id: i64) -> Result<Option<StartupProfile>>;

    /// Lists startups newest first.
    async fn list_startups(&self, limit: usize, offset: usize) -> Result<Vec<StartupProfile>>;

    async fn count_startups(&self) -> Result<u64>;

    /// Atomically moves the startup to `processing` and stamps
    /// `analysis_timestamp`, unless it is already `processing` with a stamp
    /// newer than `stale_after`.
    async fn try_begin_analysis(&self, id: i64, stale_after: Duration) -> Result<BeginOutcome>;

    /// Stores the analysis document and marks the run `completed`. A
    /// `funding_readiness_score` inside the document is mirrored into its
    /// own column.
    async fn complete_analysis(&self, id: i64, analysis: &Value) -> Result<()>;

    /// Marks the run `failed` and stores `{"error": message}` as the analysis.
    async fn fail_analysis(&self, id: i64, message: &str) -> Result<()>;

    async fn set_readiness_score(&self, id: i64, score: Option<u8>) -> Result<()>;

    async fn insert_investor(&self, profile: &NewInvestorProfile) -> Result<InvestorProfile>;

    async fn get_investor(&self, id: i64) -> Result<Option<InvestorProfile>>;

    async fn list_investors(&self, limit: usize, offset: usize) -> Result<Vec<InvestorProfile>>;

    /// Records one interaction of an investor with a startup profile. Both
    /// ends must exist.
    async fn record_investor_interest(
        &self,
        startup_id: i64,
        investor_id: i64,
        kind: InteractionKind,
    ) -> Result<()>;

    /// Investors that interacted with the startup, most recent activity first.
    async fn list_interested_investors(&self, startup_id: i64) -> Result<Vec<InterestedInvestor>>;

    /// Replaces every stored insight of the startup with `insights`.
    async fn replace_insights(
        &self,
        startup_id: i64,
        insights: &[InsightDraft],
    ) -> Result<Vec<AIInsight>>;

    async fn list_insights(&self, startup_id: i64) -> Result<Vec<AIInsight>>;
}
