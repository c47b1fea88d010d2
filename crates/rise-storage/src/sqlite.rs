use crate::error::{Result, StorageError};
use crate::{BeginOutcome, ProfileStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rise_common::analysis::AnalysisDocument;
use rise_common::types::{
    AIInsight, AnalysisStatus, InsightCategory, InsightDraft, InsightSeverity, InteractionKind,
    InterestLevel, InterestedInvestor, InvestorProfile, NewInvestorProfile, NewStartupProfile,
    StartupProfile,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const STARTUPS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS startups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT,
    name TEXT NOT NULL,
    industry TEXT,
    details_json TEXT NOT NULL,
    analysis_status TEXT,
    analysis_timestamp INTEGER,
    ai_analysis TEXT,
    funding_readiness_score INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_startups_user_id ON startups(user_id);
CREATE INDEX IF NOT EXISTS idx_startups_analysis_status ON startups(analysis_status);
";

const INVESTORS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS investors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT,
    full_name TEXT NOT NULL,
    details_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const INTERACTIONS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS investor_interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    startup_id INTEGER NOT NULL,
    investor_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interactions_startup ON investor_interactions(startup_id);
";

const INSIGHTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ai_insights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    startup_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_insights_startup ON ai_insights(startup_id);
";

const STARTUP_COLUMNS: &str = "id, details_json, analysis_status, analysis_timestamp, ai_analysis, \
     funding_readiness_score, created_at, updated_at";

/// SQLite-backed [`ProfileStore`]. Timestamps are stored as unix
/// milliseconds, JSON payloads as TEXT.
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Opens (or creates) `rise.db` under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::Other(format!("create {}: {e}", data_dir.display())))?;
        let db_path = data_dir.join("rise.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        tracing::info!(path = %db_path.display(), "Initialized profile store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(STARTUPS_SCHEMA)?;
        conn.execute_batch(INVESTORS_SCHEMA)?;
        conn.execute_batch(INTERACTIONS_SCHEMA)?;
        conn.execute_batch(INSIGHTS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fetch_startup(conn: &Connection, id: i64) -> Result<Option<StartupProfile>> {
        let sql = format!("SELECT {STARTUP_COLUMNS} FROM startups WHERE id = ?1");
        conn.query_row(&sql, params![id], StartupRow::from_row)
            .optional()?
            .map(StartupRow::into_profile)
            .transpose()
    }

    fn fetch_investor(conn: &Connection, id: i64) -> Result<Option<InvestorProfile>> {
        conn.query_row(
            "SELECT id, details_json, created_at, updated_at FROM investors WHERE id = ?1",
            params![id],
            InvestorRow::from_row,
        )
        .optional()?
        .map(InvestorRow::into_profile)
        .transpose()
    }

    fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) > 0 FROM {table} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
    }

    fn fetch_insights(conn: &Connection, startup_id: i64) -> Result<Vec<AIInsight>> {
        let mut stmt = conn.prepare(
            "SELECT id, startup_id, title, summary, category, severity, created_at
             FROM ai_insights WHERE startup_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![startup_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut insights = Vec::new();
        for row in rows {
            let (id, startup_id, title, summary, category, severity, created_at) = row?;
            insights.push(AIInsight {
                id,
                startup_id,
                title,
                summary,
                category: category
                    .parse::<InsightCategory>()
                    .map_err(|value| StorageError::InvalidColumn {
                        column: "category",
                        value,
                    })?,
                severity: severity
                    .map(|s| s.parse::<InsightSeverity>())
                    .transpose()
                    .map_err(|value| StorageError::InvalidColumn {
                        column: "severity",
                        value,
                    })?,
                created_at: from_millis("created_at", created_at)?,
            });
        }
        Ok(insights)
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn insert_startup(&self, profile: &NewStartupProfile) -> Result<StartupProfile> {
        let conn = self.conn();
        let now = Utc::now().timestamp_millis();
        let details = serde_json::to_string(profile)?;
        conn.execute(
            "INSERT INTO startups (user_id, name, industry, details_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![profile.user_id, profile.name, profile.industry, details, now],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(startup_id = id, name = %profile.name, "Inserted startup profile");
        Self::fetch_startup(&conn, id)?.ok_or_else(|| StorageError::NotFound {
            entity: "startup",
            id: id.to_string(),
        })
    }

    async fn get_startup(&self, id: i64) -> Result<Option<StartupProfile>> {
        let conn = self.conn();
        Self::fetch_startup(&conn, id)
    }

    async fn list_startups(&self, limit: usize, offset: usize) -> Result<Vec<StartupProfile>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {STARTUP_COLUMNS} FROM startups ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![to_sql_count(limit), to_sql_count(offset)],
            StartupRow::from_row,
        )?;
        let mut startups = Vec::new();
        for row in rows {
            startups.push(row?.into_profile()?);
        }
        Ok(startups)
    }

    async fn count_startups(&self) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM startups", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    async fn try_begin_analysis(&self, id: i64, stale_after: Duration) -> Result<BeginOutcome> {
        let conn = self.conn();
        let now = Utc::now();
        let cutoff = (now - stale_after).timestamp_millis();
        let changed = conn.execute(
            "UPDATE startups
             SET analysis_status = ?1, analysis_timestamp = ?2, updated_at = ?2
             WHERE id = ?3
               AND (analysis_status IS NULL
                    OR analysis_status <> ?1
                    OR analysis_timestamp IS NULL
                    OR analysis_timestamp < ?4)",
            params![
                AnalysisStatus::Processing.as_str(),
                now.timestamp_millis(),
                id,
                cutoff
            ],
        )?;
        if changed > 0 {
            return Ok(BeginOutcome::Started);
        }

        let stamped: Option<Option<i64>> = conn
            .query_row(
                "SELECT analysis_timestamp FROM startups WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match stamped {
            None => Ok(BeginOutcome::NotFound),
            Some(since) => Ok(BeginOutcome::AlreadyProcessing {
                since: since.map(|ms| from_millis("analysis_timestamp", ms)).transpose()?,
            }),
        }
    }

    async fn complete_analysis(&self, id: i64, analysis: &Value) -> Result<()> {
        let conn = self.conn();
        let now = Utc::now().timestamp_millis();
        let score = AnalysisDocument::from_value(analysis).funding_readiness_score;
        let changed = conn.execute(
            "UPDATE startups
             SET analysis_status = ?1, analysis_timestamp = ?2, ai_analysis = ?3,
                 funding_readiness_score = COALESCE(?4, funding_readiness_score),
                 updated_at = ?2
             WHERE id = ?5",
            params![
                AnalysisStatus::Completed.as_str(),
                now,
                serde_json::to_string(analysis)?,
                score,
                id
            ],
        )?;
        ensure_updated(changed, "startup", id)
    }

    async fn fail_analysis(&self, id: i64, message: &str) -> Result<()> {
        let conn = self.conn();
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::json!({ "error": message });
        let changed = conn.execute(
            "UPDATE startups
             SET analysis_status = ?1, analysis_timestamp = ?2, ai_analysis = ?3, updated_at = ?2
             WHERE id = ?4",
            params![
                AnalysisStatus::Failed.as_str(),
                now,
                serde_json::to_string(&payload)?,
                id
            ],
        )?;
        ensure_updated(changed, "startup", id)
    }

    async fn set_readiness_score(&self, id: i64, score: Option<u8>) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE startups SET funding_readiness_score = ?1, updated_at = ?2 WHERE id = ?3",
            params![score, Utc::now().timestamp_millis(), id],
        )?;
        ensure_updated(changed, "startup", id)
    }

    async fn insert_investor(&self, profile: &NewInvestorProfile) -> Result<InvestorProfile> {
        let conn = self.conn();
        let now = Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO investors (user_id, full_name, details_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                profile.user_id,
                profile.full_name,
                serde_json::to_string(profile)?,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::fetch_investor(&conn, id)?.ok_or_else(|| StorageError::NotFound {
            entity: "investor",
            id: id.to_string(),
        })
    }

    async fn get_investor(&self, id: i64) -> Result<Option<InvestorProfile>> {
        let conn = self.conn();
        Self::fetch_investor(&conn, id)
    }

    async fn list_investors(&self, limit: usize, offset: usize) -> Result<Vec<InvestorProfile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, details_json, created_at, updated_at FROM investors
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(
            params![to_sql_count(limit), to_sql_count(offset)],
            InvestorRow::from_row,
        )?;
        let mut investors = Vec::new();
        for row in rows {
            investors.push(row?.into_profile()?);
        }
        Ok(investors)
    }

    async fn record_investor_interest(
        &self,
        startup_id: i64,
        investor_id: i64,
        kind: InteractionKind,
    ) -> Result<()> {
        let conn = self.conn();
        if !Self::exists(&conn, "startups", startup_id)? {
            return Err(StorageError::NotFound {
                entity: "startup",
                id: startup_id.to_string(),
            });
        }
        if !Self::exists(&conn, "investors", investor_id)? {
            return Err(StorageError::NotFound {
                entity: "investor",
                id: investor_id.to_string(),
            });
        }
        conn.execute(
            "INSERT INTO investor_interactions (startup_id, investor_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                startup_id,
                investor_id,
                kind.as_str(),
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    async fn list_interested_investors(&self, startup_id: i64) -> Result<Vec<InterestedInvestor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT i.id, i.details_json,
                    COUNT(x.id),
                    MAX(x.created_at),
                    SUM(CASE WHEN x.kind = 'deck_view' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN x.kind = 'financials_view' THEN 1 ELSE 0 END)
             FROM investor_interactions x
             JOIN investors i ON i.id = x.investor_id
             WHERE x.startup_id = ?1
             GROUP BY i.id
             ORDER BY MAX(x.created_at) DESC, i.id ASC",
        )?;
        let rows = stmt.query_map(params![startup_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut interested = Vec::new();
        for row in rows {
            let (id, details, views, last_activity, deck_views, financials_views) = row?;
            let details: NewInvestorProfile = serde_json::from_str(&details)?;
            let view_count = u32::try_from(views).unwrap_or(u32::MAX);
            let has_viewed_deck = deck_views > 0;
            let has_viewed_financials = financials_views > 0;
            interested.push(InterestedInvestor {
                id,
                name: Some(details.full_name).filter(|n| !n.trim().is_empty()),
                company: details.company_name,
                title: details.job_title,
                last_activity_at: last_activity
                    .map(|ms| from_millis("created_at", ms))
                    .transpose()?,
                view_count,
                interest_level: InterestLevel::from_activity(
                    view_count,
                    has_viewed_deck,
                    has_viewed_financials,
                ),
                has_viewed_deck,
                has_viewed_financials,
            });
        }
        Ok(interested)
    }

    async fn replace_insights(
        &self,
        startup_id: i64,
        insights: &[InsightDraft],
    ) -> Result<Vec<AIInsight>> {
        let mut conn = self.conn();
        if !Self::exists(&conn, "startups", startup_id)? {
            return Err(StorageError::NotFound {
                entity: "startup",
                id: startup_id.to_string(),
            });
        }

        let now = Utc::now().timestamp_millis();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM ai_insights WHERE startup_id = ?1",
            params![startup_id],
        )?;
        for insight in insights {
            tx.execute(
                "INSERT INTO ai_insights (startup_id, title, summary, category, severity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    startup_id,
                    insight.title,
                    insight.summary,
                    insight.category.as_str(),
                    insight.severity.map(|s| s.as_str()),
                    now
                ],
            )?;
        }
        tx.commit()?;

        Self::fetch_insights(&conn, startup_id)
    }

    async fn list_insights(&self, startup_id: i64) -> Result<Vec<AIInsight>> {
        let conn = self.conn();
        Self::fetch_insights(&conn, startup_id)
    }
}

struct StartupRow {
    id: i64,
    details_json: String,
    analysis_status: Option<String>,
    analysis_timestamp: Option<i64>,
    ai_analysis: Option<String>,
    funding_readiness_score: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl StartupRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            details_json: row.get(1)?,
            analysis_status: row.get(2)?,
            analysis_timestamp: row.get(3)?,
            ai_analysis: row.get(4)?,
            funding_readiness_score: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_profile(self) -> Result<StartupProfile> {
        let details: NewStartupProfile = serde_json::from_str(&self.details_json)?;
        let analysis_status = self
            .analysis_status
            .map(|s| s.parse::<AnalysisStatus>())
            .transpose()
            .map_err(|value| StorageError::InvalidColumn {
                column: "analysis_status",
                value,
            })?;
        let ai_analysis = self
            .ai_analysis
            .map(|raw| serde_json::from_str::<Value>(&raw))
            .transpose()?;
        let funding_readiness_score = self
            .funding_readiness_score
            .map(|score| {
                u8::try_from(score).map_err(|_| StorageError::InvalidColumn {
                    column: "funding_readiness_score",
                    value: score.to_string(),
                })
            })
            .transpose()?;

        Ok(StartupProfile {
            id: self.id,
            details,
            analysis_status,
            analysis_timestamp: self
                .analysis_timestamp
                .map(|ms| from_millis("analysis_timestamp", ms))
                .transpose()?,
            ai_analysis,
            funding_readiness_score,
            created_at: from_millis("created_at", self.created_at)?,
            updated_at: from_millis("updated_at", self.updated_at)?,
        })
    }
}

struct InvestorRow {
    id: i64,
    details_json: String,
    created_at: i64,
    updated_at: i64,
}

impl InvestorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            details_json: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_profile(self) -> Result<InvestorProfile> {
        Ok(InvestorProfile {
            id: self.id,
            details: serde_json::from_str(&self.details_json)?,
            created_at: from_millis("created_at", self.created_at)?,
            updated_at: from_millis("updated_at", self.updated_at)?,
        })
    }
}

fn from_millis(column: &'static str, ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StorageError::InvalidColumn {
        column,
        value: ms.to_string(),
    })
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn ensure_updated(changed: usize, entity: &'static str, id: i64) -> Result<()> {
    if changed == 0 {
        return Err(StorageError::NotFound {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}
