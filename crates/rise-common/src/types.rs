use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a startup's AI analysis.
///
/// `error` is accepted as a legacy spelling of [`AnalysisStatus::Failed`];
/// the service itself only ever writes `failed`.
///
/// # Examples
///
/// ```
/// use rise_common::types::AnalysisStatus;
///
/// let status: AnalysisStatus = "error".parse().unwrap();
/// assert_eq!(status, AnalysisStatus::Failed);
/// assert_eq!(status.to_string(), "failed");
/// assert!(status.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` and `failed` end a run; anything else means a run may
    /// still be in flight.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            _ => Err(format!("unknown analysis status: {s}")),
        }
    }
}

/// One competitor named on the registration form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Competitor {
    pub name: Option<String>,
    pub size: Option<String>,
    pub threat: Option<String>,
    pub differentiator: Option<String>,
}

/// Attributes submitted through the startup registration form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewStartupProfile {
    pub user_id: Option<String>,
    pub name: String,

    // Basic info
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub location_city: Option<String>,
    pub country_of_operation: Option<String>,
    pub founding_date: Option<String>,

    // Company details
    pub description: Option<String>,
    pub operational_stage: Option<String>,
    pub num_employees: Option<i64>,
    pub num_customers: Option<i64>,
    pub annual_revenue: Option<f64>,
    pub annual_expenses: Option<f64>,
    pub website: Option<String>,
    pub linkedin_profile: Option<String>,
    pub twitter_profile: Option<String>,
    pub logo_url: Option<String>,
    pub pitch_deck_url: Option<String>,

    // Key metrics
    pub kpi_cac: Option<f64>,
    pub kpi_clv: Option<f64>,
    pub kpi_retention_rate: Option<f64>,
    pub kpi_conversion_rate: Option<f64>,
    pub kpi_monthly_growth: Option<f64>,
    pub kpi_payback_period: Option<f64>,
    pub kpi_churn_rate: Option<f64>,
    pub kpi_nps: Option<f64>,
    pub kpi_tam_size: Option<String>,
    pub kpi_avg_order_value: Option<f64>,
    pub kpi_market_share: Option<f64>,
    pub kpi_yoy_growth: Option<f64>,

    // Team
    pub team_size: Option<i64>,
    pub has_co_founder: Option<bool>,
    pub founder_name: Option<String>,
    pub founder_title: Option<String>,
    pub founder_education: Option<String>,
    pub previous_startup_experience: Option<String>,
    pub founder_bio: Option<String>,
    #[serde(default)]
    pub tech_skills: BTreeMap<String, bool>,

    // Market
    pub market_growth_rate: Option<String>,
    pub market_key_trends: Option<String>,
    pub target_customer_profile: Option<String>,
    pub customer_pain_points: Option<String>,
    pub market_barriers: Option<String>,
    pub competitive_advantage: Option<String>,

    // Competition
    #[serde(default)]
    pub competitors: Vec<Competitor>,

    // Funding
    pub current_funding: Option<String>,
    pub seeking_investment: Option<bool>,
    pub target_raise_amount: Option<f64>,
}

/// A stored startup profile: form attributes plus the fields owned by the
/// analysis workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StartupProfile {
    pub id: i64,
    #[serde(flatten)]
    pub details: NewStartupProfile,
    pub analysis_status: Option<AnalysisStatus>,
    pub analysis_timestamp: Option<DateTime<Utc>>,
    /// Last analysis document exactly as produced, or `{"error": ...}` after
    /// a failed run.
    #[schema(value_type = Option<Object>)]
    pub ai_analysis: Option<serde_json::Value>,
    pub funding_readiness_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum InvestorType {
    Personal,
    Angel,
    #[serde(rename = "VC")]
    Vc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewInvestorProfile {
    pub user_id: Option<String>,
    pub full_name: String,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub investor_type: Option<InvestorType>,
    pub website: Option<String>,
    pub linkedin_profile: Option<String>,
    pub company_description: Option<String>,
    #[serde(default)]
    pub preferred_industries: Vec<String>,
    #[serde(default)]
    pub preferred_geography: Vec<String>,
    #[serde(default)]
    pub preferred_stage: Vec<String>,
}

impl NewInvestorProfile {
    /// Pre-filter applied before startups are offered to the matchmaking
    /// model. An empty preference list accepts anything. Geography matches
    /// either the country or the city, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use rise_common::types::{NewInvestorProfile, NewStartupProfile};
    ///
    /// let investor = NewInvestorProfile {
    ///     full_name: "Dana".to_string(),
    ///     preferred_industries: vec!["Fintech".to_string()],
    ///     ..Default::default()
    /// };
    /// let fintech = NewStartupProfile {
    ///     name: "Acme".to_string(),
    ///     industry: Some("fintech".to_string()),
    ///     ..Default::default()
    /// };
    /// assert!(investor.accepts(&fintech));
    /// assert!(!investor.accepts(&NewStartupProfile::default()));
    /// ```
    pub fn accepts(&self, startup: &NewStartupProfile) -> bool {
        matches_preference(&self.preferred_industries, startup.industry.as_deref())
            && matches_preference(&self.preferred_stage, startup.operational_stage.as_deref())
            && (self.preferred_geography.is_empty()
                || matches_preference(
                    &self.preferred_geography,
                    startup.country_of_operation.as_deref(),
                )
                || matches_preference(&self.preferred_geography, startup.location_city.as_deref()))
    }
}

fn matches_preference(preferences: &[String], value: Option<&str>) -> bool {
    if preferences.is_empty() {
        return true;
    }
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return false;
    };
    preferences
        .iter()
        .any(|p| p.trim().eq_ignore_ascii_case(value))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InvestorProfile {
    pub id: i64,
    #[serde(flatten)]
    pub details: NewInvestorProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum InterestLevel {
    High,
    Medium,
    Low,
}

/// Kind of interaction an investor had with a startup profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    ProfileView,
    DeckView,
    FinancialsView,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileView => "profile_view",
            Self::DeckView => "deck_view",
            Self::FinancialsView => "financials_view",
        }
    }
}

/// An investor profile joined with the summary of its interactions with
/// one startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InterestedInvestor {
    pub id: i64,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub view_count: u32,
    pub interest_level: InterestLevel,
    pub has_viewed_deck: bool,
    pub has_viewed_financials: bool,
}

impl InterestLevel {
    /// Deck or financials views count as strong signals; repeated profile
    /// views as a moderate one.
    pub fn from_activity(view_count: u32, viewed_deck: bool, viewed_financials: bool) -> Self {
        if viewed_financials || (viewed_deck && view_count >= 3) {
            Self::High
        } else if viewed_deck || view_count >= 3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum InsightCategory {
    Recommendation,
    Strength,
    Weakness,
    Opportunity,
    Threat,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommendation => "Recommendation",
            Self::Strength => "Strength",
            Self::Weakness => "Weakness",
            Self::Opportunity => "Opportunity",
            Self::Threat => "Threat",
        }
    }
}

impl std::str::FromStr for InsightCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommendation" => Ok(Self::Recommendation),
            "strength" => Ok(Self::Strength),
            "weakness" => Ok(Self::Weakness),
            "opportunity" => Ok(Self::Opportunity),
            "threat" => Ok(Self::Threat),
            _ => Err(format!("unknown insight category: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum InsightSeverity {
    High,
    Medium,
    Low,
}

impl InsightSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::str::FromStr for InsightSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("unknown insight severity: {s}")),
        }
    }
}

/// An insight before it has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InsightDraft {
    pub title: String,
    pub summary: String,
    pub category: InsightCategory,
    pub severity: Option<InsightSeverity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AIInsight {
    pub id: i64,
    pub startup_id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub category: InsightCategory,
    pub severity: Option<InsightSeverity>,
}

/// Speaker of one turn in an assistant conversation. `system` turns sent by
/// a client are accepted and dropped; the service writes its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A match proposed by the model: which startup, how strong, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionDraft {
    pub startup_id: i64,
    pub match_score: u8,
    pub highlights: Vec<String>,
    pub match_reason: Option<String>,
}

/// One startup suggested to an investor. Profile fields come from the
/// stored row; score, highlights and reason come from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StartupSuggestion {
    pub startup_id: i64,
    pub startup_name: String,
    pub logo_url: Option<String>,
    pub industry: Option<String>,
    pub stage: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub team_size: Option<i64>,
    pub funding_needed: Option<f64>,
    /// 0-100
    pub match_score: u8,
    pub highlights: Vec<String>,
    pub match_reason: Option<String>,
}

impl StartupSuggestion {
    pub fn new(profile: &StartupProfile, draft: SuggestionDraft) -> Self {
        let d = &profile.details;
        let location: Vec<&str> = [d.location_city.as_deref(), d.country_of_operation.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        Self {
            startup_id: profile.id,
            startup_name: d.name.clone(),
            logo_url: d.logo_url.clone(),
            industry: d.industry.clone(),
            stage: d.operational_stage.clone(),
            description: d.description.clone(),
            location: (!location.is_empty()).then(|| location.join(", ")),
            team_size: d.team_size.or(d.num_employees),
            funding_needed: d.target_raise_amount,
            match_score: draft.match_score,
            highlights: draft.highlights,
            match_reason: draft.match_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_deserializes_legacy_error_as_failed() {
        let status: AnalysisStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(status, AnalysisStatus::Failed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"failed\"");
    }

    #[test]
    fn status_rejects_unknown_value() {
        assert!("stuck".parse::<AnalysisStatus>().is_err());
        assert!(!AnalysisStatus::Processing.is_terminal());
        assert!(!AnalysisStatus::Pending.is_terminal());
    }

    #[test]
    fn startup_profile_flattens_details() {
        let now = Utc::now();
        let profile = StartupProfile {
            id: 7,
            details: NewStartupProfile {
                name: "Acme".to_string(),
                industry: Some("Fintech".to_string()),
                ..Default::default()
            },
            analysis_status: None,
            analysis_timestamp: None,
            ai_analysis: None,
            funding_readiness_score: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["name"], "Acme");
        assert_eq!(json["industry"], "Fintech");
        assert!(json["analysis_status"].is_null());
    }

    #[test]
    fn registration_payload_needs_only_a_name() {
        let details: NewStartupProfile = serde_json::from_str(r#"{"name":"Solo"}"#).unwrap();
        assert_eq!(details.name, "Solo");
        assert!(details.competitors.is_empty());
        assert!(details.annual_revenue.is_none());
    }

    #[test]
    fn interest_level_from_activity() {
        assert_eq!(InterestLevel::from_activity(1, false, false), InterestLevel::Low);
        assert_eq!(InterestLevel::from_activity(3, false, false), InterestLevel::Medium);
        assert_eq!(InterestLevel::from_activity(1, true, false), InterestLevel::Medium);
        assert_eq!(InterestLevel::from_activity(1, false, true), InterestLevel::High);
        assert_eq!(InterestLevel::from_activity(4, true, false), InterestLevel::High);
    }

    #[test]
    fn investor_preferences_filter_startups() {
        let investor = NewInvestorProfile {
            full_name: "Dana".to_string(),
            preferred_stage: vec!["Seed".to_string()],
            preferred_geography: vec![" Kenya ".to_string(), "Lagos".to_string()],
            ..Default::default()
        };
        let mut startup = NewStartupProfile {
            name: "Acme".to_string(),
            operational_stage: Some("seed".to_string()),
            country_of_operation: Some("Nigeria".to_string()),
            location_city: Some("lagos".to_string()),
            ..Default::default()
        };
        assert!(investor.accepts(&startup));

        startup.location_city = None;
        assert!(!investor.accepts(&startup));
        startup.country_of_operation = Some("KENYA".to_string());
        assert!(investor.accepts(&startup));
        startup.operational_stage = Some("Series A".to_string());
        assert!(!investor.accepts(&startup));

        let open = NewInvestorProfile::default();
        assert!(open.accepts(&NewStartupProfile::default()));
    }

    #[test]
    fn suggestion_takes_profile_fields_from_the_row() {
        let now = Utc::now();
        let profile = StartupProfile {
            id: 3,
            details: NewStartupProfile {
                name: "Acme".to_string(),
                location_city: Some("Nairobi".to_string()),
                country_of_operation: Some("Kenya".to_string()),
                num_employees: Some(8),
                target_raise_amount: Some(500000.0),
                ..Default::default()
            },
            analysis_status: None,
            analysis_timestamp: None,
            ai_analysis: None,
            funding_readiness_score: None,
            created_at: now,
            updated_at: now,
        };
        let suggestion = StartupSuggestion::new(
            &profile,
            SuggestionDraft {
                startup_id: 3,
                match_score: 81,
                highlights: vec!["Strong traction".to_string()],
                match_reason: None,
            },
        );
        assert_eq!(suggestion.startup_name, "Acme");
        assert_eq!(suggestion.location.as_deref(), Some("Nairobi, Kenya"));
        assert_eq!(suggestion.team_size, Some(8));
        assert_eq!(suggestion.funding_needed, Some(500000.0));
        assert_eq!(suggestion.match_score, 81);
    }
}
