//! Strict internal form of the AI analysis document.
//!
//! The model's JSON output is not schema-validated upstream, so every field
//! is read on its own: a missing or mistyped section is simply absent in the
//! normalized [`AnalysisDocument`]. Nothing here returns an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

impl Swot {
    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty()
            && self.weaknesses.is_empty()
            && self.opportunities.is_empty()
            && self.threats.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum ScalabilityLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl ScalabilityLevel {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScalabilityAssessment {
    pub level: ScalabilityLevel,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CompetitiveAdvantageEvaluation {
    pub assessment: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SuggestedKpi {
    pub kpi: String,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WhatIfScenario {
    pub scenario: String,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GrowthPlanPhase {
    pub period: String,
    pub focus: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FinancialAssessment {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CashBurn {
    pub monthly_rate: Option<f64>,
    pub runway_months: Option<f64>,
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProfitabilityProjection {
    pub estimated_timeframe: Option<String>,
    pub key_factors: Vec<String>,
}

/// Normalized analysis of one startup.
///
/// # Examples
///
/// ```
/// use rise_common::analysis::AnalysisDocument;
/// use serde_json::json;
///
/// let doc = AnalysisDocument::from_value(&json!({
///     "executive_summary": "Strong team",
///     "swot_analysis": { "strengths": ["team", 42] },
///     "funding_readiness_score": "130",
///     "key_risks": "not a list",
/// }));
/// assert_eq!(doc.executive_summary.as_deref(), Some("Strong team"));
/// assert_eq!(doc.swot.unwrap().strengths, vec!["team".to_string()]);
/// assert_eq!(doc.funding_readiness_score, Some(100));
/// assert!(doc.key_risks.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnalysisDocument {
    pub executive_summary: Option<String>,
    pub swot: Option<Swot>,
    pub market_positioning: Option<String>,
    pub scalability_assessment: Option<ScalabilityAssessment>,
    pub competitive_advantage_evaluation: Option<CompetitiveAdvantageEvaluation>,
    pub current_challenges: Vec<String>,
    pub key_risks: Vec<String>,
    pub strategic_recommendations: Vec<String>,
    pub suggested_kpis: Vec<SuggestedKpi>,
    pub what_if_scenarios: Vec<WhatIfScenario>,
    pub growth_plan_phases: Vec<GrowthPlanPhase>,
    pub funding_outlook: Option<String>,
    pub financial_assessment: Option<FinancialAssessment>,
    pub cash_burn_rate: Option<CashBurn>,
    pub profitability_projection: Option<ProfitabilityProjection>,
    pub funding_readiness_score: Option<u8>,
    pub funding_readiness_justification: Option<String>,
    /// Message stored by a failed run in place of an analysis.
    pub error: Option<String>,
}

impl AnalysisDocument {
    /// Normalizes an arbitrary JSON value. Non-objects yield an empty document.
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map),
            None => Self::default(),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let swot = map
            .get("swot_analysis")
            .or_else(|| map.get("swot"))
            .and_then(Value::as_object)
            .map(|s| Swot {
                strengths: string_list(s.get("strengths")),
                weaknesses: string_list(s.get("weaknesses")),
                opportunities: string_list(s.get("opportunities")),
                threats: string_list(s.get("threats")),
            })
            .filter(|s| !s.is_empty());

        let scalability_assessment = object(map, "scalability_assessment").and_then(|s| {
            let level = text(s, "level").map(|l| ScalabilityLevel::parse(&l));
            let justification = text(s, "justification");
            if level.is_none() && justification.is_none() {
                return None;
            }
            Some(ScalabilityAssessment {
                level: level.unwrap_or(ScalabilityLevel::Unknown),
                justification,
            })
        });

        let competitive_advantage_evaluation = object(map, "competitive_advantage_evaluation")
            .map(|c| CompetitiveAdvantageEvaluation {
                assessment: text(c, "assessment"),
                suggestion: text(c, "suggestion"),
            })
            .filter(|c| c.assessment.is_some() || c.suggestion.is_some());

        let financial_assessment = object(map, "financial_assessment")
            .map(|f| FinancialAssessment {
                strengths: string_list(f.get("strengths")),
                weaknesses: string_list(f.get("weaknesses")),
                recommendations: string_list(f.get("recommendations")),
            })
            .filter(|f| {
                !(f.strengths.is_empty() && f.weaknesses.is_empty() && f.recommendations.is_empty())
            });

        let cash_burn_rate = object(map, "cash_burn_rate")
            .map(|c| CashBurn {
                monthly_rate: number(c.get("monthly_rate")),
                runway_months: number(c.get("runway_months")),
                assessment: text(c, "assessment"),
            })
            .filter(|c| {
                c.monthly_rate.is_some() || c.runway_months.is_some() || c.assessment.is_some()
            });

        let profitability_projection = object(map, "profitability_projection")
            .map(|p| ProfitabilityProjection {
                estimated_timeframe: text(p, "estimated_timeframe"),
                key_factors: string_list(p.get("key_factors")),
            })
            .filter(|p| p.estimated_timeframe.is_some() || !p.key_factors.is_empty());

        Self {
            executive_summary: text(map, "executive_summary"),
            swot,
            market_positioning: text(map, "market_positioning"),
            scalability_assessment,
            competitive_advantage_evaluation,
            current_challenges: string_list(map.get("current_challenges")),
            key_risks: string_list(map.get("key_risks")),
            strategic_recommendations: string_list(map.get("strategic_recommendations")),
            suggested_kpis: suggested_kpis(map.get("suggested_kpis")),
            what_if_scenarios: objects(map.get("what_if_scenarios"))
                .filter_map(|s| {
                    Some(WhatIfScenario {
                        scenario: text(s, "scenario")?,
                        outcome: text(s, "outcome"),
                    })
                })
                .collect(),
            growth_plan_phases: objects(map.get("growth_plan_phases"))
                .filter_map(|p| {
                    Some(GrowthPlanPhase {
                        period: text(p, "period")?,
                        focus: text(p, "focus"),
                        description: text(p, "description"),
                    })
                })
                .collect(),
            funding_outlook: text(map, "funding_outlook"),
            financial_assessment,
            cash_burn_rate,
            profitability_projection,
            funding_readiness_score: number(map.get("funding_readiness_score")).map(clamp_score),
            funding_readiness_justification: text(map, "funding_readiness_justification"),
            error: text(map, "error"),
        }
    }

    /// True when the document carries no analysis content. A stored error
    /// message does not count as content.
    pub fn is_empty(&self) -> bool {
        self.executive_summary.is_none()
            && self.swot.is_none()
            && self.market_positioning.is_none()
            && self.scalability_assessment.is_none()
            && self.competitive_advantage_evaluation.is_none()
            && self.current_challenges.is_empty()
            && self.key_risks.is_empty()
            && self.strategic_recommendations.is_empty()
            && self.suggested_kpis.is_empty()
            && self.what_if_scenarios.is_empty()
            && self.growth_plan_phases.is_empty()
            && self.funding_outlook.is_none()
            && self.financial_assessment.is_none()
            && self.cash_burn_rate.is_none()
            && self.profitability_projection.is_none()
            && self.funding_readiness_score.is_none()
            && self.funding_readiness_justification.is_none()
    }
}

/// Funding readiness interpreted through fixed thresholds (40, 70).
///
/// # Examples
///
/// ```
/// use rise_common::analysis::ReadinessBand;
///
/// assert_eq!(ReadinessBand::from_score(39), ReadinessBand::Low);
/// assert_eq!(ReadinessBand::from_score(40), ReadinessBand::Medium);
/// assert_eq!(ReadinessBand::from_score(70), ReadinessBand::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessBand {
    Low,
    Medium,
    High,
}

impl ReadinessBand {
    pub const MEDIUM_THRESHOLD: u8 = 40;
    pub const HIGH_THRESHOLD: u8 = 70;

    pub fn from_score(score: u8) -> Self {
        if score < Self::MEDIUM_THRESHOLD {
            Self::Low
        } else if score < Self::HIGH_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Rounds and clamps a model-supplied score into 0..=100.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn object<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn suggested_kpis(value: Option<&Value>) -> Vec<SuggestedKpi> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(SuggestedKpi {
                kpi: s.trim().to_string(),
                justification: None,
            }),
            Value::Object(o) => Some(SuggestedKpi {
                kpi: text(o, "kpi").or_else(|| text(o, "name"))?,
                justification: text(o, "justification"),
            }),
            _ => None,
        })
        .collect()
}
