//! Status-driven view of a startup's analysis.
//!
//! The view is derived from the stored row on every read. Nothing here
//! writes state, so re-reading a `processing` row ("check status") can never
//! produce a status that differs from the store.

use chrono::{DateTime, Utc};
use rise_common::analysis::{AnalysisDocument, ReadinessBand};
use rise_common::types::{AnalysisStatus, StartupProfile};
use serde::Serialize;
use std::fmt::Write;
use utoipa::ToSchema;

pub const EMPTY_ANALYSIS_MESSAGE: &str = "No insights generated";
const GENERIC_FAILURE_MESSAGE: &str = "The analysis could not be completed.";

/// Next step offered to the user for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViewAction {
    Request,
    CheckStatus,
    Retry,
}

impl ViewAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Request => "Request analysis",
            Self::CheckStatus => "Check status",
            Self::Retry => "Retry analysis",
        }
    }
}

/// One titled block of the rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportSection {
    pub key: String,
    pub title: String,
    pub paragraphs: Vec<String>,
    pub items: Vec<String>,
}

impl ReportSection {
    fn new(key: &str, title: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            paragraphs: Vec::new(),
            items: Vec::new(),
        }
    }

    fn paragraph(mut self, text: Option<impl Into<String>>) -> Self {
        if let Some(text) = text {
            self.paragraphs.push(text.into());
        }
        self
    }

    fn items(mut self, items: impl IntoIterator<Item = String>) -> Self {
        self.items.extend(items);
        self
    }

    fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Readiness {
    pub score: u8,
    pub band: ReadinessBand,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisView {
    NotStarted {
        actions: Vec<ViewAction>,
    },
    InProgress {
        status: AnalysisStatus,
        since: Option<DateTime<Utc>>,
        actions: Vec<ViewAction>,
    },
    Completed {
        completed_at: Option<DateTime<Utc>>,
        sections: Vec<ReportSection>,
        readiness: Option<Readiness>,
        empty_message: Option<String>,
        actions: Vec<ViewAction>,
    },
    Failed {
        failed_at: Option<DateTime<Utc>>,
        error: String,
        actions: Vec<ViewAction>,
    },
}

impl AnalysisView {
    pub fn from_profile(profile: &StartupProfile) -> Self {
        match profile.analysis_status {
            None => Self::NotStarted {
                actions: vec![ViewAction::Request],
            },
            Some(status @ (AnalysisStatus::Pending | AnalysisStatus::Processing)) => {
                Self::InProgress {
                    status,
                    since: profile.analysis_timestamp,
                    actions: vec![ViewAction::CheckStatus],
                }
            }
            Some(AnalysisStatus::Completed) => {
                let document = profile
                    .ai_analysis
                    .as_ref()
                    .map(AnalysisDocument::from_value)
                    .unwrap_or_default();
                let readiness = document
                    .funding_readiness_score
                    .or(profile.funding_readiness_score)
                    .map(|score| Readiness {
                        score,
                        band: ReadinessBand::from_score(score),
                        justification: document.funding_readiness_justification.clone(),
                    });
                let (sections, empty_message) = if document.is_empty() {
                    (Vec::new(), Some(EMPTY_ANALYSIS_MESSAGE.to_string()))
                } else {
                    (sections(&document), None)
                };
                Self::Completed {
                    completed_at: profile.analysis_timestamp,
                    sections,
                    readiness,
                    empty_message,
                    actions: vec![ViewAction::Request],
                }
            }
            Some(AnalysisStatus::Failed) => Self::Failed {
                failed_at: profile.analysis_timestamp,
                error: profile
                    .ai_analysis
                    .as_ref()
                    .and_then(|a| a.get("error"))
                    .and_then(|e| e.as_str())
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or(GENERIC_FAILURE_MESSAGE)
                    .to_string(),
                actions: vec![ViewAction::Retry],
            },
        }
    }

    pub fn actions(&self) -> &[ViewAction] {
        match self {
            Self::NotStarted { actions }
            | Self::InProgress { actions, .. }
            | Self::Completed { actions, .. }
            | Self::Failed { actions, .. } => actions,
        }
    }
}

fn sections(doc: &AnalysisDocument) -> Vec<ReportSection> {
    let mut out = vec![
        ReportSection::new("executive_summary", "Executive Summary")
            .paragraph(doc.executive_summary.clone()),
    ];

    if let Some(swot) = &doc.swot {
        out.push(
            ReportSection::new("swot_analysis", "SWOT Analysis")
                .items(labelled("Strength", &swot.strengths))
                .items(labelled("Weakness", &swot.weaknesses))
                .items(labelled("Opportunity", &swot.opportunities))
                .items(labelled("Threat", &swot.threats)),
        );
    }

    out.push(
        ReportSection::new("market_positioning", "Market Positioning")
            .paragraph(doc.market_positioning.clone()),
    );

    if let Some(scalability) = &doc.scalability_assessment {
        out.push(
            ReportSection::new("scalability_assessment", "Scalability")
                .paragraph(Some(format!("Level: {:?}", scalability.level)))
                .paragraph(scalability.justification.clone()),
        );
    }

    if let Some(advantage) = &doc.competitive_advantage_evaluation {
        out.push(
            ReportSection::new("competitive_advantage_evaluation", "Competitive Advantage")
                .paragraph(advantage.assessment.clone())
                .paragraph(advantage.suggestion.as_ref().map(|s| format!("Suggestion: {s}"))),
        );
    }

    out.push(
        ReportSection::new("current_challenges", "Current Challenges")
            .items(doc.current_challenges.iter().cloned()),
    );
    out.push(ReportSection::new("key_risks", "Key Risks").items(doc.key_risks.iter().cloned()));
    out.push(
        ReportSection::new("strategic_recommendations", "Strategic Recommendations")
            .items(doc.strategic_recommendations.iter().cloned()),
    );
    out.push(
        ReportSection::new("suggested_kpis", "Suggested KPIs").items(doc.suggested_kpis.iter().map(
            |k| match &k.justification {
                Some(why) => format!("{}: {why}", k.kpi),
                None => k.kpi.clone(),
            },
        )),
    );
    out.push(
        ReportSection::new("what_if_scenarios", "What-if Scenarios").items(
            doc.what_if_scenarios.iter().map(|s| match &s.outcome {
                Some(outcome) => format!("{} → {outcome}", s.scenario),
                None => s.scenario.clone(),
            }),
        ),
    );
    out.push(
        ReportSection::new("growth_plan_phases", "Growth Plan").items(
            doc.growth_plan_phases.iter().map(|p| {
                let mut line = p.period.clone();
                if let Some(focus) = &p.focus {
                    let _ = write!(line, " ({focus})");
                }
                if let Some(description) = &p.description {
                    let _ = write!(line, ": {description}");
                }
                line
            }),
        ),
    );
    out.push(
        ReportSection::new("funding_outlook", "Funding Outlook")
            .paragraph(doc.funding_outlook.clone()),
    );

    if let Some(financial) = &doc.financial_assessment {
        out.push(
            ReportSection::new("financial_assessment", "Financial Assessment")
                .items(labelled("Strength", &financial.strengths))
                .items(labelled("Weakness", &financial.weaknesses))
                .items(labelled("Recommendation", &financial.recommendations)),
        );
    }

    if let Some(burn) = &doc.cash_burn_rate {
        out.push(
            ReportSection::new("cash_burn_rate", "Cash Burn")
                .paragraph(burn.monthly_rate.map(|r| format!("Monthly burn: {r:.0}")))
                .paragraph(burn.runway_months.map(|m| format!("Runway: {m:.1} months")))
                .paragraph(burn.assessment.clone()),
        );
    }

    if let Some(projection) = &doc.profitability_projection {
        out.push(
            ReportSection::new("profitability_projection", "Profitability Projection")
                .paragraph(
                    projection
                        .estimated_timeframe
                        .as_ref()
                        .map(|t| format!("Estimated timeframe: {t}")),
                )
                .items(projection.key_factors.iter().cloned()),
        );
    }

    out.retain(|s| !s.is_empty());
    out
}

fn labelled<'a>(label: &'a str, values: &'a [String]) -> impl Iterator<Item = String> + 'a {
    values.iter().map(move |v| format!("{label}: {v}"))
}

/// Renders the view as a standalone HTML page. All model-supplied text is
/// escaped.
pub fn render_html(view: &AnalysisView, startup_name: &str) -> String {
    let mut body = String::new();

    match view {
        AnalysisView::NotStarted { .. } => {
            body.push_str("<p class=\"status\">No analysis has been requested yet.</p>\n");
        }
        AnalysisView::InProgress { since, .. } => {
            body.push_str("<p class=\"status\">Analysis in progress");
            if let Some(since) = since {
                let _ = write!(body, " since {}", since.format("%Y-%m-%d %H:%M UTC"));
            }
            body.push_str(".</p>\n");
        }
        AnalysisView::Completed {
            completed_at,
            sections,
            readiness,
            empty_message,
            ..
        } => {
            if let Some(at) = completed_at {
                let _ = writeln!(
                    body,
                    "<p class=\"status\">Completed {}</p>",
                    at.format("%Y-%m-%d %H:%M UTC")
                );
            }
            if let Some(r) = readiness {
                let _ = writeln!(
                    body,
                    "<section class=\"readiness\"><h2>Funding Readiness</h2><p><strong>{}</strong>/100 ({:?})</p>{}</section>",
                    r.score,
                    r.band,
                    r.justification
                        .as_deref()
                        .map(|j| format!("<p>{}</p>", escape_html(j)))
                        .unwrap_or_default()
                );
            }
            if let Some(message) = empty_message {
                let _ = writeln!(body, "<p class=\"empty\">{}</p>", escape_html(message));
            }
            for section in sections {
                let _ = write!(
                    body,
                    "<section id=\"{}\"><h2>{}</h2>",
                    escape_html(&section.key),
                    escape_html(&section.title)
                );
                for p in &section.paragraphs {
                    let _ = write!(body, "<p>{}</p>", escape_html(p));
                }
                if !section.items.is_empty() {
                    body.push_str("<ul>");
                    for item in &section.items {
                        let _ = write!(body, "<li>{}</li>", escape_html(item));
                    }
                    body.push_str("</ul>");
                }
                body.push_str("</section>\n");
            }
        }
        AnalysisView::Failed { error, .. } => {
            let _ = writeln!(
                body,
                "<p class=\"status error\">Analysis failed: {}</p>",
                escape_html(error)
            );
        }
    }

    let actions: Vec<&str> = view.actions().iter().map(ViewAction::label).collect();
    if !actions.is_empty() {
        let _ = writeln!(
            body,
            "<p class=\"actions\">Next: {}</p>",
            escape_html(&actions.join(", "))
        );
    }

    let title = escape_html(startup_name);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title} · AI Analysis</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n"
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rise_common::types::NewStartupProfile;
    use serde_json::json;

    fn profile(status: Option<AnalysisStatus>, analysis: Option<serde_json::Value>) -> StartupProfile {
        let now = Utc::now();
        StartupProfile {
            id: 1,
            details: NewStartupProfile {
                name: "Acme".to_string(),
                ..Default::default()
            },
            analysis_status: status,
            analysis_timestamp: status.map(|_| now),
            ai_analysis: analysis,
            funding_readiness_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_status_offers_request() {
        let view = AnalysisView::from_profile(&profile(None, None));
        assert_eq!(
            view,
            AnalysisView::NotStarted {
                actions: vec![ViewAction::Request]
            }
        );
    }

    #[test]
    fn processing_offers_check_status() {
        for status in [AnalysisStatus::Pending, AnalysisStatus::Processing] {
            let view = AnalysisView::from_profile(&profile(Some(status), None));
            match view {
                AnalysisView::InProgress {
                    status: s,
                    since,
                    actions,
                } => {
                    assert_eq!(s, status);
                    assert!(since.is_some());
                    assert_eq!(actions, vec![ViewAction::CheckStatus]);
                }
                other => panic!("unexpected view {other:?}"),
            }
        }
    }

    #[test]
    fn completed_empty_document_shows_no_insights() {
        let view = AnalysisView::from_profile(&profile(Some(AnalysisStatus::Completed), Some(json!({}))));
        match view {
            AnalysisView::Completed {
                sections,
                empty_message,
                readiness,
                ..
            } => {
                assert!(sections.is_empty());
                assert!(readiness.is_none());
                assert_eq!(empty_message.as_deref(), Some("No insights generated"));
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn completed_document_is_sectioned() {
        let analysis = json!({
            "executive_summary": "Promising fintech.",
            "swot_analysis": {"strengths": ["Team"], "threats": ["Incumbents"]},
            "key_risks": ["Regulation"],
            "suggested_kpis": [{"kpi": "MRR", "justification": "Tracks growth"}],
            "funding_readiness_score": 75,
            "funding_readiness_justification": "Good traction"
        });
        let view = AnalysisView::from_profile(&profile(Some(AnalysisStatus::Completed), Some(analysis)));
        let AnalysisView::Completed {
            sections,
            readiness,
            empty_message,
            ..
        } = view
        else {
            panic!("expected completed view");
        };
        assert!(empty_message.is_none());
        let keys: Vec<&str> = sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["executive_summary", "swot_analysis", "key_risks", "suggested_kpis"]
        );
        assert_eq!(sections[1].items, vec!["Strength: Team", "Threat: Incumbents"]);
        assert_eq!(sections[3].items, vec!["MRR: Tracks growth"]);

        let readiness = readiness.unwrap();
        assert_eq!(readiness.score, 75);
        assert_eq!(readiness.band, ReadinessBand::High);
        assert_eq!(readiness.justification.as_deref(), Some("Good traction"));
    }

    #[test]
    fn readiness_falls_back_to_stored_score() {
        let mut p = profile(Some(AnalysisStatus::Completed), Some(json!({"executive_summary": "x"})));
        p.funding_readiness_score = Some(30);
        let AnalysisView::Completed { readiness, .. } = AnalysisView::from_profile(&p) else {
            panic!("expected completed view");
        };
        assert_eq!(readiness.unwrap().band, ReadinessBand::Low);
    }

    #[test]
    fn failed_shows_stored_error_and_retry() {
        let view = AnalysisView::from_profile(&profile(
            Some(AnalysisStatus::Failed),
            Some(json!({"error": "AI provider request failed: timeout"})),
        ));
        match view {
            AnalysisView::Failed { error, actions, .. } => {
                assert_eq!(error, "AI provider request failed: timeout");
                assert_eq!(actions, vec![ViewAction::Retry]);
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn failed_without_message_is_generic() {
        let view = AnalysisView::from_profile(&profile(Some(AnalysisStatus::Failed), None));
        let AnalysisView::Failed { error, .. } = view else {
            panic!("expected failed view");
        };
        assert_eq!(error, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn view_serializes_with_state_tag() {
        let view = AnalysisView::from_profile(&profile(None, None));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value, json!({"state": "not_started", "actions": ["request"]}));
    }

    #[test]
    fn html_escapes_model_text() {
        let analysis = json!({"executive_summary": "<script>alert('x')</script>"});
        let view = AnalysisView::from_profile(&profile(Some(AnalysisStatus::Completed), Some(analysis)));
        let html = render_html(&view, "Acme & Co");
        assert!(html.contains("<title>Acme &amp; Co · AI Analysis</title>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn html_for_empty_completed_analysis() {
        let view = AnalysisView::from_profile(&profile(Some(AnalysisStatus::Completed), Some(json!({}))));
        let html = render_html(&view, "Acme");
        assert!(html.contains("No insights generated"));
        assert!(html.contains("Next: Request analysis"));
    }
}
