use chrono::{DateTime, Utc};
use rise_common::types::{AnalysisStatus, InvestorProfile, NewStartupProfile, StartupProfile};

const NOT_AVAILABLE: &str = "N/A";

/// Builds the full analysis prompt for one startup.
///
/// Rendering is deterministic: the same profile always yields the same text,
/// and every absent value is written as `N/A`.
pub fn build_analysis_prompt(startup: &StartupProfile) -> String {
    ANALYSIS_PROMPT.replace("{{PROFILE_DATA}}", &format_profile(&startup.details))
}

/// Builds the short prompt asking for a bare 0-100 funding readiness score.
pub fn build_readiness_prompt(startup: &StartupProfile) -> String {
    let d = &startup.details;
    let description_len = d.description.as_deref().map_or(0, |s| s.chars().count());
    let clv_cac = match (d.kpi_clv, d.kpi_cac) {
        (Some(clv), Some(cac)) if cac > 0.0 => format!("{:.1}", clv / cac),
        _ => NOT_AVAILABLE.to_string(),
    };

    let data = format!(
        "- Description Provided: {} ({} chars)\n\
         - Industry / Stage Provided: {} / {}\n\
         - Team Size: {}\n\
         - Customers: {}\n\
         - Revenue: {}\n\
         - CLV / CAC Ratio: {}\n\
         - Pitch Deck Uploaded: {}\n",
        present(&d.description),
        description_len,
        present(&d.industry),
        present(&d.operational_stage),
        int_or_na(d.num_employees),
        int_or_na(d.num_customers),
        num_or_na(d.annual_revenue),
        clv_cac,
        present(&d.pitch_deck_url),
    );

    READINESS_PROMPT.replace("{{INPUT_DATA}}", &data)
}

/// Builds the prompt asking for investor-facing insights as a JSON array.
pub fn build_insights_prompt(startup: &StartupProfile) -> String {
    let d = &startup.details;
    let data = format!(
        "- Name: {}\n\
         - Industry: {}\n\
         - Sector: {}\n\
         - Operational Stage: {}\n\
         - Location: {}\n\
         - Description: {}\n\
         - Team Size: {}\n\
         - Customer Count: {}\n\
         - Annual Revenue: {}\n",
        d.name,
        text_or_na(&d.industry),
        text_or_na(&d.sector),
        text_or_na(&d.operational_stage),
        text_or_na(&d.location_city),
        text_or_na(&d.description),
        int_or_na(d.num_employees),
        int_or_na(d.num_customers),
        num_or_na(d.annual_revenue),
    );

    INSIGHTS_PROMPT.replace("{{PROFILE_DATA}}", &data)
}

/// Builds the matchmaking prompt: one investor's preferences followed by the
/// candidate startups, asking for a ranked JSON array of at most 10 matches.
pub fn build_suggestions_prompt(investor: &InvestorProfile, startups: &[StartupProfile]) -> String {
    let i = &investor.details;
    let preferences = format!(
        "Investor: {}\n\
         Preferences:\n\
         - Industries: {}\n\
         - Geography: {}\n\
         - Stage: {}\n",
        i.full_name,
        list_or_any(&i.preferred_industries),
        list_or_any(&i.preferred_geography),
        list_or_any(&i.preferred_stage),
    );

    let mut candidates = String::new();
    for (index, s) in startups.iter().enumerate() {
        let d = &s.details;
        candidates.push_str(&format!(
            "Startup {}:\n\
             - ID: {}\n\
             - Name: {}\n\
             - Industry: {}\n\
             - Stage: {}\n\
             - Location: {}, {}\n\
             - Description: {}\n\
             - Seeking Investment: {} (Target: {})\n\
             - Revenue (Annual): {}\n\
             - Team Size: {}\n\n",
            index + 1,
            s.id,
            d.name,
            text_or_na(&d.industry),
            text_or_na(&d.operational_stage),
            text_or_na(&d.location_city),
            text_or_na(&d.country_of_operation),
            text_or_na(&d.description),
            yes_no(d.seeking_investment),
            num_or_na(d.target_raise_amount),
            num_or_na(d.annual_revenue),
            int_or_na(d.team_size),
        ));
    }

    SUGGESTIONS_PROMPT
        .replace("{{INVESTOR}}", &preferences)
        .replace("{{STARTUPS}}", &candidates)
}

const ASSISTANT_DESCRIPTION_CHARS: usize = 150;

/// Who the assistant is talking to, when known.
#[derive(Debug, Clone, Copy)]
pub enum AssistantContext<'a> {
    Startup(&'a StartupProfile),
    Investor(&'a InvestorProfile),
    Anonymous,
}

/// Builds the assistant's system instruction: a summary of the caller's
/// profile (a completed analysis is included in full), the fixed
/// assistant guidelines and the current time.
pub fn build_assistant_system_prompt(context: AssistantContext<'_>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    match context {
        AssistantContext::Startup(startup) => out.push_str(&startup_context(startup)),
        AssistantContext::Investor(investor) => out.push_str(&investor_context(investor)),
        AssistantContext::Anonymous => {}
    }
    out.push_str(ASSISTANT_PROMPT);
    out.push_str(&format!(
        "\n\nCurrent date/time for context: {}",
        now.format("%A, %B %-d, %Y %H:%M UTC")
    ));
    out
}

fn startup_context(startup: &StartupProfile) -> String {
    let d = &startup.details;
    let description = match d.description.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            let short: String = text.chars().take(ASSISTANT_DESCRIPTION_CHARS).collect();
            format!("{short}...")
        }
        _ => NOT_AVAILABLE.to_string(),
    };
    let mut out = format!(
        "Context: The user asking is a Startup Founder.\n\
         --- Startup Profile Summary ---\n\
         - Name: {}\n\
         - Industry/Sector: {} / {}\n\
         - Stage: {}\n\
         - Location: {}\n\
         - Employees: {}\n\
         - Revenue (Annual): {}\n\
         - Seeking Raise: {}\n\
         - Description: {}\n",
        d.name,
        text_or_na(&d.industry),
        text_or_na(&d.sector),
        text_or_na(&d.operational_stage),
        text_or_na(&d.location_city),
        int_or_na(d.num_employees),
        num_or_na(d.annual_revenue),
        d.target_raise_amount
            .filter(|amount| *amount > 0.0)
            .map_or_else(|| "No/N/A".to_string(), |amount| format!("${}", format_number(amount))),
        description,
    );

    match (startup.analysis_status, &startup.ai_analysis) {
        (Some(AnalysisStatus::Completed), Some(analysis)) if analysis.is_object() => {
            let rendered = serde_json::to_string_pretty(analysis)
                .unwrap_or_else(|_| "(Error processing analysis data)".to_string());
            out.push_str("--- Full AI Analysis Data ---\n");
            out.push_str(&rendered);
            out.push_str("\n--- End AI Analysis Data ---\n");
        }
        (Some(AnalysisStatus::Processing), _) => {
            out.push_str("--- AI Analysis Status: Processing ---\n");
        }
        (Some(AnalysisStatus::Failed), _) => {
            out.push_str("--- AI Analysis Status: Failed ---\n");
        }
        _ => out.push_str("--- AI Analysis Status: Not run or outdated ---\n"),
    }
    out.push_str("-----------------------------\n\n");
    out
}

fn investor_context(investor: &InvestorProfile) -> String {
    let i = &investor.details;
    let joined = |values: &[String]| {
        if values.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            values.join(", ")
        }
    };
    format!(
        "Context: The user asking is an Investor.\n\
         --- Investor Profile Summary ---\n\
         - Name: {}\n\
         - Company: {}\n\
         - Job Title: {}\n\
         - Focus Industries: {}\n\
         - Focus Stage: {}\n\
         - Focus Geography: {}\n\
         -----------------------------\n\n",
        i.full_name,
        text_or_na(&i.company_name),
        text_or_na(&i.job_title),
        joined(&i.preferred_industries),
        joined(&i.preferred_stage),
        joined(&i.preferred_geography),
    )
}

fn list_or_any(values: &[String]) -> String {
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        "Any".to_string()
    } else {
        values.join(", ")
    }
}

/// Renders the profile block embedded in the analysis prompt.
fn format_profile(d: &NewStartupProfile) -> String {
    let mut out = String::new();

    out.push_str(&format!("Name: {}\n", d.name));
    out.push_str(&format!("Industry: {}\n", text_or_na(&d.industry)));
    out.push_str(&format!("Sector: {}\n", text_or_na(&d.sector)));
    out.push_str(&format!(
        "Location: {}, {}\n",
        text_or_na(&d.location_city),
        text_or_na(&d.country_of_operation)
    ));
    out.push_str(&format!("Description: {}\n", text_or_na(&d.description)));
    out.push_str(&format!(
        "Operational Stage: {}\n",
        text_or_na(&d.operational_stage)
    ));
    out.push_str(&format!("Founding Date: {}\n", text_or_na(&d.founding_date)));
    out.push_str(&format!(
        "Team Size: {} (Number of Employees: {})\n",
        int_or_na(d.team_size),
        int_or_na(d.num_employees)
    ));
    out.push_str(&format!(
        "Number of Customers: {}\n",
        int_or_na(d.num_customers)
    ));
    out.push_str(&format!(
        "Annual Revenue (Est.): {}\n",
        num_or_na(d.annual_revenue)
    ));
    out.push_str(&format!(
        "Annual Expenses (Est.): {}\n",
        num_or_na(d.annual_expenses)
    ));
    out.push_str(&format!("Has Co-Founder: {}\n", yes_no(d.has_co_founder)));
    out.push_str(&format!("Website: {}\n", text_or_na(&d.website)));
    out.push_str(&format!(
        "Pitch Deck Uploaded: {}\n",
        yes_no(Some(d.pitch_deck_url.is_some()))
    ));

    out.push('\n');
    out.push_str(&format!("Founder Name: {}\n", text_or_na(&d.founder_name)));
    out.push_str(&format!("Founder Title: {}\n", text_or_na(&d.founder_title)));
    out.push_str(&format!(
        "Founder Education: {}\n",
        text_or_na(&d.founder_education)
    ));
    out.push_str(&format!(
        "Previous Startup Experience: {}\n",
        text_or_na(&d.previous_startup_experience)
    ));
    out.push_str(&format!("Founder Bio: {}\n", text_or_na(&d.founder_bio)));
    let skills: Vec<&str> = d
        .tech_skills
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(skill, _)| skill.as_str())
        .collect();
    out.push_str(&format!(
        "Founder Tech Skills: {}\n",
        if skills.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            skills.join(", ")
        }
    ));

    out.push_str("\nKey Metrics Provided:\n");
    out.push_str(&format!("- CAC: {}\n", num_or_na(d.kpi_cac)));
    out.push_str(&format!("- CLV: {}\n", num_or_na(d.kpi_clv)));
    out.push_str(&format!(
        "- Retention Rate: {}\n",
        pct_or_na(d.kpi_retention_rate)
    ));
    out.push_str(&format!(
        "- Conversion Rate: {}\n",
        pct_or_na(d.kpi_conversion_rate)
    ));
    out.push_str(&format!(
        "- Monthly Growth Rate: {}\n",
        pct_or_na(d.kpi_monthly_growth)
    ));
    out.push_str(&format!(
        "- Payback Period (Months): {}\n",
        num_or_na(d.kpi_payback_period)
    ));
    out.push_str(&format!("- Churn Rate: {}\n", pct_or_na(d.kpi_churn_rate)));
    out.push_str(&format!("- NPS: {}\n", num_or_na(d.kpi_nps)));
    out.push_str(&format!(
        "- TAM Size Estimate: {}\n",
        text_or_na(&d.kpi_tam_size)
    ));
    out.push_str(&format!(
        "- Avg. Order Value: {}\n",
        num_or_na(d.kpi_avg_order_value)
    ));
    out.push_str(&format!(
        "- Market Share Estimate: {}\n",
        pct_or_na(d.kpi_market_share)
    ));
    out.push_str(&format!("- YoY Growth: {}\n", pct_or_na(d.kpi_yoy_growth)));

    out.push_str("\nMarket Analysis Info:\n");
    out.push_str(&format!(
        "- Market Growth Rate: {}\n",
        text_or_na(&d.market_growth_rate)
    ));
    out.push_str(&format!(
        "- Key Trends Mentioned: {}\n",
        text_or_na(&d.market_key_trends)
    ));
    out.push_str(&format!(
        "- Target Customer Profile: {}\n",
        text_or_na(&d.target_customer_profile)
    ));
    out.push_str(&format!(
        "- Customer Pain Points Addressed: {}\n",
        text_or_na(&d.customer_pain_points)
    ));
    out.push_str(&format!(
        "- Market Barriers Mentioned: {}\n",
        text_or_na(&d.market_barriers)
    ));
    out.push_str(&format!(
        "- Competitive Advantage Claimed: {}\n",
        text_or_na(&d.competitive_advantage)
    ));

    // The template always lists three competitor slots.
    out.push_str("\nCompetitor Info Provided:\n");
    for slot in 0..3 {
        let competitor = d.competitors.get(slot);
        out.push_str(&format!(
            "- Competitor {}: {} ({})\n",
            slot + 1,
            text_or_na(&competitor.and_then(|c| c.name.clone())),
            text_or_na(&competitor.and_then(|c| c.differentiator.clone())),
        ));
    }

    out.push_str("\nFunding Status:\n");
    out.push_str(&format!(
        "- Current Funding Level: {}\n",
        text_or_na(&d.current_funding)
    ));
    out.push_str(&format!(
        "- Seeking Investment: {}\n",
        yes_no(d.seeking_investment)
    ));
    out.push_str(&format!(
        "- Target Raise Amount: {}\n",
        num_or_na(d.target_raise_amount)
    ));

    out
}

fn text_or_na(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

fn int_or_na(value: Option<i64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn num_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), format_number)
}

fn pct_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{}%", format_number(v)))
}

fn yes_no(value: Option<bool>) -> &'static str {
    if value.unwrap_or(false) {
        "Yes"
    } else {
        "No"
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Whole numbers render without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

const ANALYSIS_PROMPT: &str = r#"You are an experienced venture capital analyst evaluating early-stage startups for seed investment. Be critical and specific, and ground every statement only in the profile data below, considering the startup's home market where relevant.

Produce a single valid JSON object with the structure below. Output nothing except that object: no surrounding prose and no markdown fences. When the data for a section is missing ('N/A') or insufficient, say so inside the field or omit the field.

{
  "executive_summary": "3-5 sentences on the business, its target market, key strengths and weaknesses, and overall investment potential",
  "swot_analysis": {
    "strengths": ["2-4 internal strengths"],
    "weaknesses": ["2-4 internal weaknesses or gaps"],
    "opportunities": ["2-3 external opportunities"],
    "threats": ["2-3 external threats"]
  },
  "market_positioning": "2-4 sentences on current positioning, audience fit and differentiation",
  "scalability_assessment": {
    "level": "Low | Medium | High",
    "justification": "2-4 sentences"
  },
  "competitive_advantage_evaluation": {
    "assessment": "2-4 sentences on uniqueness, defensibility and sustainability",
    "suggestion": "one concrete way to strengthen the advantage"
  },
  "current_challenges": ["2-4 challenges for the next 6 months"],
  "key_risks": ["3 significant risks"],
  "strategic_recommendations": ["3 prioritized recommendations for the next 6 months"],
  "suggested_kpis": [{"kpi": "name", "justification": "1-2 sentences"}],
  "what_if_scenarios": [{"scenario": "plausible near-term event", "outcome": "likely consequence"}],
  "growth_plan_phases": [
    {"period": "Months 1-3", "focus": "theme", "description": "key activities"},
    {"period": "Months 4-6", "focus": "theme", "description": "key activities"},
    {"period": "Months 7-9", "focus": "theme", "description": "key activities"},
    {"period": "Months 10-12", "focus": "theme", "description": "key activities"}
  ],
  "funding_outlook": "2-3 sentences on funding situation and milestones needed for the target raise",
  "financial_assessment": {
    "strengths": ["1-2 positive financial aspects"],
    "weaknesses": ["1-2 financial concerns"],
    "recommendations": ["1-2 improvements"]
  },
  "cash_burn_rate": {
    "monthly_rate": 0,
    "runway_months": 0,
    "assessment": "sustainability of the burn; use null numbers when impossible to estimate"
  },
  "profitability_projection": {
    "estimated_timeframe": "e.g. 6-12 months, 12+ months, Unclear",
    "key_factors": ["2-3 factors"]
  },
  "funding_readiness_score": 0,
  "funding_readiness_justification": "2-4 sentences explaining the score"
}

funding_readiness_score is an integer from 1 (not ready) to 100 (very ready), or null when assessment is impossible.

--- STARTUP PROFILE DATA ---
{{PROFILE_DATA}}--- END STARTUP PROFILE DATA ---

Now output only the JSON analysis object for the profile above."#;

const READINESS_PROMPT: &str = r#"You are calculating a Funding Readiness Score from 0 to 100 for a startup.
Base the estimate only on the data below, weighing profile completeness, traction signals (revenue, customers, team, CLV/CAC ratio) and pitch readiness. Higher scores mean better readiness.

Input data:
{{INPUT_DATA}}
Output only the integer score between 0 and 100, with no other text.

Score:"#;

const INSIGHTS_PROMPT: &str = r#"You are an assistant on a platform connecting startups and investors.
Review the startup profile below and list 3-5 concise considerations an investor should weigh. Use only the provided data and keep each point factual.

Startup profile:
{{PROFILE_DATA}}
Answer with a JSON array only. Each element is an object with:
  "title": short headline,
  "summary": one or two sentences,
  "category": one of Recommendation, Strength, Weakness, Opportunity, Threat,
  "severity": one of High, Medium, Low"#;

const SUGGESTIONS_PROMPT: &str = r#"You are a matchmaking engine pairing venture investors with startups.
Using only the data below, pick the startups that best fit this investor.

Investor profile:
{{INVESTOR}}
Available startups:
{{STARTUPS}}
Instructions:
1. Weigh each startup against the investor's industry, geography and stage preferences.
2. Consider market fit, traction and funding needs relative to the stage.
3. Answer with a JSON array only, no prose or markdown. Each element is an object with:
  "id": the startup ID from the list above,
  "startupName": the startup name,
  "matchScore": a number from 1 to 100,
  "highlights": 2-3 short strings on why the startup is relevant,
  "matchReason": one or two sentences on why it fits this investor
4. Rank from highest matchScore to lowest and return at most 10 entries."#;

const ASSISTANT_PROMPT: &str = r#"You are RISE AI, an assistant on the RISE platform supporting startup founders and investors. Give insightful, actionable guidance that fits the user's situation.

Guidelines:
1. Use the user context above when it is present and do not ask for information it already contains.
2. Explain platform features (startup profiles, investor matching, AI analysis) and how to use them. Never claim you can perform actions on the platform yourself.
3. Help users interpret their AI analysis: SWOT, scalability, financials and risks.
4. Ground strategic advice on fundraising, growth or deal evaluation in the user's stage, industry and funding status.
5. Keep a professional, objective tone. Avoid speculation and definitive predictions.
6. Ask a specific clarifying question when a request needs information you do not have.
7. Format answers in Markdown, using bold for key terms and lists for steps or options.

Limitations: you cannot access live external data or perform platform actions, and your general knowledge has a cutoff date. Say so when it matters."#;
