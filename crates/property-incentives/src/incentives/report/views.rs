use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::incentives::address::{CensusTract, Coordinates};
use crate::incentives::analysis::{Priority, RiskLevel};
use crate::incentives::programs::ProgramKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrength {
    StronglyRecommended,
    Recommended,
    ConsiderCarefully,
}

impl RecommendationStrength {
    pub const fn label(self) -> &'static str {
        match self {
            Self::StronglyRecommended => "Strongly Recommended",
            Self::Recommended => "Recommended",
            Self::ConsiderCarefully => "Consider Carefully",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveSummary {
    pub programs_evaluated: usize,
    pub available_programs: usize,
    pub failed_programs: usize,
    pub estimated_total_value: f64,
    pub key_findings: Vec<String>,
    pub recommendation_strength: RecommendationStrength,
    pub recommendation_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationAnalysis {
    pub address: String,
    pub normalized_address: String,
    pub coordinates: Option<Coordinates>,
    pub census_tract: Option<CensusTract>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncentiveDetail {
    pub program: ProgramKey,
    pub program_label: &'static str,
    pub status_label: &'static str,
    pub available: bool,
    pub estimated_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    pub requirements: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseCase {
    pub project_cost: f64,
    pub financing_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IncentiveScenario {
    pub tax_credits: f64,
    pub interest_savings: f64,
    pub other_benefits: f64,
    pub net_project_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinancialProjections {
    pub base_case: BaseCase,
    pub with_incentives: IncentiveScenario,
    /// `base_case.total_cost - with_incentives.net_project_cost`.
    pub total_savings: f64,
    pub savings_pct: f64,
    pub recommendation_strength: RecommendationStrength,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImplementationPhase {
    pub phase: u8,
    pub name: &'static str,
    pub duration: &'static str,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub level_label: &'static str,
    pub factors: Vec<String>,
    pub mitigations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextStep {
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<ProgramKey>,
    pub priority: Priority,
    pub priority_label: &'static str,
    pub action: String,
    pub timeline: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub generated_at: DateTime<Utc>,
    pub analysis_generated_at: DateTime<Utc>,
    pub executive_summary: ExecutiveSummary,
    pub location: LocationAnalysis,
    pub incentives: Vec<IncentiveDetail>,
    pub projections: FinancialProjections,
    pub implementation_plan: Vec<ImplementationPhase>,
    pub risk_assessment: RiskAssessment,
    pub next_steps: Vec<NextStep>,
}
