//! The five incentive programs and their evaluators.
//!
//! Each evaluator resolves the site through the shared [`SiteResolver`] and
//! applies its own rule table. Payload shapes differ per program, so they are
//! modeled as the closed [`ProgramPayload`] union and availability is read
//! through an exhaustive match rather than a generic field lookup.

mod cpace;
mod historic;
mod new_markets;
mod opportunity_zone;
mod sba504;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{IncentiveError, ProgramFailure};
use super::geo::SiteResolver;

pub use cpace::{CPaceEvaluator, CPaceFindings, CPaceTerms};
pub use historic::{HistoricFindings, HistoricTaxCreditEvaluator, FEDERAL_HISTORIC_RATE};
pub use new_markets::{NewMarketsFindings, NewMarketsEvaluator, NMTC_CREDIT_RATE};
pub use opportunity_zone::{OpportunityZoneEvaluator, OpportunityZoneFindings};
pub use sba504::{EligibilityCheck, FinancingStructure, Sba504Evaluator, Sba504Findings};

/// Identifier of one of the five fixed incentive programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgramKey {
    #[serde(rename = "opportunityZone")]
    OpportunityZone,
    #[serde(rename = "historicTaxCredit")]
    HistoricTaxCredit,
    #[serde(rename = "newMarketsTC")]
    NewMarketsTaxCredit,
    #[serde(rename = "cPACE")]
    CPace,
    #[serde(rename = "sba504")]
    Sba504,
}

impl ProgramKey {
    pub const ALL: [ProgramKey; 5] = [
        ProgramKey::OpportunityZone,
        ProgramKey::HistoricTaxCredit,
        ProgramKey::NewMarketsTaxCredit,
        ProgramKey::CPace,
        ProgramKey::Sba504,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::OpportunityZone => "Opportunity Zone",
            Self::HistoricTaxCredit => "Historic Tax Credit",
            Self::NewMarketsTaxCredit => "New Markets Tax Credit",
            Self::CPace => "C-PACE",
            Self::Sba504 => "SBA 504",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpportunityZone => "opportunityZone",
            Self::HistoricTaxCredit => "historicTaxCredit",
            Self::NewMarketsTaxCredit => "newMarketsTC",
            Self::CPace => "cPACE",
            Self::Sba504 => "sba504",
        }
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Optional project financials and business attributes supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDetails {
    pub project_cost: Option<f64>,
    /// Portion of the project spent on energy or resiliency improvements.
    pub improvement_cost: Option<f64>,
    pub annual_revenue: Option<f64>,
    /// Average after-tax net income over the last two years.
    pub net_income: Option<f64>,
    pub employees: Option<u32>,
    pub net_worth: Option<f64>,
    pub jobs_created: Option<u32>,
    pub owner_occupancy_pct: Option<f64>,
    pub years_in_business: Option<f64>,
    pub year_built: Option<i32>,
    pub use_of_funds: Option<UseOfFunds>,
    /// Share of project cost raised as NMTC-eligible equity.
    pub equity_fraction: Option<f64>,
}

impl ProjectDetails {
    pub fn with_project_cost(cost: f64) -> Self {
        Self {
            project_cost: Some(cost),
            ..Self::default()
        }
    }

    pub fn project_cost_or(&self, fallback: f64) -> f64 {
        self.project_cost
            .filter(|cost| cost.is_finite() && *cost > 0.0)
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseOfFunds {
    RealEstatePurchase,
    Construction,
    Renovation,
    Equipment,
    WorkingCapital,
    Refinance,
    Inventory,
}

impl UseOfFunds {
    /// Fixed-asset uses that long-term programs finance.
    pub const fn is_fixed_asset(self) -> bool {
        matches!(
            self,
            Self::RealEstatePurchase | Self::Construction | Self::Renovation | Self::Equipment
        )
    }
}

/// Stable description of what an eligible program offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitSummary {
    pub credit_rate: String,
    pub timeline: String,
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

/// Program-specific determination returned by a successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", content = "findings")]
pub enum ProgramPayload {
    #[serde(rename = "opportunityZone")]
    OpportunityZone(OpportunityZoneFindings),
    #[serde(rename = "historicTaxCredit")]
    HistoricTaxCredit(HistoricFindings),
    #[serde(rename = "newMarketsTC")]
    NewMarketsTaxCredit(NewMarketsFindings),
    #[serde(rename = "cPACE")]
    CPace(CPaceFindings),
    #[serde(rename = "sba504")]
    Sba504(Sba504Findings),
}

impl ProgramPayload {
    pub fn program(&self) -> ProgramKey {
        match self {
            Self::OpportunityZone(_) => ProgramKey::OpportunityZone,
            Self::HistoricTaxCredit(_) => ProgramKey::HistoricTaxCredit,
            Self::NewMarketsTaxCredit(_) => ProgramKey::NewMarketsTaxCredit,
            Self::CPace(_) => ProgramKey::CPace,
            Self::Sba504(_) => ProgramKey::Sba504,
        }
    }

    /// Availability as determined by each program's own payload.
    pub fn is_available(&self) -> bool {
        match self {
            Self::OpportunityZone(findings) => findings.designated,
            Self::HistoricTaxCredit(findings) => findings.eligible,
            Self::NewMarketsTaxCredit(findings) => findings.low_income_community,
            Self::CPace(findings) => findings.terms.is_some(),
            Self::Sba504(findings) => findings.eligible,
        }
    }

    pub fn benefits(&self) -> Option<&BenefitSummary> {
        match self {
            Self::OpportunityZone(findings) => findings.benefits.as_ref(),
            Self::HistoricTaxCredit(findings) => findings.benefits.as_ref(),
            Self::NewMarketsTaxCredit(findings) => findings.benefits.as_ref(),
            Self::CPace(findings) => findings.benefits.as_ref(),
            Self::Sba504(findings) => findings.benefits.as_ref(),
        }
    }

    /// Reasons the program is unavailable, or informational issues when it is.
    pub fn notes(&self) -> &[String] {
        match self {
            Self::OpportunityZone(findings) => &findings.reasons,
            Self::HistoricTaxCredit(findings) => &findings.reasons,
            Self::NewMarketsTaxCredit(findings) => &findings.reasons,
            Self::CPace(findings) => &findings.reasons,
            Self::Sba504(findings) => &findings.issues,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

impl ResultStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Normalized outcome for one program.
///
/// Constructed only through [`ProgramResult::success`] and
/// [`ProgramResult::failure`], so an error never carries data and
/// `available` always follows from the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramResult {
    program: ProgramKey,
    status: ResultStatus,
    available: bool,
    data: Option<ProgramPayload>,
    error: Option<ProgramFailure>,
}

impl ProgramResult {
    pub fn success(payload: ProgramPayload) -> Self {
        Self {
            program: payload.program(),
            status: ResultStatus::Success,
            available: payload.is_available(),
            data: Some(payload),
            error: None,
        }
    }

    pub fn failure(failure: ProgramFailure) -> Self {
        Self {
            program: failure.program,
            status: ResultStatus::Error,
            available: false,
            data: None,
            error: Some(failure),
        }
    }

    pub fn program(&self) -> ProgramKey {
        self.program
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn data(&self) -> Option<&ProgramPayload> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ProgramFailure> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|failure| failure.message.as_str())
    }
}

/// One program's rule set.
#[async_trait]
pub trait ProgramEvaluator: Send + Sync {
    fn program(&self) -> ProgramKey;

    /// Produce the program's determination; ineligibility is an `Ok` payload.
    async fn assess(
        &self,
        address: &str,
        details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError>;

    /// Assess and normalize, so nothing escapes this evaluator's boundary.
    async fn evaluate(&self, address: &str, details: &ProjectDetails) -> ProgramResult {
        match self.assess(address, details).await {
            Ok(payload) if payload.program() == self.program() => ProgramResult::success(payload),
            Ok(payload) => ProgramResult::failure(
                IncentiveError::validation(format!(
                    "evaluator returned a {} payload",
                    payload.program()
                ))
                .into_failure(self.program()),
            ),
            Err(err) => ProgramResult::failure(err.into_failure(self.program())),
        }
    }
}

/// The five production evaluators sharing one resolver.
pub fn standard_evaluators(
    resolver: SiteResolver,
    default_project_cost: f64,
) -> Vec<Arc<dyn ProgramEvaluator>> {
    vec![
        Arc::new(OpportunityZoneEvaluator::new(resolver.clone())),
        Arc::new(HistoricTaxCreditEvaluator::new(resolver.clone())),
        Arc::new(NewMarketsEvaluator::new(
            resolver.clone(),
            default_project_cost,
        )),
        Arc::new(CPaceEvaluator::new(resolver.clone(), default_project_cost)),
        Arc::new(Sba504Evaluator::new(resolver, default_project_cost)),
    ]
}

pub(crate) fn format_currency(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
