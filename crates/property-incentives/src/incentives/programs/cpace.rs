use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    format_currency, BenefitSummary, ProgramEvaluator, ProgramKey, ProgramPayload, ProjectDetails,
};
use crate::incentives::error::IncentiveError;
use crate::incentives::geo::{Site, SiteResolver};

const INTEREST_RATE: f64 = 0.065;
const TERM_YEARS: u32 = 20;
// share of project cost assumed to be qualifying improvements when none is given
const DEFAULT_IMPROVEMENT_SHARE: f64 = 0.20;
// first-year energy savings as a share of improvement cost
const SAVINGS_RATIO: f64 = 0.10;

const ACTIVE_PROGRAMS: &[(&str, &str)] = &[
    ("CA", "California PACE (CMFA / CSCDA)"),
    ("CO", "Colorado C-PACE"),
    ("CT", "Connecticut Green Bank C-PACE"),
    ("DC", "DC PACE"),
    ("FL", "Florida PACE Funding Agency"),
    ("IL", "Illinois C-PACE"),
    ("MD", "Maryland Clean Energy Center C-PACE"),
    ("MI", "Lean & Green Michigan"),
    ("MN", "Minnesota PACE (St. Paul Port Authority)"),
    ("MO", "Missouri Clean Energy District"),
    ("NY", "Energize NY / NYCEEC"),
    ("OH", "Ohio Energy Special Improvement District"),
    ("PA", "Pennsylvania C-PACE"),
    ("TX", "Texas PACE Authority"),
    ("VA", "Virginia PACE"),
    ("WA", "Washington C-PACER"),
    ("WI", "PACE Wisconsin"),
];

pub fn active_program(state_code: Option<&str>) -> Option<&'static str> {
    let code = state_code?;
    ACTIVE_PROGRAMS
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, name)| *name)
}

/// Level annual payment on a fixed-rate, fully amortizing loan.
pub fn annual_payment(principal: f64, rate: f64, years: u32) -> f64 {
    if years == 0 {
        return principal;
    }
    if rate.abs() < f64::EPSILON {
        return principal / f64::from(years);
    }
    principal * rate / (1.0 - (1.0 + rate).powi(-(years as i32)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CPaceTerms {
    pub program_name: String,
    pub financed_amount: f64,
    pub interest_rate: f64,
    pub term_years: u32,
    pub annual_payment: f64,
    pub estimated_annual_savings: f64,
    /// Simple, undiscounted: financed amount over annual savings.
    pub payback_years: f64,
    pub net_annual_cash_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CPaceFindings {
    pub state: String,
    pub terms: Option<CPaceTerms>,
    pub benefits: Option<BenefitSummary>,
    pub reasons: Vec<String>,
}

impl CPaceFindings {
    pub fn determine(site: &Site, details: &ProjectDetails, default_project_cost: f64) -> Self {
        let Some(program_name) = active_program(site.state_code.as_deref()) else {
            return Self {
                state: site.state.clone(),
                terms: None,
                benefits: None,
                reasons: vec![format!(
                    "No active commercial PACE program is enabled in {}",
                    site.state
                )],
            };
        };

        let financed_amount = details
            .improvement_cost
            .filter(|cost| cost.is_finite() && *cost > 0.0)
            .unwrap_or_else(|| {
                details.project_cost_or(default_project_cost) * DEFAULT_IMPROVEMENT_SHARE
            });
        let payment = annual_payment(financed_amount, INTEREST_RATE, TERM_YEARS);
        let estimated_annual_savings = financed_amount * SAVINGS_RATIO;
        let payback_years = financed_amount / estimated_annual_savings;

        let terms = CPaceTerms {
            program_name: program_name.to_string(),
            financed_amount,
            interest_rate: INTEREST_RATE,
            term_years: TERM_YEARS,
            annual_payment: payment,
            estimated_annual_savings,
            payback_years,
            net_annual_cash_flow: estimated_annual_savings - payment,
        };

        let benefits = BenefitSummary {
            credit_rate: format!(
                "Up to 100% financing of qualifying improvements at {:.1}% fixed",
                INTEREST_RATE * 100.0
            ),
            timeline: format!("Repaid over {TERM_YEARS} years through a property tax assessment"),
            requirements: vec![
                "Energy efficiency, renewable, or resiliency improvements".to_string(),
                "Mortgage lender consent".to_string(),
                "Engineering or energy audit supporting projected savings".to_string(),
                "Property taxes current with no recent defaults".to_string(),
            ],
            highlights: vec![
                format!(
                    "{} financed; annual assessment {}",
                    format_currency(financed_amount),
                    format_currency(payment)
                ),
                format!(
                    "Estimated savings {} per year; simple payback {:.1} years",
                    format_currency(estimated_annual_savings),
                    payback_years
                ),
                "Assessment transfers with the property on sale".to_string(),
            ],
        };

        Self {
            state: site.state.clone(),
            terms: Some(terms),
            benefits: Some(benefits),
            reasons: Vec::new(),
        }
    }
}

pub struct CPaceEvaluator {
    resolver: SiteResolver,
    default_project_cost: f64,
}

impl CPaceEvaluator {
    pub fn new(resolver: SiteResolver, default_project_cost: f64) -> Self {
        Self {
            resolver,
            default_project_cost,
        }
    }
}

#[async_trait]
impl ProgramEvaluator for CPaceEvaluator {
    fn program(&self) -> ProgramKey {
        ProgramKey::CPace
    }

    async fn assess(
        &self,
        address: &str,
        details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError> {
        let site = self.resolver.resolve(address).await?;
        Ok(ProgramPayload::CPace(CPaceFindings::determine(
            &site,
            details,
            self.default_project_cost,
        )))
    }
}
