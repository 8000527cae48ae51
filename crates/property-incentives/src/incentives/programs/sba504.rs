use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    format_currency, BenefitSummary, ProgramEvaluator, ProgramKey, ProgramPayload, ProjectDetails,
};
use crate::incentives::error::IncentiveError;
use crate::incentives::geo::SiteResolver;

const MAX_EMPLOYEES: u32 = 500;
const MAX_ANNUAL_REVENUE: f64 = 41_500_000.0;
const MAX_TANGIBLE_NET_WORTH: f64 = 20_000_000.0;
const MAX_NET_INCOME: f64 = 6_500_000.0;
const DEBENTURE_PER_JOB: f64 = 90_000.0;
const MIN_OWNER_OCCUPANCY_PCT: f64 = 51.0;
const ESTABLISHED_BUSINESS_YEARS: f64 = 2.0;

const BANK_SHARE: f64 = 0.50;
const CDC_SHARE: f64 = 0.40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub name: String,
    pub passed: bool,
    /// Critical checks gate eligibility; others only raise issues.
    pub critical: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingStructure {
    pub project_cost: f64,
    pub bank_loan: f64,
    pub cdc_debenture: f64,
    pub borrower_equity: f64,
    pub borrower_equity_pct: f64,
}

impl FinancingStructure {
    fn for_project(project_cost: f64, startup: bool) -> Self {
        // startups put 5 extra points down, taken from the CDC portion
        let borrower_equity_pct = if startup { 0.15 } else { 0.10 };
        let cdc_share = CDC_SHARE - (borrower_equity_pct - 0.10);
        Self {
            project_cost,
            bank_loan: project_cost * BANK_SHARE,
            cdc_debenture: project_cost * cdc_share,
            borrower_equity: project_cost * borrower_equity_pct,
            borrower_equity_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sba504Findings {
    pub eligible: bool,
    pub checks: Vec<EligibilityCheck>,
    pub issues: Vec<String>,
    pub jobs_required: u32,
    pub structure: FinancingStructure,
    pub benefits: Option<BenefitSummary>,
}

struct Checklist {
    checks: Vec<EligibilityCheck>,
    issues: Vec<String>,
}

impl Checklist {
    fn new() -> Self {
        Self {
            checks: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, critical: bool, passed: bool, detail: String) {
        if !passed {
            self.issues.push(detail.clone());
        }
        self.checks.push(EligibilityCheck {
            name: name.to_string(),
            passed,
            critical,
            detail,
        });
    }

    fn assume(&mut self, name: &str, critical: bool, detail: String) {
        self.issues.push(detail.clone());
        self.checks.push(EligibilityCheck {
            name: name.to_string(),
            passed: true,
            critical,
            detail,
        });
    }

    fn critical_passed(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical)
            .all(|check| check.passed)
    }
}

impl Sba504Findings {
    pub fn determine(details: &ProjectDetails, default_project_cost: f64) -> Self {
        let project_cost = details.project_cost_or(default_project_cost);
        let startup = details
            .years_in_business
            .is_some_and(|years| years < ESTABLISHED_BUSINESS_YEARS);
        let structure = FinancingStructure::for_project(project_cost, startup);
        let jobs_required = (structure.cdc_debenture / DEBENTURE_PER_JOB).ceil() as u32;

        let mut list = Checklist::new();

        match (details.employees, details.annual_revenue) {
            (None, None) => list.assume(
                "size_standard",
                true,
                "Employee count and revenue not provided; size standard assumed met".to_string(),
            ),
            (employees, revenue) => {
                let employees_ok = employees.map_or(true, |count| count <= MAX_EMPLOYEES);
                let revenue_ok = revenue.map_or(true, |amount| amount <= MAX_ANNUAL_REVENUE);
                let detail = if employees_ok && revenue_ok {
                    "Business is within SBA small business size standards".to_string()
                } else {
                    format!(
                        "Exceeds size standard (max {MAX_EMPLOYEES} employees, {} revenue)",
                        format_currency(MAX_ANNUAL_REVENUE)
                    )
                };
                list.record("size_standard", true, employees_ok && revenue_ok, detail);
            }
        }

        match (details.net_worth, details.net_income) {
            (None, None) => list.assume(
                "financial_caps",
                true,
                "Net worth and net income not provided; financial caps assumed met".to_string(),
            ),
            (net_worth, net_income) => {
                let worth_ok = net_worth.map_or(true, |worth| worth <= MAX_TANGIBLE_NET_WORTH);
                let income_ok = net_income.map_or(true, |income| income <= MAX_NET_INCOME);
                let detail = if worth_ok && income_ok {
                    "Tangible net worth and net income within 504 limits".to_string()
                } else {
                    format!(
                        "Exceeds 504 financial caps (net worth {}, average net income {})",
                        format_currency(MAX_TANGIBLE_NET_WORTH),
                        format_currency(MAX_NET_INCOME)
                    )
                };
                list.record("financial_caps", true, worth_ok && income_ok, detail);
            }
        }

        match details.use_of_funds {
            Some(use_of_funds) => list.record(
                "use_of_funds",
                true,
                use_of_funds.is_fixed_asset(),
                if use_of_funds.is_fixed_asset() {
                    "Funds finance long-term fixed assets".to_string()
                } else {
                    "504 loans cannot fund working capital, inventory, or debt refinance without \
                     expansion"
                        .to_string()
                },
            ),
            None => list.assume(
                "use_of_funds",
                true,
                "Use of funds not provided; fixed-asset purchase assumed".to_string(),
            ),
        }

        match details.jobs_created {
            Some(jobs) => list.record(
                "job_creation",
                true,
                jobs >= jobs_required,
                format!(
                    "{jobs} job(s) created; {jobs_required} required at one per {} of debenture",
                    format_currency(DEBENTURE_PER_JOB)
                ),
            ),
            None => list.assume(
                "job_creation",
                true,
                format!(
                    "Job creation not provided; {jobs_required} job(s) or a public policy goal \
                     required"
                ),
            ),
        }

        match details.owner_occupancy_pct {
            Some(pct) => list.record(
                "owner_occupancy",
                false,
                pct >= MIN_OWNER_OCCUPANCY_PCT,
                format!("Owner occupies {pct:.0}% of the property; 51% required"),
            ),
            None => list.assume(
                "owner_occupancy",
                false,
                "Owner occupancy not provided; business must occupy at least 51%".to_string(),
            ),
        }

        if let Some(years) = details.years_in_business {
            list.record(
                "business_age",
                false,
                !startup,
                format!("{years:.1} years in business; startups contribute 15% equity"),
            );
        }

        let eligible = list.critical_passed();
        let benefits = eligible.then(|| BenefitSummary {
            credit_rate: "As little as 10% down with a below-market fixed rate on the CDC portion"
                .to_string(),
            timeline: "60-90 days to approval; 10, 20, or 25-year fixed terms".to_string(),
            requirements: vec![
                "For-profit business within SBA size standards".to_string(),
                "Owner occupancy of at least 51% of the property".to_string(),
                "Job creation or public policy goal".to_string(),
                "Financing through a Certified Development Company and a participating lender"
                    .to_string(),
            ],
            highlights: vec![format!(
                "{} bank / {} CDC / {} borrower on {}",
                format_currency(structure.bank_loan),
                format_currency(structure.cdc_debenture),
                format_currency(structure.borrower_equity),
                format_currency(project_cost)
            )],
        });

        Self {
            eligible,
            checks: list.checks,
            issues: list.issues,
            jobs_required,
            structure,
            benefits,
        }
    }
}

pub struct Sba504Evaluator {
    resolver: SiteResolver,
    default_project_cost: f64,
}

impl Sba504Evaluator {
    pub fn new(resolver: SiteResolver, default_project_cost: f64) -> Self {
        Self {
            resolver,
            default_project_cost,
        }
    }
}

#[async_trait]
impl ProgramEvaluator for Sba504Evaluator {
    fn program(&self) -> ProgramKey {
        ProgramKey::Sba504
    }

    async fn assess(
        &self,
        address: &str,
        details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError> {
        // eligibility is business-driven; the site only has to exist
        self.resolver.resolve(address).await?;
        Ok(ProgramPayload::Sba504(Sba504Findings::determine(
            details,
            self.default_project_cost,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incentives::programs::UseOfFunds;

    fn qualifying_business() -> ProjectDetails {
        ProjectDetails {
            project_cost: Some(1_800_000.0),
            annual_revenue: Some(4_000_000.0),
            net_income: Some(350_000.0),
            employees: Some(35),
            net_worth: Some(2_500_000.0),
            jobs_created: Some(8),
            owner_occupancy_pct: Some(70.0),
            years_in_business: Some(6.0),
            use_of_funds: Some(UseOfFunds::RealEstatePurchase),
            ..ProjectDetails::default()
        }
    }

    #[test]
    fn qualifying_business_passes_every_check() {
        let findings = Sba504Findings::determine(&qualifying_business(), 1.0);

        assert!(findings.eligible);
        assert!(findings.issues.is_empty(), "issues: {:?}", findings.issues);
        assert_eq!(findings.jobs_required, 8);
        assert!((findings.structure.cdc_debenture - 720_000.0).abs() < 1e-6);
        assert!(findings.benefits.is_some());
    }

    #[test]
    fn failing_any_critical_check_blocks_eligibility() {
        let details = ProjectDetails {
            net_worth: Some(25_000_000.0),
            ..qualifying_business()
        };
        let findings = Sba504Findings::determine(&details, 1.0);
        assert!(!findings.eligible);
        assert!(findings.benefits.is_none());

        let details = ProjectDetails {
            use_of_funds: Some(UseOfFunds::WorkingCapital),
            ..qualifying_business()
        };
        assert!(!Sba504Findings::determine(&details, 1.0).eligible);

        let details = ProjectDetails {
            jobs_created: Some(2),
            ..qualifying_business()
        };
        assert!(!Sba504Findings::determine(&details, 1.0).eligible);
    }

    #[test]
    fn occupancy_and_business_age_are_informational() {
        let details = ProjectDetails {
            owner_occupancy_pct: Some(40.0),
            years_in_business: Some(1.0),
            jobs_created: Some(20),
            ..qualifying_business()
        };
        let findings = Sba504Findings::determine(&details, 1.0);

        assert!(findings.eligible);
        assert_eq!(findings.issues.len(), 2);
        assert!((findings.structure.borrower_equity_pct - 0.15).abs() < 1e-9);
    }

    #[test]
    fn missing_business_data_is_assumed_with_issues() {
        let findings = Sba504Findings::determine(&ProjectDetails::default(), 1_000_000.0);

        assert!(findings.eligible);
        assert_eq!(findings.jobs_required, 5);
        assert!(findings
            .issues
            .iter()
            .any(|issue| issue.contains("Job creation not provided")));
        assert!(ProgramPayload::Sba504(findings).is_available());
    }
}
