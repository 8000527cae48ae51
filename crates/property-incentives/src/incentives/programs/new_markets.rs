use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    format_currency, BenefitSummary, ProgramEvaluator, ProgramKey, ProgramPayload, ProjectDetails,
};
use crate::incentives::error::IncentiveError;
use crate::incentives::geo::{SiteResolver, TractDemographics};

/// Credit as a share of the qualified equity investment, claimed over seven years.
pub const NMTC_CREDIT_RATE: f64 = 0.39;

const DEFAULT_EQUITY_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMarketsFindings {
    pub poverty_rate: f64,
    pub median_income_ratio: f64,
    pub unemployment_ratio: f64,
    pub low_income_community: bool,
    pub severely_distressed: bool,
    pub project_cost: f64,
    pub equity_fraction: f64,
    pub qualified_equity_investment: f64,
    pub credit_value: f64,
    pub benefits: Option<BenefitSummary>,
    pub reasons: Vec<String>,
}

/// Credit value of a project: equity share of cost times the 39% credit.
pub fn nmtc_credit_value(project_cost: f64, equity_fraction: f64) -> f64 {
    project_cost * equity_fraction * NMTC_CREDIT_RATE
}

impl NewMarketsFindings {
    pub fn determine(
        demographics: &TractDemographics,
        details: &ProjectDetails,
        default_project_cost: f64,
    ) -> Self {
        let project_cost = details.project_cost_or(default_project_cost);
        let equity_fraction = details
            .equity_fraction
            .filter(|fraction| (0.0..=1.0).contains(fraction) && *fraction > 0.0)
            .unwrap_or(DEFAULT_EQUITY_FRACTION);
        let qualified_equity_investment = project_cost * equity_fraction;
        let credit_value = nmtc_credit_value(project_cost, equity_fraction);

        let low_income_community = demographics.low_income_community();
        let severely_distressed = demographics.severely_distressed();

        let mut reasons = Vec::new();
        if !low_income_community {
            reasons.push(format!(
                "Tract poverty rate {:.1}% is below the 20% threshold",
                demographics.poverty_rate * 100.0
            ));
            reasons.push(format!(
                "Tract median family income is {:.0}% of area median; 80% or less required",
                demographics.median_income_ratio * 100.0
            ));
        }

        let benefits = low_income_community.then(|| {
            let mut highlights = vec![format!(
                "Estimated credit value {} on {} of qualified equity",
                format_currency(credit_value),
                format_currency(qualified_equity_investment)
            )];
            if severely_distressed {
                highlights.push(
                    "Severely distressed tract; prioritized by most CDE allocations".to_string(),
                );
            }

            BenefitSummary {
                credit_rate: "39% of the qualified equity investment over 7 years".to_string(),
                timeline: "5% annually for years 1-3, 6% annually for years 4-7".to_string(),
                requirements: vec![
                    "Financing through a Community Development Entity with allocation".to_string(),
                    "Qualified active low-income community business".to_string(),
                    "Investment held for the 7-year compliance period".to_string(),
                ],
                highlights,
            }
        });

        Self {
            poverty_rate: demographics.poverty_rate,
            median_income_ratio: demographics.median_income_ratio,
            unemployment_ratio: demographics.unemployment_ratio,
            low_income_community,
            severely_distressed,
            project_cost,
            equity_fraction,
            qualified_equity_investment,
            credit_value,
            benefits,
            reasons,
        }
    }
}

pub struct NewMarketsEvaluator {
    resolver: SiteResolver,
    default_project_cost: f64,
}

impl NewMarketsEvaluator {
    pub fn new(resolver: SiteResolver, default_project_cost: f64) -> Self {
        Self {
            resolver,
            default_project_cost,
        }
    }
}

#[async_trait]
impl ProgramEvaluator for NewMarketsEvaluator {
    fn program(&self) -> ProgramKey {
        ProgramKey::NewMarketsTaxCredit
    }

    async fn assess(
        &self,
        address: &str,
        details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError> {
        let site = self.resolver.resolve(address).await?;
        let demographics = self.resolver.demographics(&site.census_tract).await?;
        Ok(ProgramPayload::NewMarketsTaxCredit(
            NewMarketsFindings::determine(&demographics, details, self.default_project_cost),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demographics(poverty_rate: f64, median_income_ratio: f64) -> TractDemographics {
        TractDemographics {
            poverty_rate,
            median_income_ratio,
            unemployment_ratio: 1.0,
            historic_district: false,
            opportunity_zone: false,
        }
    }

    #[test]
    fn credit_value_uses_equity_share_of_cost() {
        let findings = NewMarketsFindings::determine(
            &demographics(0.24, 0.9),
            &ProjectDetails::with_project_cost(4_000_000.0),
            1_000_000.0,
        );

        assert!(findings.low_income_community);
        assert!((findings.qualified_equity_investment - 1_000_000.0).abs() < 1e-6);
        assert!((findings.credit_value - 390_000.0).abs() < 1e-6);
        assert!(ProgramPayload::NewMarketsTaxCredit(findings).is_available());
    }

    #[test]
    fn supplied_equity_fraction_overrides_default() {
        let details = ProjectDetails {
            project_cost: Some(1_000_000.0),
            equity_fraction: Some(0.5),
            ..ProjectDetails::default()
        };
        let findings = NewMarketsFindings::determine(&demographics(0.1, 0.7), &details, 1.0);
        assert!((findings.credit_value - 195_000.0).abs() < 1e-6);
    }

    #[test]
    fn affluent_tracts_are_not_low_income_communities() {
        let findings = NewMarketsFindings::determine(
            &demographics(0.08, 1.2),
            &ProjectDetails::default(),
            1.0,
        );

        assert!(!findings.low_income_community);
        assert!(findings.benefits.is_none());
        assert_eq!(findings.reasons.len(), 2);
    }

    #[test]
    fn severe_distress_is_flagged() {
        let findings = NewMarketsFindings::determine(
            &demographics(0.35, 0.5),
            &ProjectDetails::default(),
            1_000_000.0,
        );
        assert!(findings.severely_distressed);
        let highlights = findings.benefits.map(|b| b.highlights).unwrap_or_default();
        assert!(highlights.iter().any(|h| h.contains("Severely distressed")));
    }
}
