use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BenefitSummary, ProgramEvaluator, ProgramKey, ProgramPayload, ProjectDetails};
use crate::incentives::address::CensusTract;
use crate::incentives::error::IncentiveError;
use crate::incentives::geo::{SiteResolver, TractDemographics};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityZoneFindings {
    pub tract_geoid: String,
    pub designated: bool,
    pub low_income_community: bool,
    pub poverty_rate: f64,
    pub median_income_ratio: f64,
    pub benefits: Option<BenefitSummary>,
    pub reasons: Vec<String>,
}

impl OpportunityZoneFindings {
    pub fn determine(tract: &CensusTract, demographics: &TractDemographics) -> Self {
        let designated = demographics.opportunity_zone;
        let mut reasons = Vec::new();

        let benefits = if designated {
            Some(BenefitSummary {
                credit_rate: "Deferral of reinvested capital gains, plus permanent exclusion of \
                              appreciation after a 10-year hold"
                    .to_string(),
                timeline: "Invest gains within 180 days; substantially improve the property \
                           within 30 months"
                    .to_string(),
                requirements: vec![
                    "Invest through a Qualified Opportunity Fund".to_string(),
                    "Double the adjusted basis of the building through improvements".to_string(),
                    "Hold at least 90% of fund assets in qualified property".to_string(),
                    "Hold the investment 10+ years for the appreciation exclusion".to_string(),
                ],
                highlights: vec![format!("Census tract {} is a designated zone", tract.geoid)],
            })
        } else {
            reasons.push(format!(
                "Census tract {} is not a designated Qualified Opportunity Zone",
                tract.geoid
            ));
            if demographics.low_income_community() {
                reasons.push(
                    "Tract meets low-income thresholds but was not selected for designation"
                        .to_string(),
                );
            }
            None
        };

        Self {
            tract_geoid: tract.geoid.clone(),
            designated,
            low_income_community: demographics.low_income_community(),
            poverty_rate: demographics.poverty_rate,
            median_income_ratio: demographics.median_income_ratio,
            benefits,
            reasons,
        }
    }
}

pub struct OpportunityZoneEvaluator {
    resolver: SiteResolver,
}

impl OpportunityZoneEvaluator {
    pub fn new(resolver: SiteResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ProgramEvaluator for OpportunityZoneEvaluator {
    fn program(&self) -> ProgramKey {
        ProgramKey::OpportunityZone
    }

    async fn assess(
        &self,
        address: &str,
        _details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError> {
        let site = self.resolver.resolve(address).await?;
        let demographics = self.resolver.demographics(&site.census_tract).await?;
        Ok(ProgramPayload::OpportunityZone(
            OpportunityZoneFindings::determine(&site.census_tract, &demographics),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demographics(opportunity_zone: bool, poverty_rate: f64) -> TractDemographics {
        TractDemographics {
            poverty_rate,
            median_income_ratio: 0.9,
            unemployment_ratio: 1.0,
            historic_district: false,
            opportunity_zone,
        }
    }

    #[test]
    fn designated_tract_is_available_with_benefits() {
        let tract = CensusTract::new("11", "001", "007403");
        let findings = OpportunityZoneFindings::determine(&tract, &demographics(true, 0.31));

        assert!(findings.designated);
        assert!(findings.reasons.is_empty());
        assert!(ProgramPayload::OpportunityZone(findings.clone()).is_available());
        let benefits = findings.benefits.expect("benefits present");
        assert!(benefits
            .requirements
            .iter()
            .any(|requirement| requirement.contains("Opportunity Fund")));
    }

    #[test]
    fn undesignated_low_income_tract_explains_why() {
        let tract = CensusTract::new("29", "510", "121400");
        let findings = OpportunityZoneFindings::determine(&tract, &demographics(false, 0.25));

        assert!(!findings.designated);
        assert!(findings.low_income_community);
        assert!(findings.benefits.is_none());
        assert_eq!(findings.reasons.len(), 2);
        assert!(!ProgramPayload::OpportunityZone(findings).is_available());
    }
}
