use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{BenefitSummary, ProgramEvaluator, ProgramKey, ProgramPayload, ProjectDetails};
use crate::incentives::error::IncentiveError;
use crate::incentives::geo::{Site, SiteResolver, TractDemographics};

/// Federal rehabilitation credit, percent of qualified expenditures.
pub const FEDERAL_HISTORIC_RATE: u8 = 20;

const MINIMUM_BUILDING_AGE: i32 = 50;

// state code -> state historic credit percent; absent states offer none
const STATE_HISTORIC_RATES: &[(&str, u8)] = &[
    ("CA", 20),
    ("CO", 20),
    ("CT", 25),
    ("GA", 25),
    ("IA", 25),
    ("IL", 25),
    ("MA", 20),
    ("MD", 20),
    ("MI", 25),
    ("MN", 20),
    ("MO", 25),
    ("NY", 20),
    ("OH", 25),
    ("TX", 25),
    ("VA", 25),
    ("WI", 20),
];

pub fn state_historic_rate(state_code: Option<&str>) -> u8 {
    state_code
        .and_then(|code| {
            STATE_HISTORIC_RATES
                .iter()
                .find(|(candidate, _)| *candidate == code)
        })
        .map(|(_, rate)| *rate)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricFindings {
    pub state: String,
    pub in_historic_district: bool,
    pub building_age: Option<i32>,
    pub federal_rate: u8,
    pub state_rate: u8,
    pub combined_rate: u8,
    pub eligible: bool,
    pub benefits: Option<BenefitSummary>,
    pub reasons: Vec<String>,
}

impl HistoricFindings {
    pub fn determine(
        site: &Site,
        demographics: &TractDemographics,
        details: &ProjectDetails,
        current_year: i32,
    ) -> Self {
        let state_rate = state_historic_rate(site.state_code.as_deref());
        let combined_rate = FEDERAL_HISTORIC_RATE + state_rate;
        let building_age = details.year_built.map(|year| current_year - year);
        let old_enough = building_age.is_some_and(|age| age >= MINIMUM_BUILDING_AGE);
        let eligible = demographics.historic_district || old_enough;

        let mut reasons = Vec::new();
        if !eligible {
            reasons.push("Property is not within a registered historic district".to_string());
            match (details.year_built, building_age) {
                (Some(year), Some(age)) => reasons.push(format!(
                    "Building completed in {year} is {age} years old; individual listing \
                     requires at least {MINIMUM_BUILDING_AGE}"
                )),
                _ => reasons.push(
                    "Year built not provided; buildings must generally be 50+ years old to be \
                     individually listed"
                        .to_string(),
                ),
            }
        }

        let benefits = eligible.then(|| {
            let mut highlights = vec![format!(
                "Federal credit: {FEDERAL_HISTORIC_RATE}% of qualified rehabilitation expenditures"
            )];
            if state_rate > 0 {
                highlights.push(format!("{} state credit: {state_rate}%", site.state));
            }
            if demographics.historic_district {
                highlights.push("Located within a registered historic district".to_string());
            }

            BenefitSummary {
                credit_rate: format!("Up to {combined_rate}% of qualified expenditures"),
                timeline: "Three-part certification before and during construction; federal \
                           credit claimed ratably over 5 years after placed in service"
                    .to_string(),
                requirements: vec![
                    "Certified historic structure (NPS Part 1 approval)".to_string(),
                    "Rehabilitation plan approved under the Secretary of the Interior's Standards"
                        .to_string(),
                    "Substantial rehabilitation: expenditures exceed the adjusted basis"
                        .to_string(),
                    "Income-producing use for at least 5 years to avoid recapture".to_string(),
                ],
                highlights,
            }
        });

        Self {
            state: site.state.clone(),
            in_historic_district: demographics.historic_district,
            building_age,
            federal_rate: FEDERAL_HISTORIC_RATE,
            state_rate,
            combined_rate,
            eligible,
            benefits,
            reasons,
        }
    }
}

pub struct HistoricTaxCreditEvaluator {
    resolver: SiteResolver,
}

impl HistoricTaxCreditEvaluator {
    pub fn new(resolver: SiteResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ProgramEvaluator for HistoricTaxCreditEvaluator {
    fn program(&self) -> ProgramKey {
        ProgramKey::HistoricTaxCredit
    }

    async fn assess(
        &self,
        address: &str,
        details: &ProjectDetails,
    ) -> Result<ProgramPayload, IncentiveError> {
        let site = self.resolver.resolve(address).await?;
        let demographics = self.resolver.demographics(&site.census_tract).await?;
        Ok(ProgramPayload::HistoricTaxCredit(HistoricFindings::determine(
            &site,
            &demographics,
            details,
            Utc::now().year(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incentives::address::{CensusTract, Coordinates};

    fn site(state: &str, code: Option<&str>) -> Site {
        Site {
            normalized_address: "10 Main St".to_string(),
            coordinates: Coordinates::new(38.6, -90.2).expect("valid"),
            census_tract: CensusTract::new("29", "510", "121400"),
            state: state.to_string(),
            state_code: code.map(str::to_string),
        }
    }

    fn demographics(historic_district: bool) -> TractDemographics {
        TractDemographics {
            poverty_rate: 0.1,
            median_income_ratio: 1.0,
            unemployment_ratio: 1.0,
            historic_district,
            opportunity_zone: false,
        }
    }

    #[test]
    fn combines_federal_and_state_rates() {
        let findings = HistoricFindings::determine(
            &site("Missouri", Some("MO")),
            &demographics(true),
            &ProjectDetails::default(),
            2025,
        );
        assert!(findings.eligible);
        assert_eq!(findings.combined_rate, 45);
        assert_eq!(
            findings.benefits.map(|b| b.credit_rate).as_deref(),
            Some("Up to 45% of qualified expenditures")
        );

        let federal_only = HistoricFindings::determine(
            &site("District of Columbia", Some("DC")),
            &demographics(true),
            &ProjectDetails::default(),
            2025,
        );
        assert_eq!(federal_only.state_rate, 0);
        assert_eq!(federal_only.combined_rate, 20);
    }

    #[test]
    fn old_buildings_qualify_outside_districts() {
        let details = ProjectDetails {
            year_built: Some(1962),
            ..ProjectDetails::default()
        };
        let findings = HistoricFindings::determine(
            &site("Virginia", Some("VA")),
            &demographics(false),
            &details,
            2025,
        );
        assert!(findings.eligible);
        assert_eq!(findings.building_age, Some(63));
    }

    #[test]
    fn young_buildings_outside_districts_are_ineligible() {
        let details = ProjectDetails {
            year_built: Some(1999),
            ..ProjectDetails::default()
        };
        let findings = HistoricFindings::determine(
            &site("Texas", Some("TX")),
            &demographics(false),
            &details,
            2025,
        );
        assert!(!findings.eligible);
        assert!(findings.benefits.is_none());
        assert!(findings.reasons.iter().any(|reason| reason.contains("26 years old")));
    }

    #[test]
    fn unknown_states_get_no_state_credit() {
        assert_eq!(state_historic_rate(None), 0);
        assert_eq!(state_historic_rate(Some("FL")), 0);
        assert_eq!(state_historic_rate(Some("OH")), 25);
    }
}
