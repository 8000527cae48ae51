use super::views::{BaseCase, FinancialProjections, IncentiveScenario, RecommendationStrength};
use crate::incentives::programs::{ProgramKey, FEDERAL_HISTORIC_RATE, NMTC_CREDIT_RATE};

// conventional financing: interest carried over the term, as a share of cost
const CONVENTIONAL_FINANCING_RATIO: f64 = 0.25;
const NMTC_EQUITY_FRACTION: f64 = 0.25;
// rate advantage on the CDC portion across the loan term
const SBA504_SAVINGS_RATIO: f64 = 0.05;
const CPACE_SAVINGS_RATIO: f64 = 0.03;
// present value of deferral and the appreciation exclusion
const OPPORTUNITY_ZONE_BENEFIT_RATIO: f64 = 0.10;

const STRONG_SAVINGS_THRESHOLD: f64 = 100_000.0;
const MODERATE_SAVINGS_THRESHOLD: f64 = 50_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueBucket {
    TaxCredit,
    InterestSavings,
    OtherBenefit,
}

pub fn value_bucket(program: ProgramKey) -> ValueBucket {
    match program {
        ProgramKey::HistoricTaxCredit | ProgramKey::NewMarketsTaxCredit => ValueBucket::TaxCredit,
        ProgramKey::Sba504 | ProgramKey::CPace => ValueBucket::InterestSavings,
        ProgramKey::OpportunityZone => ValueBucket::OtherBenefit,
    }
}

/// Planning estimate of what an available program is worth on a project.
pub fn estimated_value(program: ProgramKey, project_cost: f64) -> f64 {
    match program {
        ProgramKey::HistoricTaxCredit => project_cost * f64::from(FEDERAL_HISTORIC_RATE) / 100.0,
        ProgramKey::NewMarketsTaxCredit => project_cost * NMTC_EQUITY_FRACTION * NMTC_CREDIT_RATE,
        ProgramKey::Sba504 => project_cost * SBA504_SAVINGS_RATIO,
        ProgramKey::CPace => project_cost * CPACE_SAVINGS_RATIO,
        ProgramKey::OpportunityZone => project_cost * OPPORTUNITY_ZONE_BENEFIT_RATIO,
    }
}

pub fn recommendation_strength(total_savings: f64) -> RecommendationStrength {
    if total_savings > STRONG_SAVINGS_THRESHOLD {
        RecommendationStrength::StronglyRecommended
    } else if total_savings > MODERATE_SAVINGS_THRESHOLD {
        RecommendationStrength::Recommended
    } else {
        RecommendationStrength::ConsiderCarefully
    }
}

pub fn project(project_cost: f64, available: &[ProgramKey]) -> FinancialProjections {
    let financing_cost = project_cost * CONVENTIONAL_FINANCING_RATIO;
    let base_case = BaseCase {
        project_cost,
        financing_cost,
        total_cost: project_cost + financing_cost,
    };

    let (mut tax_credits, mut interest_savings, mut other_benefits) = (0.0, 0.0, 0.0);
    for program in available {
        let value = estimated_value(*program, project_cost);
        match value_bucket(*program) {
            ValueBucket::TaxCredit => tax_credits += value,
            ValueBucket::InterestSavings => interest_savings += value,
            ValueBucket::OtherBenefit => other_benefits += value,
        }
    }

    let net_project_cost = base_case.total_cost - tax_credits - interest_savings - other_benefits;
    let total_savings = base_case.total_cost - net_project_cost;
    let savings_pct = if base_case.total_cost > 0.0 {
        total_savings / base_case.total_cost * 100.0
    } else {
        0.0
    };

    FinancialProjections {
        base_case,
        with_incentives: IncentiveScenario {
            tax_credits,
            interest_savings,
            other_benefits,
            net_project_cost,
        },
        total_savings,
        savings_pct,
        recommendation_strength: recommendation_strength(total_savings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historic_and_sba_split_into_credits_and_interest() {
        let projections = project(
            2_000_000.0,
            &[ProgramKey::HistoricTaxCredit, ProgramKey::Sba504],
        );

        assert!((projections.with_incentives.tax_credits - 400_000.0).abs() < 1e-6);
        assert!((projections.with_incentives.interest_savings - 100_000.0).abs() < 1e-6);
        assert_eq!(projections.with_incentives.other_benefits, 0.0);
        assert_eq!(
            projections.recommendation_strength,
            RecommendationStrength::StronglyRecommended
        );
    }

    #[test]
    fn savings_equal_base_total_less_net_cost() {
        let projections = project(750_000.0, &ProgramKey::ALL);
        let expected =
            projections.base_case.total_cost - projections.with_incentives.net_project_cost;
        assert!((projections.total_savings - expected).abs() < 1e-9);
    }

    #[test]
    fn strength_thresholds_are_exclusive() {
        assert_eq!(
            recommendation_strength(100_000.0),
            RecommendationStrength::Recommended
        );
        assert_eq!(
            recommendation_strength(50_000.0),
            RecommendationStrength::ConsiderCarefully
        );
        assert_eq!(
            recommendation_strength(100_000.01),
            RecommendationStrength::StronglyRecommended
        );
    }

    #[test]
    fn nothing_available_means_no_savings() {
        let projections = project(1_000_000.0, &[]);
        assert_eq!(projections.total_savings, 0.0);
        assert_eq!(
            projections.with_incentives.net_project_cost,
            projections.base_case.total_cost
        );
        assert_eq!(
            projections.recommendation_strength,
            RecommendationStrength::ConsiderCarefully
        );
    }
}
