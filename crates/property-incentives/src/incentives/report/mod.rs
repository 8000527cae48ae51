mod financials;
pub mod views;

use chrono::Utc;

use super::analysis::{Analysis, RiskLevel};
use super::programs::{ProgramKey, ProjectDetails};

pub use financials::{estimated_value, recommendation_strength, value_bucket, ValueBucket};
pub use views::{
    BaseCase, ExecutiveSummary, FinancialProjections, FinancialReport, ImplementationPhase,
    IncentiveDetail, IncentiveScenario, LocationAnalysis, NextStep, RecommendationStrength,
    RiskAssessment,
};

/// Compile a report from a finished analysis.
///
/// Project cost comes from `details`, then the analysis' own details, then
/// `default_project_cost`.
pub fn generate_financial_report(
    analysis: &Analysis,
    details: Option<&ProjectDetails>,
    default_project_cost: f64,
) -> FinancialReport {
    let project_cost = details
        .and_then(|details| details.project_cost)
        .filter(|cost| cost.is_finite() && *cost > 0.0)
        .unwrap_or_else(|| analysis.project_details.project_cost_or(default_project_cost));

    let available = analysis.available_keys();
    let projections = financials::project(project_cost, &available);
    let incentives = incentive_details(analysis, project_cost);

    FinancialReport {
        generated_at: Utc::now(),
        analysis_generated_at: analysis.generated_at,
        executive_summary: executive_summary(analysis, &projections),
        location: LocationAnalysis {
            address: analysis.address.clone(),
            normalized_address: analysis.normalized_address.clone(),
            coordinates: analysis.coordinates,
            census_tract: analysis.census_tract.clone(),
            state: analysis.state.clone(),
        },
        incentives,
        projections,
        implementation_plan: implementation_plan(&available),
        risk_assessment: risk_assessment(analysis),
        next_steps: next_steps(analysis),
    }
}

fn executive_summary(analysis: &Analysis, projections: &FinancialProjections) -> ExecutiveSummary {
    let failed = analysis.failed_keys();
    let mut key_findings = vec![format!(
        "{} of {} incentive programs available",
        analysis.available_programs,
        ProgramKey::ALL.len()
    )];

    for program in analysis.available_keys() {
        let rate = analysis
            .result(program)
            .and_then(|result| result.data())
            .and_then(|payload| payload.benefits())
            .map(|benefits| benefits.credit_rate.clone());
        match rate {
            Some(rate) => key_findings.push(format!("{}: {rate}", program.label())),
            None => key_findings.push(format!("{} is available", program.label())),
        }
    }

    if !analysis.stacking_opportunities.is_empty() {
        key_findings.push(format!(
            "{} stacking opportunit{} identified",
            analysis.stacking_opportunities.len(),
            if analysis.stacking_opportunities.len() == 1 { "y" } else { "ies" }
        ));
    }
    if !failed.is_empty() {
        key_findings.push(format!(
            "{} program(s) could not be evaluated and should be verified manually",
            failed.len()
        ));
    }

    ExecutiveSummary {
        programs_evaluated: analysis.results.len(),
        available_programs: analysis.available_programs,
        failed_programs: failed.len(),
        estimated_total_value: projections.total_savings,
        key_findings,
        recommendation_strength: projections.recommendation_strength,
        recommendation_label: projections.recommendation_strength.label(),
    }
}

fn incentive_details(analysis: &Analysis, project_cost: f64) -> Vec<IncentiveDetail> {
    analysis
        .results
        .values()
        .map(|result| {
            let program = result.program();
            let benefits = result.data().and_then(|payload| payload.benefits());
            let notes = match (result.data(), result.error_message()) {
                (Some(payload), _) => payload.notes().to_vec(),
                (None, Some(message)) => vec![message.to_string()],
                (None, None) => Vec::new(),
            };

            IncentiveDetail {
                program,
                program_label: program.label(),
                status_label: result.status().label(),
                available: result.available(),
                estimated_value: if result.available() {
                    estimated_value(program, project_cost)
                } else {
                    0.0
                },
                credit_rate: benefits.map(|summary| summary.credit_rate.clone()),
                timeline: benefits.map(|summary| summary.timeline.clone()),
                requirements: benefits
                    .map(|summary| summary.requirements.clone())
                    .unwrap_or_default(),
                notes,
            }
        })
        .collect()
}

fn implementation_plan(available: &[ProgramKey]) -> Vec<ImplementationPhase> {
    let mut applications = vec![
        "Confirm eligibility with program administrators".to_string(),
        "Assemble site, ownership, and project budget documentation".to_string(),
    ];
    applications.extend(
        available
            .iter()
            .map(|program| format!("Prepare {} application", program.label())),
    );

    vec![
        ImplementationPhase {
            phase: 1,
            name: "Pre-Development & Applications",
            duration: "Months 1-3",
            activities: applications,
        },
        ImplementationPhase {
            phase: 2,
            name: "Financing & Approvals",
            duration: "Months 4-6",
            activities: vec![
                "Close on the capital stack and incentive commitments".to_string(),
                "Secure lender consents and program approvals".to_string(),
                "Finalize construction contracts".to_string(),
            ],
        },
        ImplementationPhase {
            phase: 3,
            name: "Construction & Compliance",
            duration: "Months 7-18",
            activities: vec![
                "Execute the approved scope of work".to_string(),
                "Document expenditures for credit certification".to_string(),
                "Set up ongoing compliance reporting".to_string(),
            ],
        },
    ]
}

fn risk_assessment(analysis: &Analysis) -> RiskAssessment {
    let mut factors = Vec::new();
    for result in analysis.results.values() {
        if let Some(message) = result.error_message() {
            factors.push(format!("{} could not be verified: {message}", result.program()));
        }
    }
    if let Some(payload) = analysis
        .result(ProgramKey::Sba504)
        .filter(|result| result.available())
        .and_then(|result| result.data())
    {
        factors.extend(payload.notes().iter().map(|issue| format!("SBA 504: {issue}")));
    }
    if analysis.available_programs == 0 {
        factors.push("No incentive programs offset project costs".to_string());
    }

    let mitigations = match analysis.risk_level {
        RiskLevel::High => vec![
            "Revisit project scope or location to qualify for additional programs".to_string(),
            "Build contingency into conventional financing assumptions".to_string(),
        ],
        RiskLevel::Medium => vec![
            "Engage program counsel early to confirm eligibility".to_string(),
            "Sequence applications so one approval does not block another".to_string(),
        ],
        RiskLevel::Low => vec![
            "Coordinate compliance across stacked programs".to_string(),
            "Track recapture periods for each credit".to_string(),
        ],
    };

    RiskAssessment {
        level: analysis.risk_level,
        level_label: analysis.risk_level.label(),
        factors,
        mitigations,
    }
}

fn next_steps(analysis: &Analysis) -> Vec<NextStep> {
    analysis
        .recommendations
        .iter()
        .enumerate()
        .map(|(index, recommendation)| NextStep {
            step: index + 1,
            program: recommendation.program,
            priority: recommendation.priority,
            priority_label: recommendation.priority.label(),
            action: recommendation.action.clone(),
            timeline: recommendation.timeline.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::incentives::address::{CensusTract, Coordinates};
    use crate::incentives::analysis::{recommend, stacking_opportunities};
    use crate::incentives::geo::{Site, TractDemographics};
    use crate::incentives::programs::{
        HistoricFindings, ProgramPayload, ProgramResult, Sba504Findings,
    };
    use crate::incentives::IncentiveError;

    fn historic_payload() -> ProgramPayload {
        let site = Site {
            normalized_address: "500 Main St, Richmond, VA".to_string(),
            coordinates: Coordinates::new(37.54, -77.43).expect("valid"),
            census_tract: CensusTract::new("51", "760", "040200"),
            state: "Virginia".to_string(),
            state_code: Some("VA".to_string()),
        };
        let demographics = TractDemographics {
            poverty_rate: 0.12,
            median_income_ratio: 1.05,
            unemployment_ratio: 0.9,
            historic_district: true,
            opportunity_zone: false,
        };
        ProgramPayload::HistoricTaxCredit(HistoricFindings::determine(
            &site,
            &demographics,
            &ProjectDetails::default(),
            2025,
        ))
    }

    fn analysis_with(payloads: Vec<ProgramPayload>) -> Analysis {
        let mut results = BTreeMap::new();
        for payload in payloads {
            results.insert(payload.program(), ProgramResult::success(payload));
        }
        for program in ProgramKey::ALL {
            results.entry(program).or_insert_with(|| {
                ProgramResult::failure(
                    IncentiveError::Network {
                        service: "tract lookup".to_string(),
                        message: "timed out".to_string(),
                    }
                    .into_failure(program),
                )
            });
        }

        let available: Vec<ProgramKey> = ProgramKey::ALL
            .into_iter()
            .filter(|program| results[program].available())
            .collect();
        let recommendations = recommend(
            available
                .iter()
                .map(|program| (*program, results[program].data())),
        );

        Analysis {
            address: "500 Main Street, Richmond, VA".to_string(),
            normalized_address: "500 Main St, Richmond, VA".to_string(),
            coordinates: None,
            census_tract: None,
            state: Some("Virginia".to_string()),
            project_details: ProjectDetails::default(),
            available_programs: available.len(),
            recommendations,
            stacking_opportunities: stacking_opportunities(&available),
            risk_level: RiskLevel::from_available(available.len()),
            results,
            generated_at: Utc::now(),
            elapsed_ms: 3,
        }
    }

    #[test]
    fn historic_credit_alone_drives_tax_credits() {
        let analysis = analysis_with(vec![
            historic_payload(),
            ProgramPayload::Sba504(Sba504Findings::determine(&ProjectDetails::default(), 1.0)),
        ]);
        let details = ProjectDetails::with_project_cost(2_000_000.0);

        let report = generate_financial_report(&analysis, Some(&details), 1_000_000.0);

        assert_eq!(report.executive_summary.available_programs, 2);
        assert!((report.projections.with_incentives.tax_credits - 400_000.0).abs() < 1e-6);
        assert!(report.projections.with_incentives.interest_savings > 0.0);
        assert_eq!(
            report.executive_summary.recommendation_strength,
            RecommendationStrength::StronglyRecommended
        );
        assert_eq!(report.executive_summary.failed_programs, 3);
    }

    #[test]
    fn next_steps_follow_recommendations_one_to_one() {
        let analysis = analysis_with(vec![historic_payload()]);
        let report = generate_financial_report(&analysis, None, 1_000_000.0);

        assert_eq!(report.next_steps.len(), analysis.recommendations.len());
        for (step, recommendation) in report.next_steps.iter().zip(&analysis.recommendations) {
            assert_eq!(step.program, recommendation.program);
            assert_eq!(step.action, recommendation.action);
        }
        assert_eq!(report.next_steps[0].step, 1);
    }

    #[test]
    fn falls_back_to_default_project_cost() {
        let analysis = analysis_with(vec![historic_payload()]);
        let report = generate_financial_report(&analysis, None, 500_000.0);

        assert!((report.projections.base_case.project_cost - 500_000.0).abs() < 1e-9);
        assert!((report.projections.with_incentives.tax_credits - 100_000.0).abs() < 1e-6);
        assert_eq!(
            report.projections.recommendation_strength,
            RecommendationStrength::Recommended
        );
    }

    #[test]
    fn always_plans_three_phases_and_flags_failures() {
        let report = generate_financial_report(&analysis_with(Vec::new()), None, 1_000_000.0);

        assert_eq!(report.implementation_plan.len(), 3);
        assert_eq!(report.risk_assessment.level, RiskLevel::High);
        assert!(report
            .risk_assessment
            .factors
            .iter()
            .any(|factor| factor.contains("could not be verified")));
        assert_eq!(report.next_steps.len(), 1);
        assert_eq!(report.next_steps[0].program, None);
    }
}
