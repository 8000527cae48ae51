//! Analysis orchestrator.
//!
//! Every evaluator runs concurrently inside the caller's task and is awaited
//! independently, so one program failing (or stalling until the collaborator
//! times out) never affects its siblings. Dropping the returned future cancels
//! every evaluator at its next suspension point.

mod recommendations;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::address::{self, CensusTract, Coordinates};
use super::error::IncentiveError;
use super::geo::SiteResolver;
use super::programs::{
    standard_evaluators, ProgramEvaluator, ProgramKey, ProgramResult, ProjectDetails,
};

pub use recommendations::{
    recommend, stacking_opportunities, Compatibility, Priority, Recommendation, RiskLevel,
    StackingPair,
};

/// Consolidated outcome of one `analyze_property` call.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub address: String,
    pub normalized_address: String,
    pub coordinates: Option<Coordinates>,
    pub census_tract: Option<CensusTract>,
    pub state: Option<String>,
    pub project_details: ProjectDetails,
    /// Always holds all five program keys.
    pub results: BTreeMap<ProgramKey, ProgramResult>,
    pub available_programs: usize,
    pub recommendations: Vec<Recommendation>,
    pub stacking_opportunities: Vec<StackingPair>,
    pub risk_level: RiskLevel,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl Analysis {
    pub fn result(&self, program: ProgramKey) -> Option<&ProgramResult> {
        self.results.get(&program)
    }

    pub fn is_available(&self, program: ProgramKey) -> bool {
        self.result(program).is_some_and(ProgramResult::available)
    }

    /// Available programs in fixed program order.
    pub fn available_keys(&self) -> Vec<ProgramKey> {
        ProgramKey::ALL
            .into_iter()
            .filter(|program| self.is_available(*program))
            .collect()
    }

    pub fn failed_keys(&self) -> Vec<ProgramKey> {
        self.results
            .values()
            .filter(|result| result.error().is_some())
            .map(ProgramResult::program)
            .collect()
    }
}

pub struct IncentiveAnalyzer {
    resolver: SiteResolver,
    evaluators: Vec<Arc<dyn ProgramEvaluator>>,
}

impl IncentiveAnalyzer {
    pub fn new(resolver: SiteResolver, evaluators: Vec<Arc<dyn ProgramEvaluator>>) -> Self {
        Self {
            resolver,
            evaluators,
        }
    }

    /// Analyzer wired with the five production evaluators.
    pub fn standard(resolver: SiteResolver, default_project_cost: f64) -> Self {
        let evaluators = standard_evaluators(resolver.clone(), default_project_cost);
        Self::new(resolver, evaluators)
    }

    pub fn resolver(&self) -> &SiteResolver {
        &self.resolver
    }

    pub async fn analyze_property(
        &self,
        address: &str,
        details: ProjectDetails,
    ) -> Result<Analysis, IncentiveError> {
        if address.trim().is_empty() {
            return Err(IncentiveError::validation("address must not be empty"));
        }

        let started = Instant::now();
        info!(address, evaluators = self.evaluators.len(), "incentive analysis started");

        // one resolution up front so every evaluator reads coordinates from cache
        let site = match self.resolver.resolve(address).await {
            Ok(site) => Some(site),
            Err(err) => {
                warn!(address, error = %err, "site resolution failed before dispatch");
                None
            }
        };

        let outcomes = join_all(
            self.evaluators
                .iter()
                .map(|evaluator| evaluator.evaluate(address, &details)),
        )
        .await;

        let mut results = BTreeMap::new();
        for result in outcomes {
            if let Some(message) = result.error_message() {
                warn!(
                    program = result.program().as_str(),
                    error = message,
                    "program evaluation failed"
                );
            }
            results.entry(result.program()).or_insert(result);
        }
        for program in ProgramKey::ALL {
            results.entry(program).or_insert_with(|| {
                ProgramResult::failure(
                    IncentiveError::NotFound(format!("no evaluator registered for {program}"))
                        .into_failure(program),
                )
            });
        }

        let available: Vec<ProgramKey> = ProgramKey::ALL
            .into_iter()
            .filter(|program| results.get(program).is_some_and(ProgramResult::available))
            .collect();
        let recommendations = recommend(
            available
                .iter()
                .map(|program| (*program, results.get(program).and_then(ProgramResult::data))),
        );
        let stacking_opportunities = stacking_opportunities(&available);
        let risk_level = RiskLevel::from_available(available.len());

        let (normalized_address, coordinates, census_tract, state) = match site {
            Some(site) => (
                site.normalized_address,
                Some(site.coordinates),
                Some(site.census_tract),
                Some(site.state),
            ),
            None => (address::normalize(address), None, None, None),
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            address = %normalized_address,
            available = available.len(),
            elapsed_ms,
            "incentive analysis complete"
        );

        Ok(Analysis {
            address: address.to_string(),
            normalized_address,
            coordinates,
            census_tract,
            state,
            project_details: details,
            results,
            available_programs: available.len(),
            recommendations,
            stacking_opportunities,
            risk_level,
            generated_at: Utc::now(),
            elapsed_ms,
        })
    }
}
