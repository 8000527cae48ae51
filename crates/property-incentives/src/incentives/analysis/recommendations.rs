use std::collections::BTreeSet;

use serde::Serialize;

use crate::incentives::programs::{BenefitSummary, ProgramKey, ProgramPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Fixed per program; never derived from benefit size.
    pub const fn for_program(program: ProgramKey) -> Self {
        match program {
            ProgramKey::OpportunityZone | ProgramKey::HistoricTaxCredit => Self::High,
            ProgramKey::NewMarketsTaxCredit | ProgramKey::Sba504 => Self::Medium,
            ProgramKey::CPace => Self::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// `None` for the alternative-financing fallback.
    pub program: Option<ProgramKey>,
    pub priority: Priority,
    pub action: String,
    pub timeline: String,
    pub benefit_summary: String,
    pub requirements: Vec<String>,
}

struct Guidance {
    action: &'static str,
    timeline: &'static str,
    benefit: &'static str,
}

const fn guidance(program: ProgramKey) -> Guidance {
    match program {
        ProgramKey::OpportunityZone => Guidance {
            action: "Structure the equity through a Qualified Opportunity Fund",
            timeline: "Invest eligible gains within 180 days of realization",
            benefit: "Capital gains deferral and tax-free appreciation after 10 years",
        },
        ProgramKey::HistoricTaxCredit => Guidance {
            action: "Engage a preservation consultant and file the NPS Part 1 application",
            timeline: "Certification typically takes 3-6 months before construction",
            benefit: "20% federal credit plus any state credit on qualified rehabilitation",
        },
        ProgramKey::NewMarketsTaxCredit => Guidance {
            action: "Contact Community Development Entities with current NMTC allocation",
            timeline: "Allocation rounds close annually; plan 6-12 months for closing",
            benefit: "39% credit on the qualified equity investment over 7 years",
        },
        ProgramKey::CPace => Guidance {
            action: "Commission an energy audit and apply to the local C-PACE administrator",
            timeline: "60-90 days from audit to assessment",
            benefit: "Long-term fixed-rate financing for efficiency improvements",
        },
        ProgramKey::Sba504 => Guidance {
            action: "Engage a Certified Development Company and a participating lender",
            timeline: "60-90 days to approval",
            benefit: "10% down payment with a below-market fixed rate",
        },
    }
}

impl Recommendation {
    pub fn for_program(program: ProgramKey, benefits: Option<&BenefitSummary>) -> Self {
        let guidance = guidance(program);
        Self {
            program: Some(program),
            priority: Priority::for_program(program),
            action: guidance.action.to_string(),
            timeline: benefits
                .map(|summary| summary.timeline.clone())
                .unwrap_or_else(|| guidance.timeline.to_string()),
            benefit_summary: benefits
                .map(|summary| summary.credit_rate.clone())
                .unwrap_or_else(|| guidance.benefit.to_string()),
            requirements: benefits
                .map(|summary| summary.requirements.clone())
                .unwrap_or_default(),
        }
    }

    pub fn alternative_financing() -> Self {
        Self {
            program: None,
            priority: Priority::Medium,
            action: "Explore alternative financing: conventional commercial lending, state \
                     economic development grants, or local tax abatements"
                .to_string(),
            timeline: "Begin lender and agency conversations within 30 days".to_string(),
            benefit_summary: "No incentive program matched this property".to_string(),
            requirements: vec![
                "Updated project budget and pro forma".to_string(),
                "Contact the local economic development office".to_string(),
            ],
        }
    }
}

/// Recommendations for the available programs, highest priority first.
///
/// Input order is preserved among equal priorities.
pub fn recommend<'a, I>(available: I) -> Vec<Recommendation>
where
    I: IntoIterator<Item = (ProgramKey, Option<&'a ProgramPayload>)>,
{
    let mut recommendations: Vec<Recommendation> = available
        .into_iter()
        .map(|(program, payload)| {
            Recommendation::for_program(program, payload.and_then(ProgramPayload::benefits))
        })
        .collect();

    if recommendations.is_empty() {
        recommendations.push(Recommendation::alternative_financing());
    }

    recommendations.sort_by(|left, right| right.priority.weight().cmp(&left.priority.weight()));
    recommendations
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compatibility {
    High,
    Medium,
    Low,
}

impl Compatibility {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackingPair {
    pub programs: BTreeSet<ProgramKey>,
    pub compatibility: Compatibility,
    pub combined_benefit: String,
    pub considerations: Vec<String>,
}

struct PairRule {
    programs: [ProgramKey; 2],
    compatibility: Compatibility,
    combined_benefit: &'static str,
    considerations: &'static [&'static str],
}

const PAIR_RULES: &[PairRule] = &[
    PairRule {
        programs: [ProgramKey::HistoricTaxCredit, ProgramKey::OpportunityZone],
        compatibility: Compatibility::High,
        combined_benefit: "Rehabilitation credits on the build-out plus tax-free appreciation \
                           on the Opportunity Zone investment",
        considerations: &[
            "Rehabilitation spend counts toward the substantial improvement test",
            "Credits reduce depreciable basis",
        ],
    },
    PairRule {
        programs: [ProgramKey::NewMarketsTaxCredit, ProgramKey::HistoricTaxCredit],
        compatibility: Compatibility::Medium,
        combined_benefit: "Twin credit structure layering NMTC equity with historic credits",
        considerations: &[
            "Requires a CDE comfortable with twinned structures",
            "Higher legal and accounting costs",
        ],
    },
    PairRule {
        programs: [ProgramKey::NewMarketsTaxCredit, ProgramKey::OpportunityZone],
        compatibility: Compatibility::Medium,
        combined_benefit: "NMTC subsidy on the financing with Opportunity Zone gains treatment",
        considerations: &[
            "Fund and CDE investment timelines must be coordinated",
            "Seven-year NMTC compliance overlaps the Opportunity Zone hold",
        ],
    },
];

struct GroupRule {
    anchor: ProgramKey,
    combined_benefit: &'static str,
    considerations: &'static [&'static str],
}

// anchors that combine with any other available program
const GROUP_RULES: &[GroupRule] = &[
    GroupRule {
        anchor: ProgramKey::Sba504,
        combined_benefit: "SBA 504 debt financing beneath the equity and credit programs",
        considerations: &[
            "CDC and senior lender must approve the full capital stack",
            "Owner occupancy applies to the whole project",
        ],
    },
    GroupRule {
        anchor: ProgramKey::CPace,
        combined_benefit: "C-PACE funds efficiency improvements alongside the other programs",
        considerations: &[
            "Senior lender consent required for the assessment lien",
            "Improvements financed by C-PACE are excluded from credit basis",
        ],
    },
];

/// Known-good combinations among the available programs.
pub fn stacking_opportunities(available: &[ProgramKey]) -> Vec<StackingPair> {
    let available: BTreeSet<ProgramKey> = available.iter().copied().collect();
    let mut pairs = Vec::new();

    for rule in PAIR_RULES {
        if rule.programs.iter().all(|program| available.contains(program)) {
            pairs.push(StackingPair {
                programs: rule.programs.into_iter().collect(),
                compatibility: rule.compatibility,
                combined_benefit: rule.combined_benefit.to_string(),
                considerations: owned(rule.considerations),
            });
        }
    }

    for rule in GROUP_RULES {
        if available.contains(&rule.anchor) && available.len() >= 2 {
            pairs.push(StackingPair {
                programs: available.clone(),
                compatibility: Compatibility::High,
                combined_benefit: rule.combined_benefit.to_string(),
                considerations: owned(rule.considerations),
            });
        }
    }

    pairs
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const fn from_available(count: usize) -> Self {
        match count {
            0 => Self::High,
            1 | 2 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn programs_of(recommendations: &[Recommendation]) -> Vec<Option<ProgramKey>> {
        recommendations.iter().map(|rec| rec.program).collect()
    }

    #[test]
    fn orders_by_priority_weight() {
        let recommendations = recommend([
            (ProgramKey::CPace, None),
            (ProgramKey::Sba504, None),
            (ProgramKey::OpportunityZone, None),
        ]);

        assert_eq!(
            programs_of(&recommendations),
            vec![
                Some(ProgramKey::OpportunityZone),
                Some(ProgramKey::Sba504),
                Some(ProgramKey::CPace)
            ]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let recommendations = recommend([
            (ProgramKey::Sba504, None),
            (ProgramKey::HistoricTaxCredit, None),
            (ProgramKey::NewMarketsTaxCredit, None),
            (ProgramKey::OpportunityZone, None),
        ]);

        assert_eq!(
            programs_of(&recommendations),
            vec![
                Some(ProgramKey::HistoricTaxCredit),
                Some(ProgramKey::OpportunityZone),
                Some(ProgramKey::Sba504),
                Some(ProgramKey::NewMarketsTaxCredit)
            ]
        );
    }

    #[test]
    fn falls_back_when_nothing_is_available() {
        let recommendations = recommend(Vec::<(ProgramKey, Option<&ProgramPayload>)>::new());
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].program, None);
        assert!(recommendations[0].action.starts_with("Explore alternative financing"));
    }

    #[test]
    fn historic_and_opportunity_zone_stack_highly() {
        let pairs =
            stacking_opportunities(&[ProgramKey::HistoricTaxCredit, ProgramKey::OpportunityZone]);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].compatibility, Compatibility::High);
        assert!(pairs[0].programs.contains(&ProgramKey::OpportunityZone));
    }

    #[test]
    fn credit_programs_pair_off_by_compatibility() {
        let pairs = stacking_opportunities(&[
            ProgramKey::NewMarketsTaxCredit,
            ProgramKey::HistoricTaxCredit,
            ProgramKey::OpportunityZone,
        ]);
        let set = |programs: [ProgramKey; 2]| programs.into_iter().collect::<BTreeSet<_>>();

        assert_eq!(pairs.len(), 3);
        let high: Vec<_> = pairs
            .iter()
            .filter(|pair| pair.compatibility == Compatibility::High)
            .map(|pair| pair.programs.clone())
            .collect();
        assert_eq!(high, vec![set([ProgramKey::HistoricTaxCredit, ProgramKey::OpportunityZone])]);

        let medium: Vec<_> = pairs
            .iter()
            .filter(|pair| pair.compatibility == Compatibility::Medium)
            .map(|pair| pair.programs.clone())
            .collect();
        assert_eq!(medium.len(), 2);
        assert!(medium.contains(&set([
            ProgramKey::NewMarketsTaxCredit,
            ProgramKey::HistoricTaxCredit
        ])));
        assert!(medium.contains(&set([
            ProgramKey::NewMarketsTaxCredit,
            ProgramKey::OpportunityZone
        ])));
    }

    #[test]
    fn lone_cpace_has_nothing_to_stack_with() {
        assert!(stacking_opportunities(&[ProgramKey::CPace]).is_empty());
        assert!(stacking_opportunities(&[]).is_empty());
    }

    #[test]
    fn group_anchors_cover_every_available_program() {
        let pairs = stacking_opportunities(&[
            ProgramKey::CPace,
            ProgramKey::Sba504,
            ProgramKey::NewMarketsTaxCredit,
        ]);

        assert_eq!(pairs.len(), 2);
        assert!(pairs
            .iter()
            .all(|pair| pair.programs.len() == 3 && pair.compatibility == Compatibility::High));
    }

    #[test]
    fn risk_steps_with_available_count() {
        assert_eq!(RiskLevel::from_available(0), RiskLevel::High);
        assert_eq!(RiskLevel::from_available(1), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_available(2), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_available(3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_available(5), RiskLevel::Low);
    }
}
