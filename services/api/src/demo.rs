use crate::infra::{cli_service, parse_use_of_funds};
use chrono::Local;
use clap::{Args, ValueEnum};
use property_incentives::error::AppError;
use property_incentives::incentives::export::ExportFormat;
use property_incentives::incentives::programs::{ProjectDetails, UseOfFunds};
use property_incentives::incentives::report::FinancialReport;
use property_incentives::incentives::{Analysis, IncentiveService};

const DEMO_ADDRESS: &str = "1600 Pennsylvania Avenue, Washington, DC 20500";
const DEMO_PROJECT_COST: f64 = 2_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ProjectArgs {
    /// Total project cost in USD
    #[arg(long)]
    pub(crate) project_cost: Option<f64>,
    /// Cost of energy or resiliency improvements in USD
    #[arg(long)]
    pub(crate) improvement_cost: Option<f64>,
    /// Annual business revenue in USD
    #[arg(long)]
    pub(crate) annual_revenue: Option<f64>,
    /// Average after-tax net income in USD
    #[arg(long)]
    pub(crate) net_income: Option<f64>,
    /// Number of employees
    #[arg(long)]
    pub(crate) employees: Option<u32>,
    /// Tangible net worth in USD
    #[arg(long)]
    pub(crate) net_worth: Option<f64>,
    /// Jobs created or retained by the project
    #[arg(long)]
    pub(crate) jobs_created: Option<u32>,
    /// Share of the property the business occupies, in percent
    #[arg(long)]
    pub(crate) owner_occupancy: Option<f64>,
    /// Year the building was completed
    #[arg(long)]
    pub(crate) year_built: Option<i32>,
    /// Years the business has operated
    #[arg(long)]
    pub(crate) years_in_business: Option<f64>,
    /// Intended use of the financing (e.g. real-estate, renovation, working-capital)
    #[arg(long, value_parser = parse_use_of_funds)]
    pub(crate) use_of_funds: Option<UseOfFunds>,
}

impl From<ProjectArgs> for ProjectDetails {
    fn from(args: ProjectArgs) -> Self {
        ProjectDetails {
            project_cost: args.project_cost,
            improvement_cost: args.improvement_cost,
            annual_revenue: args.annual_revenue,
            net_income: args.net_income,
            employees: args.employees,
            net_worth: args.net_worth,
            jobs_created: args.jobs_created,
            owner_occupancy_pct: args.owner_occupancy,
            years_in_business: args.years_in_business,
            year_built: args.year_built,
            use_of_funds: args.use_of_funds,
            equity_fraction: None,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Property street address, including the state code
    #[arg(long)]
    pub(crate) address: String,
    #[command(flatten)]
    pub(crate) project: ProjectArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Property street address, including the state code
    #[arg(long)]
    pub(crate) address: String,
    #[command(flatten)]
    pub(crate) project: ProjectArgs,
    /// Print the report as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let service = cli_service()?;
    let analysis = service
        .analyze_property(&args.address, args.project.into())
        .await?;

    match args.format {
        OutputFormat::Text => render_analysis(&analysis),
        OutputFormat::Json => println!("{}", service.export_analysis(ExportFormat::Json)?),
        OutputFormat::Csv => print!("{}", service.export_analysis(ExportFormat::Csv)?),
    }
    Ok(())
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let service = cli_service()?;
    let details: ProjectDetails = args.project.into();
    service
        .analyze_property(&args.address, details.clone())
        .await?;
    let report = service.generate_financial_report(Some(&details))?;

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Report payload unavailable: {err}"),
        }
    } else {
        render_report(&report);
    }
    Ok(())
}

pub(crate) async fn run_demo() -> Result<(), AppError> {
    let service = cli_service()?;
    println!("Property incentive analysis demo");
    println!("Address: {DEMO_ADDRESS}");

    let details = ProjectDetails {
        project_cost: Some(DEMO_PROJECT_COST),
        employees: Some(45),
        annual_revenue: Some(6_500_000.0),
        net_worth: Some(3_200_000.0),
        net_income: Some(540_000.0),
        jobs_created: Some(10),
        owner_occupancy_pct: Some(65.0),
        years_in_business: Some(8.0),
        year_built: Some(1925),
        use_of_funds: Some(UseOfFunds::Renovation),
        ..ProjectDetails::default()
    };

    let analysis = service
        .analyze_property(DEMO_ADDRESS, details.clone())
        .await?;
    render_analysis(&analysis);

    let report = service.generate_financial_report(Some(&details))?;
    println!();
    render_report(&report);

    let stats = service.cache_stats();
    println!(
        "\nLookup cache: {} entries | {} hits | {} misses",
        stats.size, stats.hits, stats.misses
    );
    render_repeat_lookup(&service).await
}

async fn render_repeat_lookup(service: &IncentiveService) -> Result<(), AppError> {
    let before = service.cache_stats();
    service
        .analyze_property(DEMO_ADDRESS, ProjectDetails::default())
        .await?;
    let after = service.cache_stats();
    println!(
        "Repeat analysis served {} lookups from cache ({} new misses)",
        after.hits - before.hits,
        after.misses - before.misses
    );
    Ok(())
}

fn render_analysis(analysis: &Analysis) {
    println!("\nIncentive analysis for {}", analysis.normalized_address);
    if let (Some(coordinates), Some(tract)) = (&analysis.coordinates, &analysis.census_tract) {
        println!(
            "- Location: {:.4}, {:.4} | census tract {} | {}",
            coordinates.latitude,
            coordinates.longitude,
            tract.geoid,
            analysis.state.as_deref().unwrap_or("Unknown")
        );
    }
    println!(
        "- {} of {} programs available | risk {} | completed in {} ms at {}",
        analysis.available_programs,
        analysis.results.len(),
        analysis.risk_level.label(),
        analysis.elapsed_ms,
        analysis
            .generated_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    );

    println!("Programs:");
    for result in analysis.results.values() {
        let outcome = match (result.available(), result.error_message()) {
            (_, Some(message)) => format!("error: {message}"),
            (true, None) => "available".to_string(),
            (false, None) => "not available".to_string(),
        };
        println!("  - {}: {}", result.program().label(), outcome);
        if let Some(payload) = result.data() {
            for note in payload.notes() {
                println!("      {note}");
            }
        }
    }

    println!("Recommendations:");
    for recommendation in &analysis.recommendations {
        let program = recommendation
            .program
            .map(|program| program.label())
            .unwrap_or("General");
        println!(
            "  - [{}] {}: {} ({})",
            recommendation.priority.label(),
            program,
            recommendation.action,
            recommendation.timeline
        );
    }

    if !analysis.stacking_opportunities.is_empty() {
        println!("Stacking opportunities:");
        for pair in &analysis.stacking_opportunities {
            let programs: Vec<&str> = pair.programs.iter().map(|program| program.label()).collect();
            println!(
                "  - {} [{}]: {}",
                programs.join(" + "),
                pair.compatibility.label(),
                pair.combined_benefit
            );
        }
    }
}

fn render_report(report: &FinancialReport) {
    let summary = &report.executive_summary;
    println!("Financial report");
    println!(
        "- {} | estimated value ${:.0} | {} of {} programs available",
        summary.recommendation_label,
        summary.estimated_total_value,
        summary.available_programs,
        summary.programs_evaluated
    );
    for finding in &summary.key_findings {
        println!("  * {finding}");
    }

    let projections = &report.projections;
    println!(
        "Base case: ${:.0} project + ${:.0} financing = ${:.0}",
        projections.base_case.project_cost,
        projections.base_case.financing_cost,
        projections.base_case.total_cost
    );
    println!(
        "With incentives: ${:.0} credits | ${:.0} interest savings | ${:.0} other | net ${:.0}",
        projections.with_incentives.tax_credits,
        projections.with_incentives.interest_savings,
        projections.with_incentives.other_benefits,
        projections.with_incentives.net_project_cost
    );
    println!(
        "Total savings: ${:.0} ({:.1}%)",
        projections.total_savings, projections.savings_pct
    );

    println!("Implementation plan:");
    for phase in &report.implementation_plan {
        println!("  {}. {} ({})", phase.phase, phase.name, phase.duration);
    }

    println!("Risk: {}", report.risk_assessment.level_label);
    for factor in &report.risk_assessment.factors {
        println!("  - {factor}");
    }

    println!("Next steps:");
    for step in &report.next_steps {
        println!("  {}. [{}] {}", step.step, step.priority_label, step.action);
    }
}
