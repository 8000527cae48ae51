use crate::demo::{run_analyze, run_demo, run_report, AnalyzeArgs, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use property_incentives::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Property Incentive Analyzer",
    about = "Evaluate commercial properties against tax credit and financing incentive programs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Analyze one property address and print the results
    Analyze(AnalyzeArgs),
    /// Analyze a property and print the financial report
    Report(ReportArgs),
    /// Run the Washington, DC walkthrough end to end
    Demo,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Analyze(args) => run_analyze(args).await,
        Command::Report(args) => run_report(args).await,
        Command::Demo => run_demo().await,
    }
}
