pub mod address;
pub mod analysis;
pub mod cache;
pub mod error;
pub mod export;
pub mod geo;
pub mod programs;
pub mod report;
pub mod router;
pub mod service;

pub use analysis::{
    Analysis, Compatibility, IncentiveAnalyzer, Priority, Recommendation, RiskLevel, StackingPair,
};
pub use cache::{CacheStats, SharedCache, SweepHandle};
pub use error::{ErrorKind, IncentiveError, ProgramFailure};
pub use export::ExportFormat;
pub use geo::{SeededDemographics, SiteResolver, StaticGeoLocator};
pub use programs::{ProgramKey, ProgramResult, ProjectDetails};
pub use report::{generate_financial_report, FinancialReport};
pub use router::incentive_router;
pub use service::IncentiveService;
