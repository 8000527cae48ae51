use metrics_exporter_prometheus::PrometheusHandle;
use property_incentives::config::AppConfig;
use property_incentives::error::AppError;
use property_incentives::incentives::programs::UseOfFunds;
use property_incentives::incentives::IncentiveService;
use property_incentives::telemetry::{self, LogSink};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load configuration, route logs to stderr, and build an offline service.
pub(crate) fn cli_service() -> Result<IncentiveService, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;
    Ok(IncentiveService::new(config.incentives))
}

pub(crate) fn parse_use_of_funds(raw: &str) -> Result<UseOfFunds, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "real_estate" | "real_estate_purchase" | "purchase" => Ok(UseOfFunds::RealEstatePurchase),
        "construction" => Ok(UseOfFunds::Construction),
        "renovation" => Ok(UseOfFunds::Renovation),
        "equipment" => Ok(UseOfFunds::Equipment),
        "working_capital" => Ok(UseOfFunds::WorkingCapital),
        "refinance" => Ok(UseOfFunds::Refinance),
        "inventory" => Ok(UseOfFunds::Inventory),
        other => Err(format!(
            "unknown use of funds '{other}' (expected real-estate, construction, renovation, \
             equipment, working-capital, refinance, or inventory)"
        )),
    }
}
