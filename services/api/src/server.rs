use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_incentive_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use property_incentives::config::AppConfig;
use property_incentives::error::AppError;
use property_incentives::incentives::IncentiveService;
use property_incentives::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let incentive_service = Arc::new(IncentiveService::new(config.incentives.clone()));
    incentive_service.start_cache_sweeper();

    let app = with_incentive_routes(incentive_service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        cache_capacity = config.incentives.cache.capacity,
        "incentive analysis service ready"
    );

    let served = axum::serve(listener, app).await;
    incentive_service.stop_cache_sweeper();
    served?;
    Ok(())
}
