use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::analysis::{Analysis, RiskLevel};
use super::error::IncentiveError;
use super::export::ExportFormat;
use super::programs::ProjectDetails;
use super::service::IncentiveService;
use crate::error::AppError;

/// Router builder exposing the analysis, report, export, and cache endpoints.
pub fn incentive_router(service: Arc<IncentiveService>) -> Router {
    Router::new()
        .route("/api/v1/incentives/analyze", post(analyze_handler))
        .route("/api/v1/incentives/report", post(report_handler))
        .route("/api/v1/incentives/export", get(export_handler))
        .route("/api/v1/incentives/history", get(history_handler))
        .route("/api/v1/incentives/cache", delete(clear_cache_handler))
        .route("/api/v1/incentives/cache/stats", get(cache_stats_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub address: String,
    #[serde(default)]
    pub project_details: ProjectDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub project_details: Option<ProjectDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryView {
    pub address: String,
    pub normalized_address: String,
    pub available_programs: usize,
    pub risk_level: RiskLevel,
    pub risk_label: &'static str,
    pub generated_at: DateTime<Utc>,
}

impl From<&Analysis> for HistoryEntryView {
    fn from(analysis: &Analysis) -> Self {
        Self {
            address: analysis.address.clone(),
            normalized_address: analysis.normalized_address.clone(),
            available_programs: analysis.available_programs,
            risk_level: analysis.risk_level,
            risk_label: analysis.risk_level.label(),
            generated_at: analysis.generated_at,
        }
    }
}

pub(crate) async fn analyze_handler(
    State(service): State<Arc<IncentiveService>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match service
        .analyze_property(&request.address, request.project_details)
        .await
    {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler(
    State(service): State<Arc<IncentiveService>>,
    body: Bytes,
) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ReportRequest::default()
    } else {
        match serde_json::from_slice::<ReportRequest>(&body) {
            Ok(request) => request,
            Err(err) => {
                let payload = json!({ "error": format!("invalid report request: {err}") });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        }
    };

    match service.generate_financial_report(request.project_details.as_ref()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler(
    State(service): State<Arc<IncentiveService>>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let format = match query.format.as_deref().unwrap_or("json").parse::<ExportFormat>() {
        Ok(format) => format,
        Err(err) => return error_response(err),
    };

    match service.export_analysis(format) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, format.content_type())],
            body,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn history_handler(State(service): State<Arc<IncentiveService>>) -> Response {
    let entries: Vec<HistoryEntryView> = service
        .history()
        .iter()
        .map(HistoryEntryView::from)
        .collect();
    (StatusCode::OK, Json(entries)).into_response()
}

pub(crate) async fn clear_cache_handler(State(service): State<Arc<IncentiveService>>) -> Response {
    service.clear_all_caches();
    let payload = json!({
        "cleared": true,
        "stats": service.cache_stats(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn cache_stats_handler(State(service): State<Arc<IncentiveService>>) -> Response {
    (StatusCode::OK, Json(service.cache_stats())).into_response()
}

fn error_response(err: IncentiveError) -> Response {
    AppError::from(err).into_response()
}
