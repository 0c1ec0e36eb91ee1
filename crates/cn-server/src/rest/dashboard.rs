use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use cn_core::CompanyLabel;

use crate::identity::RequestIdentity;
use crate::rest::error_response;
use crate::state::AppState;

const RECENT_REPORTS_LIMIT: usize = 10;

#[derive(Deserialize)]
pub struct SectorParams {
    pub sector: Option<String>,
}

#[derive(Deserialize)]
pub struct CompanyParams {
    pub company: Option<String>,
}

fn require_identified(identity: &RequestIdentity) -> Result<(), Response> {
    if identity.is_anonymous() {
        return Err(error_response(StatusCode::UNAUTHORIZED, "authentication required"));
    }
    Ok(())
}

/// GET /api/dashboard/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }

    let company_count = state.graph.company_count(CompanyLabel::Suk).await;
    let sector_count = state.graph.sector_count(CompanyLabel::Suk).await;
    let sector_distribution = state.graph.sector_aggregations(CompanyLabel::Suk).await;

    let midnight = Utc::now()
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    let reports_today = match state.reports.count_created_since(midnight).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, "failed to count today's reports");
            0
        }
    };

    Json(serde_json::json!({
        "company_count": company_count,
        "sector_count": sector_count,
        "reports_today": reports_today,
        "last_update": Utc::now().to_rfc3339(),
        "sector_distribution": sector_distribution,
    }))
    .into_response()
}

/// GET /api/dashboard/companies
pub async fn companies(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }
    let companies = state.graph.companies(CompanyLabel::Suk).await;
    Json(serde_json::json!({"companies": companies})).into_response()
}

/// GET /api/dashboard/sectors
pub async fn sectors(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }
    let sectors = state.graph.sector_aggregations(CompanyLabel::Suk).await;
    Json(serde_json::json!({"sectors": sectors})).into_response()
}

/// GET /api/dashboard/sector-companies?sector=
pub async fn sector_companies(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Query(params): Query<SectorParams>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }
    let Some(sector) = params.sector.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "sector parameter is required");
    };

    let companies = state
        .graph
        .companies_by_sector(CompanyLabel::Suk, sector)
        .await;
    Json(serde_json::json!({"companies": companies})).into_response()
}

/// GET /api/dashboard/company-relationships?company=
pub async fn company_relationships(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Query(params): Query<CompanyParams>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }
    let Some(company) = params.company.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "company parameter is required");
    };

    let graph = state.graph.relationships(CompanyLabel::Suk, company).await;
    Json(graph).into_response()
}

/// GET /api/dashboard/recent-reports
pub async fn recent_reports(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    if let Err(resp) = require_identified(&identity) {
        return resp;
    }

    match state.reports.recent_with_usernames(RECENT_REPORTS_LIMIT).await {
        Ok(recent) => {
            let items: Vec<serde_json::Value> = recent
                .into_iter()
                .map(|(report, username)| {
                    serde_json::json!({
                        "id": report.id.to_string(),
                        "company_name": report.company_name,
                        "status": report.status,
                        "created_at": report.created_at.to_rfc3339(),
                        "username": username,
                    })
                })
                .collect();
            Json(serde_json::json!({"recent_reports": items})).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch recent reports");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch recent reports")
        }
    }
}
