use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use cn_core::{CnError, CompanyLabel, User};
use cn_engine::report::Download;

use crate::identity::RequestIdentity;
use crate::rest::error_response;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub company_name: Option<String>,
    #[serde(rename = "type", default = "default_report_type")]
    pub report_type: String,
}

fn default_report_type() -> String {
    "suk".to_string()
}

/// Resolve the calling user or fail with 401. Reports are owner-scoped, so
/// anonymous callers have nothing to own.
async fn require_user(state: &AppState, identity: &RequestIdentity) -> Result<User, Response> {
    if identity.is_anonymous() {
        return Err(error_response(StatusCode::UNAUTHORIZED, "authentication required"));
    }
    match state.users.get_by_username(&identity.actor_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "unknown user")),
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed");
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to resolve user"))
        }
    }
}

fn parse_report_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid report id"))
}

/// POST /api/reports/generate
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let user = match require_user(&state, &identity).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let Some(company_name) = req
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "company_name is required");
    };

    match state
        .report_service
        .generate(user.id, company_name, &req.report_type)
        .await
    {
        Ok(report) => Json(serde_json::json!({
            "message": "Report generation started",
            "report_id": report.id.to_string(),
            "status": report.status,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "report generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate report")
        }
    }
}

/// GET /api/reports/status/:id
pub async fn status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> Response {
    let user = match require_user(&state, &identity).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let report_id = match parse_report_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.report_service.status(user.id, report_id).await {
        Ok(Some(report)) => Json(serde_json::json!({
            "report_id": report.id.to_string(),
            "status": report.status,
            "company_name": report.company_name,
            "file_name": report.file_name,
            "created_at": report.created_at.to_rfc3339(),
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "report not found"),
        Err(e) => {
            tracing::error!(error = %e, "report status check failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get report status")
        }
    }
}

/// GET /api/reports/download/:id
pub async fn download(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> Response {
    let user = match require_user(&state, &identity).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let report_id = match parse_report_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.report_service.download(user.id, report_id).await {
        Ok(Some(Download::File(report, bytes))) => {
            let file_name = report.file_name.unwrap_or_else(|| "report.pdf".into());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(Some(Download::Placeholder(report))) => Json(serde_json::json!({
            "message": "Report file is not materialized on this host",
            "file_name": report.file_name,
            "file_path": report.file_path,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "report not found"),
        Err(CnError::InvalidInput(message)) => error_response(StatusCode::BAD_REQUEST, message),
        Err(e) => {
            tracing::error!(error = %e, "report download failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to download report")
        }
    }
}

/// GET /api/reports/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    let user = match require_user(&state, &identity).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match state.report_service.history(user.id).await {
        Ok(reports) => Json(serde_json::json!({"reports": reports})).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "report history lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get report history")
        }
    }
}

/// GET /api/reports/companies — companies available for report generation.
pub async fn companies(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Response {
    if let Err(resp) = require_user(&state, &identity).await {
        return resp;
    }

    let companies = state.graph.companies(CompanyLabel::Suk).await;
    Json(serde_json::json!({"companies": companies})).into_response()
}
