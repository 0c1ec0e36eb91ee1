use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::identity::identity_middleware;
use crate::state::AppState;

#[path = "rest/chat.rs"]
mod chat;
#[path = "rest/dashboard.rs"]
mod dashboard;
#[path = "rest/reports.rs"]
mod reports;

pub fn create_router(state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/send-message", post(chat::send_message))
        .route("/history", get(chat::history))
        .route("/update-conversation-title", put(chat::update_title))
        .route("/delete-conversation", delete(chat::delete_conversation))
        .route("/regions", get(chat::regions))
        .route("/provinces", get(chat::provinces));

    let report_routes = Router::new()
        .route("/generate", post(reports::generate))
        .route("/status/:id", get(reports::status))
        .route("/download/:id", get(reports::download))
        .route("/history", get(reports::history))
        .route("/companies", get(reports::companies));

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/companies", get(dashboard::companies))
        .route("/sectors", get(dashboard::sectors))
        .route("/sector-companies", get(dashboard::sector_companies))
        .route("/company-relationships", get(dashboard::company_relationships))
        .route("/recent-reports", get(dashboard::recent_reports));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/chat/:domain", chat_routes)
        .nest("/api/reports", report_routes)
        .nest("/api/dashboard", dashboard_routes)
        .layer(middleware::from_fn(identity_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Shared `{error}` body helper — no failure leaves the boundary as a raw
/// stack trace.
pub(crate) fn error_response(status: StatusCode, message: impl AsRef<str>) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({"error": message.as_ref()})),
    )
        .into_response()
}
