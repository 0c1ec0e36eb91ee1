use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use cn_core::{ChatDomain, CnError, CompanyLabel};
use cn_engine::{ChatError, ChatRequest, WorkflowError};
use cn_storage::title;

use crate::identity::RequestIdentity;
use crate::rest::error_response;
use crate::state::AppState;
use crate::validation::{parse_window, validate_message, validate_title};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub message: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
    pub region: Option<String>,
    pub province: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub user_id: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    cn_storage::HISTORY_PAGE_SIZE
}

#[derive(Serialize)]
struct HistoryItem {
    content: String,
    message_type: &'static str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Deserialize)]
pub struct RetitleRequest {
    pub user_id: Option<String>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteConversationRequest {
    pub user_id: Option<String>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
}

#[derive(Deserialize)]
pub struct ProvincesParams {
    pub region: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_domain(domain: &str) -> Result<ChatDomain, Response> {
    ChatDomain::from_route(domain)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "unknown chat domain"))
}

fn resolve_actor(body_user_id: Option<&str>, identity: &RequestIdentity) -> String {
    body_user_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| identity.actor_id.clone())
}

fn chat_error_response(err: ChatError) -> Response {
    match err {
        ChatError::Upstream(WorkflowError::Timeout) => {
            error_response(StatusCode::REQUEST_TIMEOUT, "Request timed out")
        }
        ChatError::Upstream(WorkflowError::Transport(_)) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to connect to chat service",
        ),
        ChatError::Upstream(WorkflowError::UpstreamFailure { .. }) => {
            error_response(StatusCode::BAD_GATEWAY, "Failed to process message")
        }
        ChatError::Upstream(WorkflowError::NotConfigured) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "chat webhook not configured",
        ),
        ChatError::Store(e) => {
            tracing::error!(error = %e, "conversation store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/chat/:domain/send-message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Extension(identity): Extension<RequestIdentity>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let message = match validate_message(req.message.as_deref()) {
        Ok(message) => message.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let request = ChatRequest {
        domain,
        message,
        actor_id: resolve_actor(req.user_id.as_deref(), &identity),
        client_timestamp: req.timestamp,
        region: req.region,
        province: req.province,
    };

    match state.chat.send_message(request).await {
        Ok(envelope) => Json(envelope).into_response(),
        Err(e) => chat_error_response(e),
    }
}

/// GET /api/chat/:domain/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Extension(identity): Extension<RequestIdentity>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let actor = resolve_actor(params.user_id.as_deref(), &identity);

    match state
        .conversations
        .history(&actor, domain, params.limit)
        .await
    {
        Ok(messages) => {
            let items: Vec<HistoryItem> = messages
                .into_iter()
                .map(|message| {
                    let (item_title, body) = title::split(&message.content);
                    HistoryItem {
                        title: item_title.map(str::to_string),
                        content: body.to_string(),
                        message_type: message.role.as_str(),
                        timestamp: message.timestamp.to_rfc3339(),
                    }
                })
                .collect();
            Json(serde_json::json!({"history": items, "success": true})).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch chat history");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch chat history")
        }
    }
}

/// PUT /api/chat/:domain/update-conversation-title
pub async fn update_title(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Extension(identity): Extension<RequestIdentity>,
    Json(req): Json<RetitleRequest>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let new_title = match validate_title(req.title.as_deref()) {
        Ok(title) => title.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let window = match parse_window(req.start_timestamp.as_deref(), req.end_timestamp.as_deref()) {
        Ok(window) => window,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let actor = resolve_actor(req.user_id.as_deref(), &identity);

    match state
        .conversations
        .retitle(&actor, domain, window, &new_title)
        .await
    {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "conversation title updated",
        }))
        .into_response(),
        Err(CnError::ConversationNotFound) => {
            error_response(StatusCode::NOT_FOUND, "conversation not found")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to update conversation title");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update conversation title",
            )
        }
    }
}

/// DELETE /api/chat/:domain/delete-conversation
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Extension(identity): Extension<RequestIdentity>,
    Json(req): Json<DeleteConversationRequest>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let window = match parse_window(req.start_timestamp.as_deref(), req.end_timestamp.as_deref()) {
        Ok(window) => window,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let actor = resolve_actor(req.user_id.as_deref(), &identity);

    match state.conversations.delete_window(&actor, domain, window).await {
        Ok(deleted_count) => Json(serde_json::json!({
            "success": true,
            "deleted_count": deleted_count,
            "message": format!("Deleted {deleted_count} messages from conversation"),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to delete conversation");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete conversation")
        }
    }
}

/// GET /api/chat/:domain/regions
pub async fn regions(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };

    let regions = state.graph.region_counts(CompanyLabel::from(domain)).await;
    Json(serde_json::json!({"success": true, "regions": regions})).into_response()
}

/// GET /api/chat/:domain/provinces?region=
pub async fn provinces(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Query(params): Query<ProvincesParams>,
) -> Response {
    let domain = match parse_domain(&domain) {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let Some(region) = params.region.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "region parameter is required");
    };

    let provinces = state
        .graph
        .province_counts(CompanyLabel::from(domain), region)
        .await;
    Json(serde_json::json!({"success": true, "provinces": provinces})).into_response()
}
