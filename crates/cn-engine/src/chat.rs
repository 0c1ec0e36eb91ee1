use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use cn_core::{
    ChatDomain, ChatEnvelope, CnError, Company, CompanyGraph, CompanyLabel, ConversationStore,
    MessageRole, NewChatMessage,
};

use crate::normalize::normalize;
use crate::workflow::{WebhookOutcome, WorkflowClient, WorkflowError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub domain: ChatDomain,
    pub message: String,
    pub actor_id: String,
    /// Client-supplied timestamp, forwarded opaque to the backend.
    pub client_timestamp: Option<String>,
    pub region: Option<String>,
    pub province: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Conversation-store failure. Loud by design: silently losing a chat
    /// turn is worse than surfacing the error.
    #[error(transparent)]
    Store(#[from] CnError),

    #[error(transparent)]
    Upstream(#[from] WorkflowError),
}

/// One of the two interchangeable chat answer paths.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn respond(&self, request: &ChatRequest) -> Result<ChatEnvelope, WorkflowError>;

    /// Backend name for logging/diagnostics.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Webhook backend
// ---------------------------------------------------------------------------

/// Relays the message to the external workflow webhook and normalizes the
/// JSON answer.
pub struct WebhookChatBackend {
    workflow: Arc<WorkflowClient>,
}

impl WebhookChatBackend {
    pub fn new(workflow: Arc<WorkflowClient>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl ChatBackend for WebhookChatBackend {
    async fn respond(&self, request: &ChatRequest) -> Result<ChatEnvelope, WorkflowError> {
        let payload = json!({
            "message": request.message,
            "timestamp": request.client_timestamp,
            "user_id": request.actor_id,
            "type": request.domain.as_str(),
            "region": request.region,
            "province": request.province,
        });

        match self.workflow.invoke(&payload).await? {
            WebhookOutcome::Json(body) => Ok(normalize(&body)),
            WebhookOutcome::Binary { .. } => Err(WorkflowError::UpstreamFailure {
                status: 200,
                body: "unexpected binary response from chat webhook".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ---------------------------------------------------------------------------
// Graph backend
// ---------------------------------------------------------------------------

/// Answers from the company graph with naive keyword matching: name hits
/// become existing solutions, sector hits become potential suppliers. Never
/// fails — the gateway degrades instead of erroring.
pub struct GraphChatBackend {
    graph: Arc<dyn CompanyGraph>,
}

impl GraphChatBackend {
    pub fn new(graph: Arc<dyn CompanyGraph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl ChatBackend for GraphChatBackend {
    async fn respond(&self, request: &ChatRequest) -> Result<ChatEnvelope, WorkflowError> {
        let keywords = extract_keywords(&request.message);
        let label = CompanyLabel::from(request.domain);

        // Name matches, ranked by how many keywords hit each company.
        let mut name_hits: HashMap<String, (Company, usize, Vec<String>)> = HashMap::new();
        for keyword in &keywords {
            for company in self.graph.search(label, keyword).await {
                let entry = name_hits
                    .entry(company.name.clone())
                    .or_insert_with(|| (company, 0, Vec::new()));
                entry.1 += 1;
                entry.2.push(keyword.clone());
            }
        }

        let mut solutions: Vec<Value> = name_hits
            .into_values()
            .map(|(company, hits, matched)| {
                json!({
                    "company_name": company.name,
                    "matched_category": company.sectors.first(),
                    "match_reason": format!("name matched: {}", matched.join(", ")),
                    "ranking": hits as f64,
                })
            })
            .collect();
        // HashMap iteration order is arbitrary; fix it before the stable
        // ranking sort.
        solutions.sort_by(|a, b| a["company_name"].as_str().cmp(&b["company_name"].as_str()));

        // Sector matches: sample members of every sector a keyword hits.
        let mut suppliers: Vec<Value> = Vec::new();
        let aggregates = self.graph.sector_aggregations(label).await;
        for aggregate in &aggregates {
            let sector_lc = aggregate.sector.to_lowercase();
            let matched: Vec<&String> = keywords
                .iter()
                .filter(|kw| sector_lc.contains(kw.as_str()))
                .collect();
            if matched.is_empty() {
                continue;
            }
            for member in &aggregate.sample_companies {
                suppliers.push(json!({
                    "company_name": member,
                    "matched_category": aggregate.sector,
                    "match_reason": format!("sector matched: {}", matched
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")),
                    "ranking": matched.len() as f64,
                }));
            }
        }

        // Reuse the canonical rank/cap path so both backends share envelope
        // semantics.
        Ok(normalize(&json!({
            "existing_solutions": solutions,
            "potential_suppliers": suppliers,
            "timestamp": request.client_timestamp,
        })))
    }

    fn name(&self) -> &str {
        "graph"
    }
}

/// Naive keyword split: lowercase alphanumeric words of three or more
/// characters, deduplicated in order.
pub fn extract_keywords(message: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for word in message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
    {
        if word.len() >= 3 && !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Orchestrates one chat turn: persist the user message, ask the backend,
/// persist the assistant envelope, return it.
pub struct ChatService {
    conversations: Arc<dyn ConversationStore>,
    backend: Arc<dyn ChatBackend>,
}

impl ChatService {
    pub fn new(conversations: Arc<dyn ConversationStore>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            conversations,
            backend,
        }
    }

    pub async fn send_message(&self, request: ChatRequest) -> Result<ChatEnvelope, ChatError> {
        self.conversations
            .append(NewChatMessage::new(
                MessageRole::User,
                request.domain,
                request.actor_id.clone(),
                request.message.clone(),
            ))
            .await?;

        // An upstream failure past this point leaves the user message in
        // place and persists no assistant turn.
        let envelope = self.backend.respond(&request).await?;

        let serialized = serde_json::to_string(&envelope).map_err(CnError::from)?;
        self.conversations
            .append(NewChatMessage::new(
                MessageRole::Assistant,
                request.domain,
                request.actor_id.clone(),
                serialized,
            ))
            .await?;

        info!(
            actor_id = %request.actor_id,
            domain = %request.domain,
            backend = self.backend.name(),
            solutions = envelope.existing_solutions.len(),
            suppliers = envelope.potential_suppliers.len(),
            "chat turn completed"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use cn_graph::{GraphGateway, SqliteCompanyGraph};
    use cn_storage::{SqliteConversationStore, SqliteDb};

    fn conversation_store() -> Arc<SqliteConversationStore> {
        Arc::new(SqliteConversationStore::new(Arc::new(
            SqliteDb::open_in_memory().unwrap(),
        )))
    }

    fn webhook_service(
        store: Arc<SqliteConversationStore>,
        url: String,
    ) -> ChatService {
        let workflow = Arc::new(WorkflowClient::from_config(&WorkflowConfig {
            chat_webhook_url: Some(url),
            ..WorkflowConfig::default()
        }));
        ChatService::new(store, Arc::new(WebhookChatBackend::new(workflow)))
    }

    #[test]
    fn keywords_are_lowercased_deduplicated_and_short_words_dropped() {
        assert_eq!(
            extract_keywords("Solar panels, solar PANELS in IoT!"),
            vec!["solar", "panels", "iot"]
        );
        assert!(extract_keywords("a an of").is_empty());
    }

    #[tokio::test]
    async fn send_message_persists_both_turns_with_serialized_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/webhook")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"potential_suppliers":[{"name":"A","ranking":5},{"name":"B","ranking":9}]}"#,
            )
            .create_async()
            .await;

        let store = conversation_store();
        let service = webhook_service(Arc::clone(&store), format!("{}/webhook", server.url()));

        let envelope = service
            .send_message(ChatRequest {
                domain: ChatDomain::Startup,
                message: "solar panels".into(),
                actor_id: "alice".into(),
                client_timestamp: None,
                region: None,
                province: None,
            })
            .await
            .unwrap();

        // B (ranking 9) outranks A (ranking 5); solutions stay empty.
        assert!(envelope.existing_solutions.is_empty());
        assert_eq!(envelope.potential_suppliers[0]["name"], "B");
        assert_eq!(envelope.potential_suppliers[1]["name"], "A");

        let history = store.history("alice", ChatDomain::Startup, 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "solar panels");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, serde_json::to_string(&envelope).unwrap());
    }

    #[tokio::test]
    async fn upstream_failure_keeps_user_message_only() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/webhook")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let store = conversation_store();
        let service = webhook_service(Arc::clone(&store), format!("{}/webhook", server.url()));

        let err = service
            .send_message(ChatRequest {
                domain: ChatDomain::Suk,
                message: "anything".into(),
                actor_id: "alice".into(),
                client_timestamp: None,
                region: None,
                province: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Upstream(WorkflowError::UpstreamFailure { status: 500, .. })
        ));

        let history = store.history("alice", ChatDomain::Suk, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn graph_backend_matches_names_and_sectors() {
        let graph_store = SqliteCompanyGraph::open_in_memory().unwrap();
        graph_store.seed_demo().unwrap();
        let backend = GraphChatBackend::new(Arc::new(GraphGateway::with_store(graph_store)));

        let envelope = backend
            .respond(&ChatRequest {
                domain: ChatDomain::Suk,
                message: "acme technology partners".into(),
                actor_id: "alice".into(),
                client_timestamp: Some("2024-03-01T09:00:00Z".into()),
                region: None,
                province: None,
            })
            .await
            .unwrap();

        assert!(envelope.success);
        assert!(envelope
            .existing_solutions
            .iter()
            .any(|i| i["company_name"] == "Acme Corporation"));
        assert!(envelope
            .potential_suppliers
            .iter()
            .any(|i| i["matched_category"] == "Technology"));
        assert!(envelope.potential_suppliers.len() <= crate::normalize::RANKED_RESULT_LIMIT);
        assert_eq!(envelope.timestamp, Some(serde_json::json!("2024-03-01T09:00:00Z")));
    }

    #[tokio::test]
    async fn graph_backend_with_degraded_gateway_still_succeeds() {
        let backend = GraphChatBackend::new(Arc::new(GraphGateway::degraded()));
        let envelope = backend
            .respond(&ChatRequest {
                domain: ChatDomain::Suk,
                message: "intelligence".into(),
                actor_id: "alice".into(),
                client_timestamp: None,
                region: None,
                province: None,
            })
            .await
            .unwrap();
        assert!(envelope.success);
        // Degraded search finds no names, but fallback aggregates still
        // surface sector matches.
        assert!(envelope.existing_solutions.is_empty());
        assert!(!envelope.potential_suppliers.is_empty());
    }
}
