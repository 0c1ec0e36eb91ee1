use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Chat Message
// ---------------------------------------------------------------------------

/// One persisted turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub role: MessageRole,
    /// Free-form caller identity. NOT a foreign key — unauthenticated callers
    /// are stored as `anonymous`.
    pub actor_id: String,
    pub domain: ChatDomain,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for a chat message; id and timestamp are assigned by the
/// store on insert.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub content: String,
    pub role: MessageRole,
    pub actor_id: String,
    pub domain: ChatDomain,
}

impl NewChatMessage {
    pub fn new(
        role: MessageRole,
        domain: ChatDomain,
        actor_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            role,
            actor_id: actor_id.into(),
            domain,
        }
    }
}

/// Sentinel actor id for unauthenticated callers.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("unknown message role: {s}")),
        }
    }
}

/// Tag partitioning one physical message store into independent logical chat
/// domains. History reads must always filter by domain as well as actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatDomain {
    Suk,
    Startup,
}

impl ChatDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suk => "SUK",
            Self::Startup => "STARTUP",
        }
    }

    /// Parse the lowercase route segment (`/api/chat/:domain/...`).
    pub fn from_route(s: &str) -> Option<Self> {
        match s {
            "suk" => Some(Self::Suk),
            "startup" => Some(Self::Startup),
            _ => None,
        }
    }
}

impl std::str::FromStr for ChatDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUK" => Ok(Self::Suk),
            "STARTUP" => Ok(Self::Startup),
            _ => Err(format!("unknown chat domain: {s}")),
        }
    }
}

impl std::fmt::Display for ChatDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed `[start, end]` time window selecting one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat Envelope
// ---------------------------------------------------------------------------

/// Canonical normalized chat result. Assistant turns persist this serialized
/// as their message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub existing_solutions: Vec<serde_json::Value>,
    pub potential_suppliers: Vec<serde_json::Value>,
    /// Pass-through from the upstream source object; null when absent.
    pub timestamp: Option<serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatEnvelope {
    pub fn empty() -> Self {
        Self {
            existing_solutions: Vec::new(),
            potential_suppliers: Vec::new(),
            timestamp: None,
            success: true,
            error: None,
        }
    }

    /// Soft-failure envelope for an unrecognized upstream shape. Still
    /// `success = true` so callers' happy paths survive.
    pub fn unexpected_shape(detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::empty()
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Tracks an asynchronous document-generation request. Owned exclusively by
/// the requesting user; all reads and downloads are owner-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub report_type: String,
    pub status: ReportStatus,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    /// Identifier correlating this report to the triggered external workflow
    /// execution.
    pub workflow_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(user_id: Uuid, company_name: impl Into<String>, report_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            company_name: company_name.into(),
            report_type: report_type.into(),
            status: ReportStatus::Pending,
            file_name: None,
            file_path: None,
            workflow_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown report status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Minimal identity row backing report ownership. Credential handling lives
/// outside this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            role: role.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Company Graph
// ---------------------------------------------------------------------------

/// Node label partitioning the company graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompanyLabel {
    Suk,
    Startup,
    Federterziario,
}

impl CompanyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suk => "SUK",
            Self::Startup => "STARTUP",
            Self::Federterziario => "FEDERTERZIARIO",
        }
    }
}

impl From<ChatDomain> for CompanyLabel {
    fn from(domain: ChatDomain) -> Self {
        match domain {
            ChatDomain::Suk => Self::Suk,
            ChatDomain::Startup => Self::Startup,
        }
    }
}

impl std::fmt::Display for CompanyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A company node as read from the graph store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    /// Multi-valued sector membership.
    pub sectors: Vec<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub region: Option<String>,
    pub province: Option<String>,
    pub trl: Option<i64>,
    pub activity_start: Option<String>,
}

impl Company {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Per-sector grouping across the multi-valued sector field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAggregate {
    pub sector: String,
    pub count: usize,
    /// Capped sample of member company names.
    pub sample_companies: Vec<String>,
}

/// Count of companies per region (or per province within a region).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCount {
    pub name: String,
    pub count: usize,
}

/// One-hop relationship neighborhood around a company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    /// `center` for the queried company, `related` otherwise.
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub edge_type: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_domain_round_trips_through_str() {
        for domain in [ChatDomain::Suk, ChatDomain::Startup] {
            let parsed: ChatDomain = domain.as_str().parse().unwrap();
            assert_eq!(parsed, domain);
        }
        assert!("suk".parse::<ChatDomain>().is_err());
        assert_eq!(ChatDomain::from_route("startup"), Some(ChatDomain::Startup));
        assert_eq!(ChatDomain::from_route("STARTUP"), None);
    }

    #[test]
    fn envelope_serializes_without_error_field_when_none() {
        let json = serde_json::to_value(ChatEnvelope::empty()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["timestamp"], serde_json::Value::Null);
        assert!(json.get("error").is_none());

        let soft = serde_json::to_value(ChatEnvelope::unexpected_shape("boom")).unwrap();
        assert_eq!(soft["success"], true);
        assert_eq!(soft["error"], "boom");
    }

    #[test]
    fn report_starts_pending() {
        let report = Report::new(Uuid::now_v7(), "Acme", "suk");
        assert_eq!(report.status, ReportStatus::Pending);
        assert!(report.workflow_id.is_none());
    }
}
