use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CnResult;
use crate::model::*;

/// Persistent store for conversation turns.
///
/// Writes fail loudly when the backing store is down — losing a chat turn
/// silently is worse than surfacing the error.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert one message; the store assigns id and timestamp.
    async fn append(&self, message: NewChatMessage) -> CnResult<ChatMessage>;

    /// The most recent `limit` messages for an actor within one domain,
    /// returned in ascending timestamp order. Both filters are mandatory.
    async fn history(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        limit: usize,
    ) -> CnResult<Vec<ChatMessage>>;

    /// Rewrite the earliest user message in the window with a title
    /// annotation, replacing any existing annotation.
    /// `CnError::ConversationNotFound` when the window holds no user message.
    async fn retitle(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        window: TimeWindow,
        title: &str,
    ) -> CnResult<()>;

    /// Delete all messages (both roles) in the window; returns the count
    /// deleted. Idempotent — a second call deletes zero.
    async fn delete_window(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        window: TimeWindow,
    ) -> CnResult<usize>;
}

/// Persistent store for report lifecycle rows.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: &Report) -> CnResult<()>;

    /// Owner-scoped lookup; `None` when the report does not exist or belongs
    /// to a different user.
    async fn get_for_owner(&self, id: Uuid, owner: Uuid) -> CnResult<Option<Report>>;

    async fn set_workflow_id(&self, id: Uuid, workflow_id: &str) -> CnResult<()>;

    async fn mark_completed(&self, id: Uuid, file_name: &str, file_path: &str) -> CnResult<()>;

    async fn mark_failed(&self, id: Uuid) -> CnResult<()>;

    async fn list_for_owner(&self, owner: Uuid) -> CnResult<Vec<Report>>;

    /// Most recent reports across all owners, with the owning username.
    async fn recent_with_usernames(&self, limit: usize) -> CnResult<Vec<(Report, String)>>;

    async fn count_created_since(&self, since: DateTime<Utc>) -> CnResult<usize>;
}

/// Minimal user identity store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch by username, inserting the row first if absent.
    async fn ensure(&self, username: &str, role: &str) -> CnResult<User>;

    async fn get(&self, id: Uuid) -> CnResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> CnResult<Option<User>>;
}

/// Read gateway over the company graph.
///
/// Store-unavailable is degraded, never an error: every operation returns
/// fallback or empty data so user-facing chat and dashboards keep working.
#[async_trait]
pub trait CompanyGraph: Send + Sync {
    async fn company_count(&self, label: CompanyLabel) -> usize;

    async fn sector_count(&self, label: CompanyLabel) -> usize;

    /// All companies under the label, ordered by name.
    async fn companies(&self, label: CompanyLabel) -> Vec<Company>;

    async fn company_details(&self, label: CompanyLabel, name: &str) -> Option<Company>;

    /// Case-insensitive substring match on the company name, capped.
    async fn search(&self, label: CompanyLabel, term: &str) -> Vec<Company>;

    async fn companies_by_sector(&self, label: CompanyLabel, sector: &str) -> Vec<Company>;

    /// Unwind the multi-valued sector field: per sector a count and a capped
    /// sample of member names, top sectors by count.
    async fn sector_aggregations(&self, label: CompanyLabel) -> Vec<SectorAggregate>;

    /// One-hop neighborhood of edges with weight >= 3 around a company.
    async fn relationships(&self, label: CompanyLabel, name: &str) -> RelationshipGraph;

    async fn region_counts(&self, label: CompanyLabel) -> Vec<RegionCount>;

    async fn province_counts(&self, label: CompanyLabel, region: &str) -> Vec<RegionCount>;
}
