use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use rusqlite::types::Type;
use uuid::Uuid;

use cn_core::{
    ChatDomain, ChatMessage, CnError, CnResult, ConversationStore, MessageRole, NewChatMessage,
    TimeWindow,
};

use crate::sqlite::{fmt_ts, parse_ts, parse_uuid_str, SqliteDb};
use crate::{title, HISTORY_PAGE_SIZE};

pub struct SqliteConversationStore {
    db: Arc<SqliteDb>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self { db }
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
        let id_str: String = row.get(0)?;
        let content: String = row.get(1)?;
        let role_str: String = row.get(2)?;
        let actor_id: String = row.get(3)?;
        let domain_str: String = row.get(4)?;
        let ts_str: String = row.get(5)?;

        Ok(ChatMessage {
            id: parse_uuid_str(0, &id_str)?,
            content,
            role: MessageRole::from_str(&role_str).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
                )
            })?,
            actor_id,
            domain: ChatDomain::from_str(&domain_str).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
                )
            })?,
            timestamp: parse_ts(5, &ts_str)?,
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, message: NewChatMessage) -> CnResult<ChatMessage> {
        let stored = ChatMessage {
            id: Uuid::now_v7(),
            content: message.content,
            role: message.role,
            actor_id: message.actor_id,
            domain: message.domain,
            timestamp: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, content, role, actor_id, domain, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stored.id.to_string(),
                    stored.content,
                    stored.role.as_str(),
                    stored.actor_id,
                    stored.domain.as_str(),
                    fmt_ts(stored.timestamp),
                ],
            )
            .map_err(|e| CnError::Storage(format!("insert chat message: {e}")))?;
            Ok(())
        })?;

        tracing::debug!(
            id = %stored.id,
            actor_id = %stored.actor_id,
            domain = %stored.domain,
            role = stored.role.as_str(),
            "chat message appended"
        );
        Ok(stored)
    }

    async fn history(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        limit: usize,
    ) -> CnResult<Vec<ChatMessage>> {
        let limit = limit.min(HISTORY_PAGE_SIZE);

        // Newest `limit` rows first, then reversed so callers always see
        // ascending timestamps.
        let mut messages = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, content, role, actor_id, domain, timestamp
                     FROM chat_messages
                     WHERE actor_id = ?1 AND domain = ?2
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?3",
                )
                .map_err(|e| CnError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![actor_id, domain.as_str(), limit as i64], |row| {
                    Self::row_to_message(row)
                })
                .map_err(|e| CnError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Storage(e.to_string()))
        })?;

        messages.reverse();
        Ok(messages)
    }

    async fn retitle(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        window: TimeWindow,
        new_title: &str,
    ) -> CnResult<()> {
        self.db.with_conn(|conn| {
            // Single transaction: readers never observe a half-applied
            // annotation.
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CnError::Storage(e.to_string()))?;

            let first: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, content FROM chat_messages
                     WHERE actor_id = ?1 AND domain = ?2 AND role = 'user'
                       AND timestamp >= ?3 AND timestamp <= ?4
                     ORDER BY timestamp ASC, id ASC
                     LIMIT 1",
                    params![
                        actor_id,
                        domain.as_str(),
                        fmt_ts(window.start),
                        fmt_ts(window.end),
                    ],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(CnError::Storage(other.to_string())),
                })?;

            let Some((id, content)) = first else {
                return Err(CnError::ConversationNotFound);
            };

            tx.execute(
                "UPDATE chat_messages SET content = ?1 WHERE id = ?2",
                params![title::annotate(&content, new_title), id],
            )
            .map_err(|e| CnError::Storage(e.to_string()))?;

            tx.commit().map_err(|e| CnError::Storage(e.to_string()))
        })?;

        tracing::info!(actor_id = %actor_id, domain = %domain, "conversation retitled");
        Ok(())
    }

    async fn delete_window(
        &self,
        actor_id: &str,
        domain: ChatDomain,
        window: TimeWindow,
    ) -> CnResult<usize> {
        let deleted = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM chat_messages
                 WHERE actor_id = ?1 AND domain = ?2
                   AND timestamp >= ?3 AND timestamp <= ?4",
                params![
                    actor_id,
                    domain.as_str(),
                    fmt_ts(window.start),
                    fmt_ts(window.end),
                ],
            )
            .map_err(|e| CnError::Storage(format!("delete conversation window: {e}")))
        })?;

        tracing::info!(actor_id = %actor_id, domain = %domain, deleted, "conversation window deleted");
        Ok(deleted)
    }
}
