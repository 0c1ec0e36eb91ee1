use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use uuid::Uuid;

use cn_core::{CnError, CnResult, User, UserStore};

use crate::sqlite::{fmt_ts, parse_ts, parse_uuid_str, SqliteDb};

pub struct SqliteUserStore {
    db: Arc<SqliteDb>,
}

impl SqliteUserStore {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self { db }
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let username: String = row.get(1)?;
        let role: String = row.get(2)?;
        let created_str: String = row.get(3)?;

        Ok(User {
            id: parse_uuid_str(0, &id_str)?,
            username,
            role,
            created_at: parse_ts(3, &created_str)?,
        })
    }

    fn lookup_by_username(conn: &rusqlite::Connection, username: &str) -> CnResult<Option<User>> {
        conn.query_row(
            "SELECT id, username, role, created_at FROM users WHERE username = ?1",
            params![username],
            Self::row_to_user,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CnError::Storage(other.to_string())),
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn ensure(&self, username: &str, role: &str) -> CnResult<User> {
        self.db.with_conn(|conn| {
            if let Some(user) = Self::lookup_by_username(conn, username)? {
                return Ok(user);
            }

            let user = User::new(username, role);
            conn.execute(
                "INSERT INTO users (id, username, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.role,
                    fmt_ts(user.created_at),
                ],
            )
            .map_err(|e| CnError::Storage(format!("insert user: {e}")))?;
            tracing::info!(username = %user.username, "user created");
            Ok(user)
        })
    }

    async fn get(&self, id: Uuid) -> CnResult<Option<User>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, role, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_user,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(CnError::Storage(other.to_string())),
            })
        })
    }

    async fn get_by_username(&self, username: &str) -> CnResult<Option<User>> {
        self.db
            .with_conn(|conn| Self::lookup_by_username(conn, username))
    }
}
