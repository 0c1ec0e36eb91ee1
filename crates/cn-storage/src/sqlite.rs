use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use cn_core::{CnError, CnResult};

/// Default number of connections in the pool. SQLite WAL mode supports
/// 1 writer + N readers, so even a small pool keeps concurrent reads from
/// queueing behind each other.
const DEFAULT_POOL_SIZE: usize = 4;

/// Shared SQLite handle behind the relational stores.
///
/// Round-robin pool of mutex-guarded connections. The closure passed to
/// [`SqliteDb::with_conn`] is synchronous, so the guard always drops before
/// any `.await` in the async store methods.
pub struct SqliteDb {
    pool: Vec<Mutex<Connection>>,
    next_slot: std::sync::atomic::AtomicUsize,
}

impl SqliteDb {
    pub fn open(path: &Path) -> CnResult<Self> {
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            pool.push(Mutex::new(Self::open_connection(path)?));
        }

        let db = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// In-memory database for tests. Uses a shared-cache URI so every pool
    /// connection sees the same data.
    pub fn open_in_memory() -> CnResult<Self> {
        let uri = format!("file:memdb{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            let conn = Connection::open_with_flags(&uri, flags)
                .map_err(|e| CnError::Storage(format!("failed to open in-memory sqlite: {e}")))?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| CnError::Storage(format!("pragma error: {e}")))?;
            pool.push(Mutex::new(conn));
        }

        let db = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn open_connection(path: &Path) -> CnResult<Connection> {
        let conn = Connection::open(path)
            .map_err(|e| CnError::Storage(format!("failed to open sqlite: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| CnError::Storage(format!("pragma error: {e}")))?;

        Ok(conn)
    }

    /// Execute a synchronous closure with a pooled connection.
    pub fn with_conn<F, T>(&self, f: F) -> CnResult<T>
    where
        F: FnOnce(&Connection) -> CnResult<T>,
    {
        let idx = self
            .next_slot
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.pool.len();
        let conn = self.pool[idx]
            .lock()
            .map_err(|e| CnError::Storage(e.to_string()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> CnResult<()> {
        // Migrations run on slot 0 only — they need exclusive access.
        let conn = self.pool[0]
            .lock()
            .map_err(|e| CnError::Storage(e.to_string()))?;

        const MIGRATIONS: &[(i64, &str)] = &[
            (1, include_str!("../migrations/001_initial.sql")),
            (2, include_str!("../migrations/002_chat_domains.sql")),
            (3, include_str!("../migrations/003_report_indexes.sql")),
        ];

        // Migration 001 must always run first to create schema_version.
        conn.execute_batch(MIGRATIONS[0].1)
            .map_err(|e| CnError::Migration(format!("migration 001 failed: {e}")))?;

        let max_version: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for &(version, sql) in &MIGRATIONS[1..] {
            if version <= max_version {
                continue;
            }
            conn.execute_batch(sql)
                .map_err(|e| CnError::Migration(format!("migration {version:03} failed: {e}")))?;
            tracing::info!(version, "applied migration");
        }

        Ok(())
    }
}

/// Render a timestamp as fixed-width RFC 3339 UTC text. Fixed width keeps
/// lexicographic comparison in SQL range predicates chronological.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

pub(crate) fn parse_uuid_str(column: usize, s: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(s)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}
