use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use rusqlite::types::Type;
use uuid::Uuid;

use cn_core::{CnError, CnResult, Report, ReportStatus, ReportStore};

use crate::sqlite::{fmt_ts, parse_ts, parse_uuid_str, SqliteDb};

pub struct SqliteReportStore {
    db: Arc<SqliteDb>,
}

impl SqliteReportStore {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self { db }
    }

    fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
        let id_str: String = row.get(0)?;
        let user_str: String = row.get(1)?;
        let company_name: String = row.get(2)?;
        let report_type: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let file_name: Option<String> = row.get(5)?;
        let file_path: Option<String> = row.get(6)?;
        let workflow_id: Option<String> = row.get(7)?;
        let created_str: String = row.get(8)?;
        let updated_str: String = row.get(9)?;

        Ok(Report {
            id: parse_uuid_str(0, &id_str)?,
            user_id: parse_uuid_str(1, &user_str)?,
            company_name,
            report_type,
            status: ReportStatus::from_str(&status_str).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
                )
            })?,
            file_name,
            file_path,
            workflow_id,
            created_at: parse_ts(8, &created_str)?,
            updated_at: parse_ts(9, &updated_str)?,
        })
    }

    fn touch(conn: &rusqlite::Connection, id: Uuid, set_clause: &str, args: &[&dyn rusqlite::ToSql]) -> CnResult<()> {
        let sql = format!(
            "UPDATE reports SET {set_clause}, updated_at = ?1 WHERE id = ?2"
        );
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(args.len() + 2);
        let now = fmt_ts(Utc::now());
        let id_str = id.to_string();
        params.push(&now);
        params.push(&id_str);
        params.extend_from_slice(args);
        let changed = conn
            .execute(&sql, params.as_slice())
            .map_err(|e| CnError::Storage(format!("update report: {e}")))?;
        if changed == 0 {
            return Err(CnError::ReportNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn insert(&self, report: &Report) -> CnResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports
                     (id, user_id, company_name, report_type, status,
                      file_name, file_path, workflow_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    report.id.to_string(),
                    report.user_id.to_string(),
                    report.company_name,
                    report.report_type,
                    report.status.as_str(),
                    report.file_name,
                    report.file_path,
                    report.workflow_id,
                    fmt_ts(report.created_at),
                    fmt_ts(report.updated_at),
                ],
            )
            .map_err(|e| CnError::Storage(format!("insert report: {e}")))?;
            Ok(())
        })
    }

    async fn get_for_owner(&self, id: Uuid, owner: Uuid) -> CnResult<Option<Report>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, company_name, report_type, status,
                        file_name, file_path, workflow_id, created_at, updated_at
                 FROM reports WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), owner.to_string()],
                Self::row_to_report,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(CnError::Storage(other.to_string())),
            })
        })
    }

    async fn set_workflow_id(&self, id: Uuid, workflow_id: &str) -> CnResult<()> {
        self.db
            .with_conn(|conn| Self::touch(conn, id, "workflow_id = ?3", &[&workflow_id]))
    }

    async fn mark_completed(&self, id: Uuid, file_name: &str, file_path: &str) -> CnResult<()> {
        self.db.with_conn(|conn| {
            Self::touch(
                conn,
                id,
                "status = 'completed', file_name = ?3, file_path = ?4",
                &[&file_name, &file_path],
            )
        })
    }

    async fn mark_failed(&self, id: Uuid) -> CnResult<()> {
        self.db
            .with_conn(|conn| Self::touch(conn, id, "status = 'failed'", &[]))
    }

    async fn list_for_owner(&self, owner: Uuid) -> CnResult<Vec<Report>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, company_name, report_type, status,
                            file_name, file_path, workflow_id, created_at, updated_at
                     FROM reports WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .map_err(|e| CnError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![owner.to_string()], Self::row_to_report)
                .map_err(|e| CnError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Storage(e.to_string()))
        })
    }

    async fn recent_with_usernames(&self, limit: usize) -> CnResult<Vec<(Report, String)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT r.id, r.user_id, r.company_name, r.report_type, r.status,
                            r.file_name, r.file_path, r.workflow_id, r.created_at, r.updated_at,
                            u.username
                     FROM reports r JOIN users u ON u.id = r.user_id
                     ORDER BY r.created_at DESC, r.id DESC
                     LIMIT ?1",
                )
                .map_err(|e| CnError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    let report = Self::row_to_report(row)?;
                    let username: String = row.get(10)?;
                    Ok((report, username))
                })
                .map_err(|e| CnError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Storage(e.to_string()))
        })
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> CnResult<usize> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM reports WHERE created_at >= ?1",
                params![fmt_ts(since)],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| CnError::Storage(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::SqliteUserStore;
    use cn_core::UserStore;

    async fn fixtures() -> (SqliteReportStore, SqliteUserStore) {
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        (
            SqliteReportStore::new(Arc::clone(&db)),
            SqliteUserStore::new(db),
        )
    }

    #[tokio::test]
    async fn lifecycle_pending_to_completed() {
        let (reports, users) = fixtures().await;
        let owner = users.ensure("admin", "admin").await.unwrap();
        let report = Report::new(owner.id, "Acme Corporation", "suk");
        reports.insert(&report).await.unwrap();

        reports.set_workflow_id(report.id, "exec-42").await.unwrap();
        reports
            .mark_completed(report.id, "Acme_Corporation_20240301.pdf", "/data/reports/Acme_Corporation_20240301.pdf")
            .await
            .unwrap();

        let stored = reports
            .get_for_owner(report.id, owner.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ReportStatus::Completed);
        assert_eq!(stored.workflow_id.as_deref(), Some("exec-42"));
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn reads_are_owner_scoped() {
        let (reports, users) = fixtures().await;
        let owner = users.ensure("alice", "user").await.unwrap();
        let other = users.ensure("bob", "user").await.unwrap();
        let report = Report::new(owner.id, "Beta Industries", "suk");
        reports.insert(&report).await.unwrap();

        assert!(reports
            .get_for_owner(report.id, other.id)
            .await
            .unwrap()
            .is_none());
        assert!(reports.list_for_owner(other.id).await.unwrap().is_empty());
        assert_eq!(reports.list_for_owner(owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_failed_on_missing_report_errors() {
        let (reports, _) = fixtures().await;
        let err = reports.mark_failed(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CnError::ReportNotFound(_)));
    }

    #[tokio::test]
    async fn recent_reports_join_usernames() {
        let (reports, users) = fixtures().await;
        let owner = users.ensure("carol", "user").await.unwrap();
        reports
            .insert(&Report::new(owner.id, "Gamma Solutions", "federterziario"))
            .await
            .unwrap();

        let recent = reports.recent_with_usernames(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].1, "carol");
    }
}
