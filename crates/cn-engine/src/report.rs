use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use cn_core::{CnError, CnResult, Report, ReportStatus, ReportStore};

use crate::workflow::{WebhookOutcome, WorkflowClient, WorkflowError};

/// Report type whose output is a fixed-name aggregate document.
pub const GENERAL_REPORT_TYPE: &str = "general";
const GENERAL_REPORT_FILE: &str = "general_report.pdf";

/// Result of an owner-scoped download lookup.
#[derive(Debug)]
pub enum Download {
    /// Completed report with its file on disk.
    File(Report, Vec<u8>),
    /// Completed report whose file was produced out-of-band; only metadata
    /// is available.
    Placeholder(Report),
}

/// Report lifecycle orchestration: create pending, trigger the external
/// workflow, settle to completed or failed.
pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    workflow: Arc<WorkflowClient>,
    reports_dir: PathBuf,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        workflow: Arc<WorkflowClient>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reports,
            workflow,
            reports_dir: data_dir.into().join("reports"),
        }
    }

    pub async fn generate(
        &self,
        owner: Uuid,
        company_name: &str,
        report_type: &str,
    ) -> CnResult<Report> {
        let report = Report::new(owner, company_name, report_type);
        self.reports.insert(&report).await?;

        let payload = json!({
            "company_name": company_name,
            "user_id": owner.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "type": report_type,
        });

        match self.workflow.invoke(&payload).await {
            Ok(WebhookOutcome::Binary { bytes, .. }) => {
                self.complete_with_file(&report, bytes).await?;
            }
            Ok(WebhookOutcome::Json(body)) => {
                let execution_id = execution_id_of(&body);
                self.reports.set_workflow_id(report.id, &execution_id).await?;
                info!(report_id = %report.id, execution_id = %execution_id, "report workflow started");
            }
            // No webhook configured: trigger through the engine's REST API
            // instead (which itself degrades to a mock execution).
            Err(WorkflowError::NotConfigured) => {
                let result = self
                    .workflow
                    .trigger_execution(company_name, &owner.to_string(), report_type)
                    .await;
                let execution_id = execution_id_of(&result);
                self.reports.set_workflow_id(report.id, &execution_id).await?;
                info!(report_id = %report.id, execution_id = %execution_id, "report execution triggered");
            }
            Err(e) => {
                error!(report_id = %report.id, error = %e, "report workflow failed");
                self.reports.mark_failed(report.id).await?;
            }
        }

        self.reports
            .get_for_owner(report.id, owner)
            .await?
            .ok_or(CnError::ReportNotFound(report.id))
    }

    /// Owner-scoped status lookup. A pending report with a workflow id is
    /// polled and settled.
    pub async fn status(&self, owner: Uuid, id: Uuid) -> CnResult<Option<Report>> {
        let Some(report) = self.reports.get_for_owner(id, owner).await? else {
            return Ok(None);
        };

        if report.status == ReportStatus::Pending {
            if let Some(ref workflow_id) = report.workflow_id {
                let status = self.workflow.execution_status(workflow_id).await;
                if status.finished {
                    if status.success {
                        let file_name = derive_file_name(
                            &report.company_name,
                            &report.report_type,
                            Utc::now(),
                        );
                        let file_path = self.reports_dir.join(&file_name);
                        self.reports
                            .mark_completed(report.id, &file_name, &file_path.to_string_lossy())
                            .await?;
                    } else {
                        self.reports.mark_failed(report.id).await?;
                    }
                    return self.reports.get_for_owner(id, owner).await;
                }
            }
        }

        Ok(Some(report))
    }

    /// Owner-scoped download of a completed report.
    pub async fn download(&self, owner: Uuid, id: Uuid) -> CnResult<Option<Download>> {
        let Some(report) = self.reports.get_for_owner(id, owner).await? else {
            return Ok(None);
        };

        if report.status != ReportStatus::Completed || report.file_path.is_none() {
            return Err(CnError::InvalidInput("report not ready for download".into()));
        }

        let path = PathBuf::from(report.file_path.as_deref().unwrap_or_default());
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Download::File(report, bytes))),
            Err(_) => Ok(Some(Download::Placeholder(report))),
        }
    }

    pub async fn history(&self, owner: Uuid) -> CnResult<Vec<Report>> {
        self.reports.list_for_owner(owner).await
    }

    async fn complete_with_file(&self, report: &Report, bytes: Vec<u8>) -> CnResult<()> {
        let file_name = derive_file_name(&report.company_name, &report.report_type, Utc::now());
        let file_path = self.reports_dir.join(&file_name);

        let write = std::fs::create_dir_all(&self.reports_dir)
            .and_then(|_| std::fs::write(&file_path, &bytes));
        match write {
            Ok(()) => {
                self.reports
                    .mark_completed(report.id, &file_name, &file_path.to_string_lossy())
                    .await?;
                info!(report_id = %report.id, file = %file_path.display(), "report file materialized");
            }
            Err(e) => {
                error!(report_id = %report.id, error = %e, "failed to persist report file");
                self.reports.mark_failed(report.id).await?;
            }
        }
        Ok(())
    }
}

fn execution_id_of(body: &Value) -> String {
    body.get("execution_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// `<sanitized company name>_<timestamp>.pdf`; the aggregate report type
/// always maps to one fixed name.
pub fn derive_file_name(company_name: &str, report_type: &str, now: DateTime<Utc>) -> String {
    if report_type == GENERAL_REPORT_TYPE {
        return GENERAL_REPORT_FILE.to_string();
    }
    format!(
        "{}_{}.pdf",
        sanitize_file_stem(company_name),
        now.format("%Y%m%d%H%M%S")
    )
}

/// Keep alphanumerics, map everything else to `_`, collapsing runs.
fn sanitize_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        "report".to_string()
    } else {
        out
    }
}
