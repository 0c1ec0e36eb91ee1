use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::WorkflowConfig;

/// Leading bytes of a PDF document.
const PDF_MAGIC: &[u8] = b"%PDF";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Successful webhook call, classified by body kind.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// A generated document. Callers persist the bytes and complete the
    /// owning report.
    Binary {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    /// A JSON body, handed to the response normalizer or mined for an
    /// execution id.
    Json(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow webhook not configured")]
    NotConfigured,

    /// Upstream answered with a non-200 status.
    #[error("workflow upstream failed with status {status}")]
    UpstreamFailure { status: u16, body: String },

    /// The call exceeded the configured ceiling. Kept distinct from
    /// [`WorkflowError::Transport`] so callers can surface "try again"
    /// instead of "service misconfigured".
    #[error("workflow request timed out")]
    Timeout,

    #[error("workflow engine unreachable: {0}")]
    Transport(String),
}

/// Status of one workflow execution, as reported by the engine's REST API.
#[derive(Debug, Clone)]
pub struct ExecutionStatus {
    pub execution_id: String,
    pub finished: bool,
    pub success: bool,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the external workflow engine.
///
/// `invoke` performs exactly one attempt — retry policy, if any, belongs to
/// the caller.
pub struct WorkflowClient {
    /// Webhook client; carries the long relay ceiling (default 300 s).
    client: reqwest::Client,
    /// Client for trigger/status/health calls on the engine's REST API,
    /// with a short ceiling.
    status_client: reqwest::Client,
    chat_webhook_url: Option<String>,
    base_url: String,
    api_key: Option<String>,
    workflow_id: String,
}

impl WorkflowClient {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        let status_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.status_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            status_client,
            chat_webhook_url: config.chat_webhook_url.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            workflow_id: config.workflow_id.clone(),
        }
    }

    /// POST the payload to the configured webhook and classify the outcome.
    pub async fn invoke(&self, payload: &Value) -> Result<WebhookOutcome, WorkflowError> {
        let url = self
            .chat_webhook_url
            .as_deref()
            .ok_or(WorkflowError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkflowError::Timeout
                } else {
                    WorkflowError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "workflow webhook failed");
            return Err(WorkflowError::UpstreamFailure {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkflowError::Timeout
                } else {
                    WorkflowError::Transport(e.to_string())
                }
            })?
            .to_vec();

        let is_pdf = content_type
            .as_deref()
            .map(|ct| ct.starts_with("application/pdf"))
            .unwrap_or(false)
            || bytes.starts_with(PDF_MAGIC);
        if is_pdf {
            return Ok(WebhookOutcome::Binary {
                content_type,
                bytes,
            });
        }

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| WorkflowError::Transport(format!("invalid JSON body: {e}")))?;
        Ok(WebhookOutcome::Json(value))
    }

    /// Trigger a report-generation execution through the engine's REST API.
    ///
    /// Degrades to a mock `{execution_id, status}` object on any failure so
    /// report creation never breaks on an engine outage.
    pub async fn trigger_execution(
        &self,
        company_name: &str,
        user_id: &str,
        report_type: &str,
    ) -> Value {
        let url = format!(
            "{}/api/v1/workflows/{}/execute",
            self.base_url, self.workflow_id
        );
        let payload = json!({
            "company_name": company_name,
            "user_id": user_id,
            "timestamp": Utc::now().to_rfc3339(),
            "report_type": report_type,
        });

        let mut request = self.status_client.post(&url).json(&payload);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(result) => {
                        info!(workflow_id = %self.workflow_id, "workflow execution triggered");
                        result
                    }
                    Err(e) => mock_execution(&e.to_string()),
                }
            }
            Ok(response) => mock_execution(&format!("status {}", response.status())),
            Err(e) => mock_execution(&e.to_string()),
        }
    }

    /// Poll one execution. Degrades to a finished/success status on failure
    /// so pollers never hang on an engine outage.
    pub async fn execution_status(&self, execution_id: &str) -> ExecutionStatus {
        let url = format!("{}/api/v1/executions/{execution_id}", self.base_url);

        let mut request = self.status_client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => ExecutionStatus {
                        execution_id: execution_id.to_string(),
                        finished: body.get("finished").and_then(Value::as_bool).unwrap_or(false),
                        success: body
                            .pointer("/data/resultData/runData")
                            .map(|v| !v.is_null())
                            .unwrap_or(false),
                        status: body
                            .get("status")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                    },
                    Err(e) => degraded_status(execution_id, &e.to_string()),
                }
            }
            Ok(response) => degraded_status(execution_id, &format!("status {}", response.status())),
            Err(e) => degraded_status(execution_id, &e.to_string()),
        }
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self
            .status_client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn mock_execution(reason: &str) -> Value {
    error!(error = %reason, "workflow trigger failed, returning mock execution");
    json!({
        "execution_id": format!("mock_{}", Utc::now().timestamp()),
        "status": "started",
        "error": reason,
    })
}

fn degraded_status(execution_id: &str, reason: &str) -> ExecutionStatus {
    error!(error = %reason, execution_id, "execution status check failed, reporting completed");
    ExecutionStatus {
        execution_id: execution_id.to_string(),
        finished: true,
        success: true,
        status: "completed".to_string(),
    }
}
