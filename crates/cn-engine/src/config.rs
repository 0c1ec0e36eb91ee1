use std::path::Path;

use serde::{Deserialize, Serialize};

use cn_core::{CnError, CnResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: String,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: shellexpand("~/.cornet/data"),
            workflow: WorkflowConfig::default(),
            chat: ChatConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file when it exists, then overlay environment
    /// variables. A missing file is not an error — defaults apply.
    pub fn load(path: Option<&Path>) -> CnResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| CnError::Config(format!("read {}: {e}", path.display())))?;
                toml::from_str(&raw)
                    .map_err(|e| CnError::Config(format!("parse {}: {e}", path.display())))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(value) = env_var("CORNET_DATA_DIR") {
            self.data_dir = value;
        }
        if let Some(value) = env_var("CORNET_CHAT_WEBHOOK_URL") {
            self.workflow.chat_webhook_url = Some(value);
        }
        if let Some(value) = env_var("CORNET_WORKFLOW_BASE_URL") {
            self.workflow.base_url = value;
        }
        if let Some(value) = env_var("CORNET_WORKFLOW_API_KEY") {
            self.workflow.api_key = Some(value);
        }
        if let Some(value) = env_var("CORNET_WORKFLOW_ID") {
            self.workflow.workflow_id = value;
        }
        if let Some(value) = env_var("CORNET_WORKFLOW_TIMEOUT_SECS") {
            if let Ok(secs) = value.parse() {
                self.workflow.timeout_secs = secs;
            }
        }
        if let Some(value) = env_var("CORNET_CHAT_BACKEND") {
            if let Ok(backend) = value.parse() {
                self.chat.backend = backend;
            }
        }
        if let Some(value) = env_var("CORNET_GRAPH_DB") {
            self.graph.db_path = Some(value);
        }
    }
}

/// Configuration for the external workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Chat/report webhook endpoint. Unset means the webhook path is not
    /// configured and callers fall back to the execution API.
    pub chat_webhook_url: Option<String>,
    /// Base URL of the workflow engine's own REST API.
    pub base_url: String,
    pub api_key: Option<String>,
    pub workflow_id: String,
    /// Webhook call ceiling. The relay blocks the request for up to this
    /// long.
    pub timeout_secs: u64,
    /// Ceiling for execution-status polls and triggers.
    pub status_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            chat_webhook_url: None,
            base_url: "http://localhost:5678".into(),
            api_key: None,
            workflow_id: "default_workflow".into(),
            timeout_secs: 300,
            status_timeout_secs: 10,
        }
    }
}

/// Which backend answers chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackendKind {
    /// Relay to the external workflow webhook (default).
    Webhook,
    /// Keyword search against the company graph.
    Graph,
}

impl std::str::FromStr for ChatBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(Self::Webhook),
            "graph" => Ok(Self::Graph),
            _ => Err(format!("unknown chat backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub backend: ChatBackendKind,
    /// Page cap for history reads.
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: ChatBackendKind::Webhook,
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Path to the company graph database. Unset runs the gateway degraded.
    pub db_path: Option<String>,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn shellexpand(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => format!("{home}/{rest}"),
            Err(_) => path.to_string(),
        },
        None => path.to_string(),
    }
}
