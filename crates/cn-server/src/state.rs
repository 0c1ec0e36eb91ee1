use std::path::{Path, PathBuf};
use std::sync::Arc;

use cn_core::{CnError, CnResult, CompanyGraph, ConversationStore, ReportStore, UserStore};
use cn_engine::config::ChatBackendKind;
use cn_engine::{
    ChatBackend, ChatService, EngineConfig, GraphChatBackend, ReportService, WebhookChatBackend,
    WorkflowClient,
};
use cn_graph::GraphGateway;
use cn_storage::{SqliteConversationStore, SqliteDb, SqliteReportStore, SqliteUserStore};

/// Shared application state, constructed once at startup and injected into
/// every handler. No ambient globals.
pub struct AppState {
    pub config: EngineConfig,
    pub conversations: Arc<dyn ConversationStore>,
    pub reports: Arc<dyn ReportStore>,
    pub users: Arc<dyn UserStore>,
    pub graph: Arc<dyn CompanyGraph>,
    pub workflow: Arc<WorkflowClient>,
    pub chat: ChatService,
    pub report_service: ReportService,
}

impl AppState {
    pub fn init(config: EngineConfig) -> CnResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| CnError::Config(format!("create data dir {}: {e}", config.data_dir)))?;
        let db_path = PathBuf::from(&config.data_dir).join("cornet.db");
        let db = Arc::new(SqliteDb::open(&db_path)?);

        Self::with_db(config, db)
    }

    /// Wire the state over an already-open database (tests use an in-memory
    /// one).
    pub fn with_db(config: EngineConfig, db: Arc<SqliteDb>) -> CnResult<Self> {
        let conversations: Arc<dyn ConversationStore> =
            Arc::new(SqliteConversationStore::new(Arc::clone(&db)));
        let reports: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::new(Arc::clone(&db)));
        let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db));

        let graph: Arc<dyn CompanyGraph> = Arc::new(GraphGateway::open(
            config.graph.db_path.as_deref().map(Path::new),
        ));
        let workflow = Arc::new(WorkflowClient::from_config(&config.workflow));

        let backend: Arc<dyn ChatBackend> = match config.chat.backend {
            ChatBackendKind::Webhook => Arc::new(WebhookChatBackend::new(Arc::clone(&workflow))),
            ChatBackendKind::Graph => Arc::new(GraphChatBackend::new(Arc::clone(&graph))),
        };
        let chat = ChatService::new(Arc::clone(&conversations), backend);
        let report_service = ReportService::new(
            Arc::clone(&reports),
            Arc::clone(&workflow),
            config.data_dir.clone(),
        );

        Ok(Self {
            config,
            conversations,
            reports,
            users,
            graph,
            workflow,
            chat,
            report_service,
        })
    }
}
