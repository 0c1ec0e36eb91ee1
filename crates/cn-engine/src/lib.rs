pub mod chat;
pub mod config;
pub mod normalize;
pub mod report;
pub mod workflow;

pub use chat::{ChatBackend, ChatError, ChatRequest, ChatService, GraphChatBackend, WebhookChatBackend};
pub use config::EngineConfig;
pub use report::ReportService;
pub use workflow::{WebhookOutcome, WorkflowClient, WorkflowError};
