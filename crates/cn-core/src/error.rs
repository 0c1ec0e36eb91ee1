use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CnError {
    #[error("report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("no conversation in the given window")]
    ConversationNotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CnResult<T> = Result<T, CnError>;
