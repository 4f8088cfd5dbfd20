use thiserror::Error;

use crate::article::{ArticleId, ArticleStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article {0} not found")]
    NotFound(ArticleId),
    #[error("article {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: ArticleId,
        expected: u64,
        actual: u64,
    },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("article {0} not found")]
    NotFound(ArticleId),
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(StoreError),
}

impl WorkflowError {
    pub(crate) fn not_allowed(msg: impl Into<String>) -> Self {
        Self::NotAllowed(msg.into())
    }

    pub(crate) fn transition(from: ArticleStatus, action: &str) -> Self {
        Self::InvalidState(format!("cannot {action} an article in status {from}"))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("background job failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown time zone `{0}`")]
    InvalidTimeZone(String),
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("platform must not be blank")]
    BlankPlatform,
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    Date(String),
    #[error("invalid time `{0}`, expected HH:mm")]
    Time(String),
    #[error("{0} does not exist in time zone {1}")]
    Nonexistent(String, String),
}
