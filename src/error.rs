// Sync loop errors

use std::time::Duration;

/// Coarse classification reported in `SyncState::last_error` and to error callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Parse,
    AlreadyRunning,
    UnknownResource,
    InvalidConfig,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Connection/DNS failure or a non-2xx response.
    #[error("network error: {0}")]
    Network(String),
    #[error("fetch timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("parse error: {0}")]
    Parse(String),
    /// Non-fatal: returned by `start()` when the loop is already running.
    #[error("sync loop is already running")]
    AlreadyRunning,
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("invalid resource config: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::Timeout(_) => ErrorKind::Timeout,
            SyncError::Parse(_) => ErrorKind::Parse,
            SyncError::AlreadyRunning => ErrorKind::AlreadyRunning,
            SyncError::UnknownResource(_) => ErrorKind::UnknownResource,
            SyncError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
