use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(Box<csv::Error>),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("Invalid input type: {0}")]
    InvalidInputType(String),

    #[error("Timeout: {action} did not complete within {limit:?}")]
    Timeout { action: String, limit: Duration },

    #[error("No note found with cell id {0}")]
    NotFound(String),

    #[error("Notion API error: {0}")]
    Notion(String),

    #[error("AnkiConnect error: {0}")]
    Anki(String),

    #[error("Cannot create a new level: {0}")]
    GroupCreation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SyncError: {0}")]
    Custom(String),
}

impl SyncError {
    /// Errors that point at the setup rather than at one record.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SyncError::GroupCreation(_) | SyncError::Config(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        SyncError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::Reqwest(Box::new(error))
    }
}

impl From<csv::Error> for SyncError {
    fn from(error: csv::Error) -> Self {
        SyncError::Csv(Box::new(error))
    }
}
