pub mod rows;
pub mod schema;
pub mod store;

pub use rows::{RunRecord, RunSummary};
pub use store::Store;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record violates a structural constraint. Nothing was written.
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Transient; the caller decides whether to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull,
            ) => StoreError::Unavailable(e.to_string()),
            Some(ErrorCode::ConstraintViolation) => StoreError::Malformed(e.to_string()),
            _ => StoreError::Database(e),
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
