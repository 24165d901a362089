//! Error types for wf-db

use thiserror::Error;
use wf_core::Retryable;

/// Warehouse operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Warehouse connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Bulk load error (D004)
    #[error("[D004] Bulk load failed: {0}")]
    LoadError(String),

    /// Mutex poisoned (D005)
    #[error("[D005] Warehouse mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D006)
    #[error("[D006] Internal warehouse error: {0}")]
    Internal(String),

    /// Statement timed out (D007)
    #[error("[D007] Warehouse call timed out: {0}")]
    Timeout(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl Retryable for DbError {
    /// Connection and timeout failures may clear up on their own; everything
    /// else fails the same way on every attempt.
    fn is_transient(&self) -> bool {
        matches!(self, DbError::ConnectionError(_) | DbError::Timeout(_))
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the message
        // is the only thing to classify on.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else if msg.contains("timed out") || msg.contains("Timeout") {
            DbError::Timeout(msg)
        } else if msg.contains("HTTP Error") {
            match http_status(&msg) {
                // Client errors (missing key, bad credentials) are permanent
                Some(status) if (400..500).contains(&status) && status != 429 => {
                    DbError::LoadError(msg)
                }
                _ => DbError::ConnectionError(msg),
            }
        } else if msg.contains("Connection error")
            || msg.contains("Could not establish connection")
        {
            DbError::ConnectionError(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}

/// Status code from httpfs messages such as `... (HTTP 404)`
fn http_status(msg: &str) -> Option<u16> {
    msg.match_indices("HTTP ").find_map(|(idx, _)| {
        let digits = msg.get(idx + 5..idx + 8)?;
        if digits.bytes().all(|b| b.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        }
    })
}
