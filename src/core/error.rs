use thiserror::Error;

/// Centralized error types for the application
///
/// All errors are converted into this enum for consistent handling. Uses
/// `thiserror` for automatic conversion and display formatting. Business
/// errors (NotFound, InvalidInput, StateMismatch) are absorbed at the
/// conversation-engine boundary and rendered as localized messages; the
/// transport layer never sees them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced employee/survey/response/question/option is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Recoverable user input problems (empty text, no option selected)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Update inconsistent with the stored conversation state (stale button)
    #[error("State mismatch: {0}")]
    StateMismatch(String),

    /// Transient storage contention that survived all retries
    #[error("Storage contention after {attempts} attempts")]
    StorageContention { attempts: u32 },

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// True for transient SQLite lock/busy conditions worth retrying.
    pub fn is_contention(&self) -> bool {
        match self {
            AppError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            AppError::StorageContention { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_error_is_contention() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(AppError::from(sqlite_err).is_contention());
        assert!(!AppError::NotFound("survey 1".to_string()).is_contention());
    }
}
