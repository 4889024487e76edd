use thiserror::Error;

/// Every failure a session or backend reports.
#[derive(Debug, Error)]
pub enum SqlSessionError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error ({code}): {message}")]
    QueryError { code: i32, message: String },

    #[error("Missing parameter :{0}")]
    MissingParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reentrant cursor: {0}")]
    ReentrantCursor(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SqlSessionError {
    /// Build a [`SqlSessionError::QueryError`] from a backend code and message.
    #[must_use]
    pub fn query(code: i32, message: impl Into<String>) -> Self {
        SqlSessionError::QueryError {
            code,
            message: message.into(),
        }
    }

    /// Backend error code, when the error came from the backend.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            SqlSessionError::QueryError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SqlSessionError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => SqlSessionError::QueryError {
                code: failure.extended_code,
                message: message.unwrap_or_else(|| failure.to_string()),
            },
            other => SqlSessionError::QueryError {
                code: -1,
                message: other.to_string(),
            },
        }
    }
}

/// Convenience alias for results carrying [`SqlSessionError`].
pub type Result<T> = std::result::Result<T, SqlSessionError>;
