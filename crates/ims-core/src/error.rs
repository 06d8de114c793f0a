use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store aborted the transaction because another writer held the
    /// lock. Nothing from the aborted transaction is visible.
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),
}

impl Error {
    /// Returns `true` when the whole transaction may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict(_))
    }

    /// Returns `true` for configuration problems that no retry can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::TransactionConflict(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_maps_to_conflict() {
        let err = Error::from(sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_locked_maps_to_conflict() {
        let err = Error::from(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED));
        assert!(matches!(err, Error::TransactionConflict(_)));
    }

    #[test]
    fn test_other_failures_are_not_retryable() {
        let err = Error::from(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_configuration_is_fatal() {
        let err = Error::Configuration("duplicate rule".to_string());
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
    }
}
