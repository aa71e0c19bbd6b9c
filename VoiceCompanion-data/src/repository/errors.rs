use std::sync::PoisonError;
use thiserror::Error;
use crate::database::DatabaseError;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Lock error
    #[error("Lock error: {0}")]
    Lock(String),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found error
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Stored value could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl<T> From<PoisonError<T>> for RepositoryError {
    fn from(error: PoisonError<T>) -> Self {
        RepositoryError::Lock(error.to_string())
    }
}

impl RepositoryError {
    /// Map a SQLite unique-constraint failure to `Conflict`
    pub(crate) fn from_insert(error: rusqlite::Error, what: &str) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RepositoryError::Conflict(format!("{} already exists", what))
            }
            _ => RepositoryError::Sqlite(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_poison_error_maps_to_lock() {
        let mutex = Mutex::new(0);
        let _ = std::panic::catch_unwind(|| {
            let _guard = mutex.lock().unwrap();
            panic!("poison");
        });
        let err: RepositoryError = mutex.lock().unwrap_err().into();
        assert!(matches!(err, RepositoryError::Lock(_)));
    }
}
