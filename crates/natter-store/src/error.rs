use thiserror::Error;

use crate::validate::SignupError;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A statement expected to touch exactly one row touched none.
    #[error("Record not found")]
    NotFound,

    /// A unique index rejected the write, usually a lost race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Password hashing failure.
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Signup data rejected by validation.
    #[error("Invalid signup: {0}")]
    Signup(#[from] SignupError),

    /// The connection mutex was poisoned by a panicking caller.
    #[error("Database lock poisoned")]
    Poisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map unique-constraint failures to [`StoreError::Conflict`], everything else to `Sqlite`.
pub(crate) fn map_constraint(err: rusqlite::Error, what: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Sqlite(err),
    }
}
