//! Database Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A unique constraint rejected the write (natural key already taken).
    #[display("conflicting row already exists")]
    Conflict,
    /// A value could not be converted to or from its column type.
    #[display("invalid {_0} data")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY and friends surface as `Database`.
        matches!(self, Self::Database)
    }
}

/// Raise a sqlx error, distinguishing unique-constraint violations.
pub(crate) fn raise<T>(result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    use exn::ResultExt;
    match result {
        Ok(value) => Ok(value),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(sqlx::Error::Database(e)).or_raise(|| ErrorKind::Conflict)
        },
        Err(e) => Err(e).or_raise(|| ErrorKind::Database),
    }
}
