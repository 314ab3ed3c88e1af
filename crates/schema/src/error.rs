//! Schema Error Types
//!
//! Malformed records are *not* errors in this crate: they are reported as
//! [`FieldErrors`](crate::FieldErrors) data. These kinds only cover parsing
//! a single enumerated value outside of record validation.

use derive_more::{Display, Error};

/// A schema error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value is not one of the accepted variants.
    #[display("unknown {field}: {value}")]
    UnknownValue {
        field: &'static str,
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Parsing is deterministic.
        false
    }
}
