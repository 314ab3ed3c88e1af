//! Configuration Error Types
//!
//! Every error in this crate is fatal to a seed run: there is nothing
//! meaningful to seed without a valid configuration.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Settings could not be merged or deserialized.
    #[display("invalid configuration")]
    Load,
    #[display("configuration file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    #[display("unsupported configuration file format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    #[display("unknown upload provider: {_0}")]
    UnknownProvider(#[error(not(source))] String),
    #[display("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
