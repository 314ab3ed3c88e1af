//! Source Error Types
//!
//! Errors here describe a single unreadable source file. Loading many files
//! at once never surfaces them: a broken file is logged and contributes
//! nothing.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("source file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("could not read source file: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// File was read but is not valid JSON (or not the expected shape).
    #[display("malformed JSON in {}", _0.display())]
    Parse(#[error(not(source))] PathBuf),
    #[display("invalid file pattern: {_0}")]
    Pattern(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
