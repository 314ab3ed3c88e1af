//! Seed Error Types
//!
//! Malformed source files and invalid records never surface here: the loader
//! logs and skips them, and the validator returns field errors as data. What
//! remains are per-record upstream failures, which are counted against the
//! record and never stop the run, and configuration failures, which do.

use derive_more::{Display, Error};
use std::time::Duration;

/// A seed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for seed operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An image could not be fetched from its source.
    #[display("could not fetch image: {_0}")]
    Image(#[error(not(source))] String),
    #[display("unrecognized image format: {_0}")]
    UnknownFormat(#[error(not(source))] String),
    /// The upload backend failed.
    #[display("upload storage failed")]
    Storage,
    #[display("database operation failed")]
    Database,
    /// A chapter refers to a comic that neither exists nor was seeded.
    #[display("comic not found: {_0}")]
    MissingParent(#[error(not(source))] String),
    #[display("record took longer than {_0:?}")]
    Timeout(#[error(not(source))] Duration),
    #[display("issue with upload path generation from template")]
    Template,
    #[display("could not write status file")]
    Status,
    /// Fatal: nothing meaningful can be seeded.
    #[display("invalid seed configuration")]
    Configuration,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Image(_) | Self::Storage | Self::Database | Self::Timeout(_))
    }
}
