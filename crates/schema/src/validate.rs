//! Partitioning raw records into valid and invalid sets.

use serde_json::Value;
use tracing::instrument;

use crate::field::FieldErrors;
use crate::models::{Chapter, Comic, User};

/// A rejected record: its position in the input and why it was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Invalid {
    pub index: usize,
    pub errors: FieldErrors,
}

/// The outcome of validating a list of raw records.
///
/// Every input record ends up in exactly one of the two lists, each in input
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub valid: Vec<T>,
    pub invalid: Vec<Invalid>,
}
impl<T> Validated<T> {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}
impl<T> Default for Validated<T> {
    fn default() -> Self {
        Self { valid: Vec::new(), invalid: Vec::new() }
    }
}

/// Validate every record with `T`'s schema.
pub fn validate<T>(entity: &'static str, records: &[Value]) -> Validated<T>
where
    T: for<'v> TryFrom<&'v Value, Error = FieldErrors>,
{
    let mut out = Validated::default();
    for (index, record) in records.iter().enumerate() {
        match T::try_from(record) {
            Ok(valid) => out.valid.push(valid),
            Err(errors) => {
                tracing::warn!(entity, index, %errors, "Rejected invalid record");
                out.invalid.push(Invalid { index, errors });
            },
        }
    }
    tracing::info!(entity, valid = out.valid.len(), invalid = out.invalid.len(), "Validated records");
    out
}

#[instrument(skip_all, fields(records = records.len()))]
pub fn validate_users(records: &[Value]) -> Validated<User> {
    validate("user", records)
}

#[instrument(skip_all, fields(records = records.len()))]
pub fn validate_comics(records: &[Value]) -> Validated<Comic> {
    validate("comic", records)
}

#[instrument(skip_all, fields(records = records.len()))]
pub fn validate_chapters(records: &[Value]) -> Validated<Chapter> {
    validate("chapter", records)
}
