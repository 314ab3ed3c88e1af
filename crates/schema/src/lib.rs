//! Schemas for seed records.
//!
//! Each entity type (user, comic, chapter) has one strict schema: unknown
//! keys are rejected and loosely typed values are coerced (numeric strings to
//! numbers, several date formats to timestamps, bare strings to `{name}` or
//! `{url}` objects). Validation never fails loudly. A record either becomes
//! its canonical type or a [`FieldErrors`] map of dotted field paths to
//! messages.
//!
//! ```
//! use serde_json::json;
//! use tankobon_schema::validate_comics;
//!
//! let records = vec![
//!     json!({"title": "Solo Leveling", "slug": "solo-leveling", "description": "..."}),
//!     json!({"title": "No slug", "description": "..."}),
//! ];
//! let validated = validate_comics(&records);
//! assert_eq!(validated.valid.len(), 1);
//! assert_eq!(validated.invalid[0].index, 1);
//! assert_eq!(validated.invalid[0].errors.get("slug").unwrap(), ["required"]);
//! ```

pub mod error;
mod field;
pub mod models;
mod reader;
mod validate;

pub use crate::field::FieldErrors;
pub use crate::validate::{Invalid, Validated, validate, validate_chapters, validate_comics, validate_users};
