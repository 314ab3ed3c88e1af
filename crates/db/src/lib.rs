//! SQLite persistence for seeded entities.
//!
//! The seeder treats the database as an external collaborator: it only needs
//! natural-key lookups (email, slug, comic id + chapter number), inserts,
//! updates, get-or-create of named lookup rows, and bulk clearing. Schema
//! migrations are embedded and applied on connect.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::{DEFAULT_MAX_CONNECTIONS, Database};
pub use crate::models::{ChapterData, ChapterRow, ComicData, ComicRow, NamedTable, Table, UserRow};
pub use crate::repo::{DRY_RUN_ID, Repository};
