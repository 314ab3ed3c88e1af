//! The seed pipeline.
//!
//! [`Seeder`] loads users, comics and chapters from JSON source files,
//! validates them, and upserts them into the database in bounded batches.
//! Images referenced by comics and chapters go through an [`ImageResolver`]
//! backed by an [`ImageCache`], so each source image is uploaded at most once
//! per run, and identical content is uploaded at most once per destination.
//!
//! A run never fails because of bad data. Malformed files, invalid records
//! and per-record upstream failures are logged and counted in the returned
//! [`SeedSummary`]; only configuration problems (and failing to clear the
//! database when asked to) abort it.
//!
//! [`ImageResolver`]: images::ImageResolver
//! [`ImageCache`]: images::ImageCache

pub mod error;
pub mod images;
mod seeder;
mod stats;
mod status;
mod template;

pub use crate::seeder::{Seeder, backend_from_settings, run_seed};
pub use crate::stats::{Action, EntityStats, ImageTally, SeedSummary, Upserted};
pub use crate::status::{StatusFile, Step};
pub use crate::template::UploadPathGenerator;
