//! Seed source files.
//!
//! Seed data lives in hand-maintained JSON files. This crate finds them
//! (exact paths or wildcard patterns), reads them, merges their records into
//! one list, and rewrites embedded image paths to match the public asset
//! layout. Nothing here validates record shapes; that is the job of
//! `tankobon-schema`.

pub mod error;
mod load;
mod normalize;
mod pattern;

pub use crate::load::{extract_records, read_json_file, read_multiple_json_files};
pub use crate::normalize::{has_image_extension, looks_like_image_path, normalize_image_path, normalize_image_paths};
pub use crate::pattern::find_json_files;
