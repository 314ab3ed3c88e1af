//! Small async building blocks shared by the seed pipeline.
//!
//! Nothing in here depends on a particular runtime: everything is expressed
//! with [`futures`] combinators so that the caller decides whether it runs on
//! Tokio, a test executor, or something else entirely.
//!
//! - [`BatchProcessor`] splits a list of items into sequential batches and
//!   drives each batch with bounded concurrency, collecting per-item results
//!   without letting one failure cancel its siblings.
//! - [`Timed`] wraps a future and reports how long it took from first poll to
//!   completion.

mod batch;
mod timed;

pub use crate::batch::{BatchProcessor, BatchResult, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
pub use crate::timed::Timed;
