//! Sequential batches, concurrent windows.
//!
//! Items are split into consecutive batches of `batch_size`. Each batch is
//! split again into windows of `concurrency` items which are awaited together
//! with [`join_all`]. Every item future resolves to a `Result`, so a failing
//! item never cancels the others in its window. Batch `N + 1` only starts
//! once every item of batch `N` has settled, which caps the number of
//! in-flight operations at `concurrency` at any instant.

use crate::Timed;
use futures::future::join_all;
use std::future::Future;
use std::time::{Duration, Instant};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 5;

type BatchHook<'h, R> = Box<dyn FnMut(&[R], usize) + Send + 'h>;
type ErrorHook<'h, T, E> = Box<dyn FnMut(&E, &T) + Send + 'h>;

/// The settled outcome of every item handed to [`BatchProcessor::process`],
/// correlated to the item's index in the original input.
///
/// Outcomes are stored in input order regardless of the order in which the
/// items completed.
#[derive(Debug)]
pub struct BatchResult<R, E> {
    outcomes: Vec<(usize, Result<R, E>)>,
}
impl<R, E> Default for BatchResult<R, E> {
    fn default() -> Self {
        Self { outcomes: Vec::new() }
    }
}
impl<R, E> BatchResult<R, E> {
    /// Total number of settled items (successes and failures).
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Every outcome as `(index, result)`, in input order.
    pub fn outcomes(&self) -> &[(usize, Result<R, E>)] {
        &self.outcomes
    }

    /// Successful outputs, in input order.
    pub fn successes(&self) -> impl Iterator<Item = &R> {
        self.outcomes.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    /// Failed items as `(index, error)`, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &E)> {
        self.outcomes.iter().filter_map(|(i, r)| r.as_ref().err().map(|e| (*i, e)))
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// Consume the result, keeping only the successful outputs (in input order).
    pub fn into_successes(self) -> Vec<R> {
        self.outcomes.into_iter().filter_map(|(_, r)| r.ok()).collect()
    }

    pub fn into_outcomes(self) -> Vec<(usize, Result<R, E>)> {
        self.outcomes
    }
}

/// Concurrency-bounded executor over a list of items.
///
/// Holds no state between calls other than its configuration and hooks; a
/// single processor may be reused for several inputs.
///
/// # Examples
///
/// ```
/// use tankobon_asyncutils::BatchProcessor;
///
/// # futures::executor::block_on(async {
/// let items = vec![1, 2, 3, 4, 5];
/// let mut processor = BatchProcessor::new().batch_size(2).concurrency(2);
/// let result = processor
///     .process(&items, |item, _index| async move {
///         if *item == 3 { Err("three is right out") } else { Ok(item * 10) }
///     })
///     .await;
/// assert_eq!(result.into_successes(), vec![10, 20, 40, 50]);
/// # });
/// ```
pub struct BatchProcessor<'h, T, R, E> {
    batch_size: usize,
    concurrency: usize,
    on_batch_complete: Option<BatchHook<'h, R>>,
    on_error: Option<ErrorHook<'h, T, E>>,
}
impl<T, R, E> Default for BatchProcessor<'_, T, R, E> {
    fn default() -> Self {
        Self::new()
    }
}
impl<'h, T, R, E> BatchProcessor<'h, T, R, E> {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            on_batch_complete: None,
            on_error: None,
        }
    }

    /// Number of items per sequential batch. Zero is treated as one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Maximum number of items in flight at once. Zero is treated as one.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Called after every batch has fully settled with that batch's
    /// successful outputs (in input order) and the zero-based batch index.
    pub fn on_batch_complete(mut self, hook: impl FnMut(&[R], usize) + Send + 'h) -> Self {
        self.on_batch_complete = Some(Box::new(hook));
        self
    }

    /// Called once per failed item, in input order, as soon as the window
    /// containing that item has settled.
    pub fn on_error(mut self, hook: impl FnMut(&E, &T) + Send + 'h) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Drive `f` over every item, returning the settled outcome of each one.
    ///
    /// Never fails as a whole: per-item errors are reported through the
    /// `on_error` hook and kept in the returned [`BatchResult`].
    pub async fn process<'a, F, Fut>(&mut self, items: &'a [T], f: F) -> BatchResult<R, E>
    where
        F: Fn(&'a T, usize) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut result = BatchResult { outcomes: Vec::with_capacity(items.len()) };
        let batch_count = items.len().div_ceil(self.batch_size);
        for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let started = Instant::now();
            let mut slowest = Duration::ZERO;
            let mut completed: Vec<(usize, R)> = Vec::with_capacity(batch.len());
            let mut failed = 0usize;

            for (window_index, window) in batch.chunks(self.concurrency).enumerate() {
                let start = offset + window_index * self.concurrency;
                let settled = join_all(window.iter().enumerate().map(|(i, item)| Timed::new(f(item, start + i)))).await;
                for (i, (outcome, elapsed)) in settled.into_iter().enumerate() {
                    slowest = slowest.max(elapsed);
                    let index = start + i;
                    match outcome {
                        Ok(output) => completed.push((index, output)),
                        Err(error) => {
                            if let Some(hook) = self.on_error.as_mut() {
                                hook(&error, &items[index]);
                            }
                            failed += 1;
                            result.outcomes.push((index, Err(error)));
                        },
                    }
                }
            }

            let (indices, outputs): (Vec<usize>, Vec<R>) = completed.into_iter().unzip();
            if let Some(hook) = self.on_batch_complete.as_mut() {
                hook(&outputs, batch_index);
            }
            tracing::debug!(
                batch = batch_index + 1,
                of = batch_count,
                succeeded = outputs.len(),
                failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                slowest_ms = slowest.as_millis() as u64,
                "Batch settled"
            );
            result.outcomes.extend(indices.into_iter().zip(outputs.into_iter().map(Ok)));
            // Failures were pushed as they settled; restore input order for the batch.
            result.outcomes[offset..].sort_by_key(|(index, _)| *index);
        }
        result
    }
}
