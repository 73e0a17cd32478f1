//! Bounded-parallelism fan-out helpers.
//!
//! All in-stage concurrency goes through [`ConcurrencyController`], which
//! enforces a maximum in-flight count and always collects every outcome
//! (success or failure) before the caller merges results. Results come back
//! in input order, so merges are deterministic regardless of completion
//! order.

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Admission control for fan-out over independent external calls.
///
/// Two modes:
/// - [`scatter`](Self::scatter): all inputs submitted, at most
///   `max_in_flight` running at once.
/// - [`scatter_batched`](Self::scatter_batched): inputs split into fixed-size
///   batches; each batch runs fully concurrently, batches run one after
///   another.
#[derive(Clone, Copy, Debug)]
pub struct ConcurrencyController {
    max_in_flight: usize,
}

impl ConcurrencyController {
    /// A zero limit is treated as 1; fan-out is never unbounded.
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Run `op` over every item with at most `max_in_flight` futures live at
    /// once. Output order matches input order.
    pub async fn scatter<T, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        stream::iter(items.into_iter().map(op))
            .buffered(self.max_in_flight)
            .collect()
            .await
    }

    /// Run `op` in sequential batches of `max_in_flight`, each batch fully
    /// concurrent. Output order matches input order.
    pub async fn scatter_batched<T, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        let mut outputs = Vec::with_capacity(items.len());
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let batch: Vec<T> = items.by_ref().take(self.max_in_flight).collect();
            let batch_outputs = join_all(batch.into_iter().map(&op)).await;
            outputs.extend(batch_outputs);
        }
        outputs
    }
}
