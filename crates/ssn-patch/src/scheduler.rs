//! Bounded-concurrency execution of independent work units

use crate::error::{PatchError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag that stops further units from being started
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Run `units` with at most `limit` of them in flight
///
/// Units are created lazily: a unit's future is only built once a slot is
/// free. Results are returned in submission order. The first failing unit
/// decides the outcome; from then on nothing new is started and units still
/// in flight are dropped without their results being observed. A cancelled
/// `token` stops dispatch the same way and yields [`PatchError::Cancelled`].
pub async fn run_bounded<T, I, F, Fut>(
    units: I,
    limit: usize,
    token: &CancellationToken,
) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let limit = limit.max(1);
    let mut pending = units.into_iter().enumerate().peekable();
    let mut running = FuturesUnordered::new();
    let mut results: Vec<Option<T>> = Vec::new();

    loop {
        while running.len() < limit && !token.is_cancelled() {
            let Some((index, unit)) = pending.next() else {
                break;
            };
            results.push(None);
            let future = unit();
            running.push(async move { (index, future.await) });
        }

        match running.next().await {
            Some((index, Ok(value))) => results[index] = Some(value),
            Some((index, Err(error))) => {
                tracing::debug!(unit = index, error = %error, "work unit failed, stopping dispatch");
                return Err(error);
            }
            None => break,
        }
    }

    if pending.peek().is_some() {
        return Err(PatchError::Cancelled);
    }
    results
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(PatchError::Cancelled)
}
