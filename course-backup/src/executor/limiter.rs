//! Bounded-parallelism primitive.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Runs deferred units of work with at most `capacity` in flight.
///
/// Units are admitted in submission order: a permit is taken before the
/// unit is spawned, so a later unit can never start ahead of an earlier one.
/// Started units always run to completion.
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently holding a slot.
    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Run every unit and wait for all of them.
    ///
    /// Outputs come back in submission order. A panicking unit shows up as a
    /// `JoinError` and does not affect the others.
    pub async fn run_all<I, Fut, T>(&self, units: I) -> Vec<Result<T, JoinError>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::new();

        for unit in units {
            // The semaphore is private and never closed, so this only waits.
            let permit = self.semaphore.clone().acquire_owned().await.ok();
            handles.push(tokio::spawn(async move {
                let output = unit.await;
                drop(permit);
                output
            }));
        }

        let mut outputs = Vec::with_capacity(handles.len());
        for handle in handles {
            outputs.push(handle.await);
        }
        outputs
    }
}
