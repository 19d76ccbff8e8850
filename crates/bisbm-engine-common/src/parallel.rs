//! Bounded-concurrency fan-out over engine calls (§4.5).
//!
//! `ParallelExecutor::map` runs a batch of (blocking) engine invocations with
//! a bounded worker count and a per-call wall-clock timeout, preserving
//! input order in its results. If the returned future is dropped before
//! completion, in-flight tasks are left to finish on their own tokio worker
//! threads; their results are simply never collected.

use crate::error::{EngineError, EngineResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Runs up to `n_workers` engine calls concurrently, each bounded by `timeout`.
pub struct ParallelExecutor {
    n_workers: usize,
}

impl ParallelExecutor {
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
        }
    }

    /// Apply `func` to each of `inputs`, bounded to `n_workers` concurrent
    /// calls, each subject to `timeout`. Results are returned in input order.
    pub async fn map<T, R, F>(&self, timeout: Duration, inputs: Vec<T>, func: F) -> Vec<EngineResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> EngineResult<R> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        let semaphore = Arc::new(Semaphore::new(self.n_workers));
        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            let sem = semaphore.clone();
            let func = func.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .expect("executor semaphore should never be closed");
                tokio::task::spawn_blocking(move || func(input))
                    .await
                    .unwrap_or_else(|_| {
                        Err(EngineError::MalformedOutput(
                            "engine task panicked".to_string(),
                        ))
                    })
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(bound_by_timeout(handle, timeout).await);
        }
        results
    }
}

async fn bound_by_timeout<R>(
    handle: tokio::task::JoinHandle<EngineResult<R>>,
    timeout: Duration,
) -> EngineResult<R>
where
    R: Send + 'static,
{
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(EngineError::MalformedOutput(
            "engine task join error".to_string(),
        )),
        Err(_) => Err(EngineError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn preserves_input_order() {
        let exec = ParallelExecutor::new(4);
        let inputs: Vec<u32> = (0..20).collect();
        let results = exec
            .map(Duration::from_secs(5), inputs.clone(), |x| Ok(x * 2))
            .await;
        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        let expected: Vec<u32> = inputs.iter().map(|x| x * 2).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let exec = ParallelExecutor::new(2);
        let inputs: Vec<usize> = (0..10).collect();
        let in_flight_c = in_flight.clone();
        let max_seen_c = max_seen.clone();
        let results = exec
            .map(Duration::from_secs(5), inputs, move |x| {
                let cur = in_flight_c.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen_c.fetch_max(cur, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(15));
                in_flight_c.fetch_sub(1, Ordering::SeqCst);
                Ok::<usize, EngineError>(x)
            })
            .await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn times_out_slow_calls() {
        let exec = ParallelExecutor::new(2);
        let results = exec
            .map(Duration::from_millis(20), vec![()], |_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok::<(), EngineError>(())
            })
            .await;
        assert!(matches!(results[0], Err(EngineError::Timeout { .. })));
    }
}
