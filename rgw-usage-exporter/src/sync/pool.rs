//! Bounded worker pool with per-item retry
//!
//! Generalizes the teacher's `agents::background_worker` pattern — named,
//! tracked, cancellable spawned work on a shared `DashMap` — from "one
//! long-lived named task" to "N short-lived per-item fetches admitted
//! through a semaphore." A failed item after its retries are exhausted
//! never blocks the rest of the cycle; the caller only sees aggregate
//! success/failure counts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::Error;

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run `op` over every item in `items`, admitting at most `width`
/// concurrent in-flight calls, retrying each item up to `attempts` times
/// with a fixed `backoff` delay between attempts.
pub async fn run_pool<T, Op, Fut>(
    items: Vec<T>,
    width: usize,
    attempts: u32,
    backoff: Duration,
    op: Op,
) -> PoolReport
where
    T: Clone + Send + 'static,
    Op: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let op = Arc::new(op);
    let attempts = attempts.max(1);
    let mut set = JoinSet::new();

    for item in items {
        let semaphore = semaphore.clone();
        let op = op.clone();
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("worker pool semaphore never closes");

            let mut last_err = None;
            for attempt in 0..attempts {
                match op(item.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        last_err = Some(e);
                        if attempt + 1 < attempts {
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
            Err(last_err.expect("at least one attempt always runs"))
        });
    }

    let mut report = PoolReport::default();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(Ok(())) => report.succeeded += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                tracing::warn!(error = %e, "worker pool item failed after retries");
            }
            Err(join_err) => {
                report.failed += 1;
                tracing::error!(error = %join_err, "worker pool task panicked");
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn all_items_succeed() {
        let items: Vec<u32> = (0..20).collect();
        let report = run_pool(items, 4, 3, Duration::from_millis(1), |_n| async { Ok(()) }).await;
        assert_eq!(report.succeeded, 20);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn failing_items_never_block_the_rest() {
        let items: Vec<u32> = (0..10).collect();
        let report = run_pool(items, 2, 2, Duration::from_millis(1), |n| async move {
            if n % 3 == 0 {
                Err(Error::Decode(format!("item {n} always fails")))
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(report.succeeded + report.failed, 10);
        assert!(report.failed > 0);
    }

    #[tokio::test]
    async fn retries_up_to_attempt_limit_before_failing() {
        let tries = Arc::new(AtomicUsize::new(0));
        let tries_clone = tries.clone();
        let report = run_pool(vec![1u32], 1, 3, Duration::from_millis(1), move |_n| {
            let tries = tries_clone.clone();
            async move {
                tries.fetch_add(1, Ordering::SeqCst);
                Err(Error::Decode("always fails".into()))
            }
        })
        .await;
        assert_eq!(report.failed, 1);
        assert_eq!(tries.load(Ordering::SeqCst), 3);
    }
}
