//! WorkerPool - Bounded task execution
//!
//! ## Responsibilities
//!
//! - Cap concurrency with a semaphore (one permit per running task)
//! - Batch execution for scans and per-device analysis
//! - Fire-and-forget background tasks owned by the pool
//! - Shutdown: close, wait for a grace period, then abort
//!
//! Closing the pool only stops dispatch. Tasks that already hold a permit
//! run to completion (under their own timeouts).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::{Error, Result};

/// Scan pool upper bound
pub const MAX_SCAN_WORKERS: usize = 64;

/// 8 workers per available core, capped at 64
pub fn default_scan_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 8).min(MAX_SCAN_WORKERS)
}

pub struct WorkerPool {
    name: &'static str,
    size: usize,
    semaphore: Arc<Semaphore>,
    background: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            size,
            semaphore: Arc::new(Semaphore::new(size)),
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Stop dispatching new work
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            tracing::info!(pool = self.name, "Worker pool closed");
            self.semaphore.close();
        }
    }

    /// Run `task` for every item with at most `size` in flight. Results come
    /// back in completion order. If the pool is closed mid-batch the remaining
    /// items are not dispatched and the results so far are returned.
    pub async fn run_batch<T, F, Fut, R>(&self, items: Vec<T>, task: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_closed() {
            return Err(Error::PoolShutdown(self.name.to_string()));
        }

        let total = items.len();
        let mut dispatched = 0usize;
        let mut set = JoinSet::new();

        for item in items {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let fut = task(item);
            set.spawn(async move {
                let result = fut.await;
                drop(permit);
                result
            });
            dispatched += 1;
        }

        if dispatched < total {
            tracing::info!(
                pool = self.name,
                dispatched = dispatched,
                skipped = total - dispatched,
                "Pool closed during batch, remaining items not dispatched"
            );
        }

        let mut results = Vec::with_capacity(dispatched);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(r) => results.push(r),
                Err(e) => tracing::error!(pool = self.name, error = %e, "Pool task failed"),
            }
        }

        Ok(results)
    }

    /// Start a background task on this pool
    pub async fn spawn<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolShutdown(self.name.to_string()))?;

        let mut tasks = self.background.lock().await;
        // Reap finished tasks
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            fut.await;
            drop(permit);
        });
        Ok(())
    }

    /// Close, wait up to `grace` for background tasks, then abort the rest
    pub async fn shutdown(&self, grace: Duration) {
        self.close();

        let mut tasks = self.background.lock().await;
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                pool = self.name,
                remaining = tasks.len(),
                grace_ms = grace.as_millis() as u64,
                "Background tasks still running after grace period, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_scan_workers_capped() {
        let n = default_scan_workers();
        assert!(n >= 8);
        assert!(n <= MAX_SCAN_WORKERS);
    }

    #[tokio::test]
    async fn test_run_batch_bounded() {
        let pool = WorkerPool::new("test", 3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = pool
            .run_batch((0..20).collect(), |i: u32| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let mut sorted = results.clone();
        sorted.sort();
        assert_eq!(sorted[19], 38);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_work() {
        let pool = WorkerPool::new("test", 2);
        pool.close();
        assert!(pool.run_batch(vec![1], |i: i32| async move { i }).await.is_err());
        assert!(pool.spawn(async {}).await.is_err());
    }

    #[tokio::test]
    async fn test_close_mid_batch_keeps_in_flight() {
        let pool = Arc::new(WorkerPool::new("test", 1));
        let closer = Arc::clone(&pool);

        let results = pool
            .run_batch((0..10).collect(), move |i: u32| {
                let closer = Arc::clone(&closer);
                async move {
                    if i == 1 {
                        closer.close();
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    i
                }
            })
            .await
            .unwrap();

        // item 1 closes the pool while it runs; it still completes
        assert!(results.contains(&1));
        assert!(results.len() < 10);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stragglers() {
        let pool = WorkerPool::new("bg", 2);
        let finished = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&finished);
        pool.spawn(async move {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        let f = Arc::clone(&finished);
        pool.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            f.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        let start = std::time::Instant::now();
        pool.shutdown(Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(pool.is_closed());
    }
}
