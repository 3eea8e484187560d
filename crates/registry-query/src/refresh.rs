use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs the stale-while-revalidate background refresh on a bounded worker
/// pool, never via raw unbounded `tokio::spawn` — background work must
/// never grow without bound just because requests keep arriving.
///
/// Concurrency is capped by a semaphore; when every permit is in use, a
/// newly stale hit is served without scheduling its own refresh round (the
/// next stale hit for the same key tries again) rather than queuing
/// unboundedly.
pub struct BackgroundRefresher {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundRefresher {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Schedules `fut` if a worker slot is free; returns `true` if it was
    /// scheduled. Errors inside `fut` are the caller's responsibility to
    /// log — they never propagate back to the foreground response.
    pub fn schedule<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}

        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                tasks.spawn(async move {
                    fut.await;
                    drop(permit);
                });
                true
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("background refresh pool saturated, skipping this round");
                false
            }
        }
    }
}
