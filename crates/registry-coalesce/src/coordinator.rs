//! The in-flight map and the leader/waiter protocol.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Error returned to a waiter when the leader's future was dropped (e.g. its
/// caller was cancelled) before publishing a result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoalesceError<E> {
    #[error("leader fetch failed: {0}")]
    Leader(E),
    #[error("leader was cancelled before publishing a result")]
    LeaderCancelled,
    #[error("failed to receive result from leader")]
    RecvError,
}

struct Slot<R, E> {
    requests: Mutex<HashMap<Arc<str>, broadcast::Sender<Result<R, E>>>>,
}

impl<R, E> Slot<R, E>
where
    R: Clone,
    E: Clone,
{
    fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn try_join(&self, key: &str) -> Option<broadcast::Receiver<Result<R, E>>> {
        let mut requests = self.requests.lock();
        if let Some(sender) = requests.get(key) {
            Some(sender.subscribe())
        } else {
            let (tx, _rx) = broadcast::channel(1);
            requests.insert(Arc::from(key), tx);
            None
        }
    }

    fn complete(&self, key: &str, result: Result<R, E>) {
        let mut requests = self.requests.lock();
        if let Some(sender) = requests.remove(key) {
            let _ = sender.send(result);
        }
    }

    fn cancel(&self, key: &str) {
        self.requests.lock().remove(key);
    }
}

/// Deduplicates concurrent fetches for the same key (C7 — Singleflight
/// Coordinator). The key is an opaque string built by callers as the tuple
/// `(operation class, identifier[, year])`, e.g. `"details:5560001712"` or
/// `"report:5560001712:2023"`, so that distinct operation classes never
/// collide even if the identifier is shared.
pub struct SingleflightCoordinator<R, E> {
    slot: Arc<Slot<R, E>>,
}

impl<R, E> Default for SingleflightCoordinator<R, E>
where
    R: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> Clone for SingleflightCoordinator<R, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<R, E> SingleflightCoordinator<R, E>
where
    R: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot::new()),
        }
    }

    /// Runs `fut` for the first caller with `key`; later callers that arrive
    /// while it is in flight join and receive the same result. The map entry
    /// is removed only after the result is published, so callers that arrive
    /// in the window between completion and removal still observe a
    /// consistent in-flight/published state (either they join the broadcast
    /// before `complete` fires, or they become the leader of a fresh call).
    pub async fn do_once<F>(&self, key: &str, fut: F) -> Result<R, CoalesceError<E>>
    where
        F: Future<Output = Result<R, E>>,
    {
        match self.slot.try_join(key) {
            Some(mut receiver) => {
                #[cfg(feature = "metrics")]
                counter!("singleflight_requests_total", "role" => "waiter").increment(1);
                #[cfg(feature = "tracing")]
                tracing::debug!(key, "joining in-flight singleflight fetch");

                match receiver.recv().await {
                    Ok(result) => result.map_err(CoalesceError::Leader),
                    Err(broadcast::error::RecvError::Closed) => Err(CoalesceError::LeaderCancelled),
                    Err(broadcast::error::RecvError::Lagged(_)) => Err(CoalesceError::RecvError),
                }
            }
            None => {
                #[cfg(feature = "metrics")]
                counter!("singleflight_requests_total", "role" => "leader").increment(1);
                #[cfg(feature = "tracing")]
                tracing::debug!(key, "executing as singleflight leader");

                let mut guard = LeaderGuard {
                    slot: Arc::clone(&self.slot),
                    key: key.to_string(),
                    published: false,
                };
                let result = fut.await;
                guard.publish(result.clone());
                result.map_err(CoalesceError::Leader)
            }
        }
    }
}

/// Ensures the in-flight entry is removed even if `fut` panics or the
/// enclosing task is dropped before completion — late joiners then become
/// the leader of a fresh call instead of waiting forever.
struct LeaderGuard<R, E> {
    slot: Arc<Slot<R, E>>,
    key: String,
    published: bool,
}

impl<R, E> LeaderGuard<R, E>
where
    R: Clone,
    E: Clone,
{
    fn publish(&mut self, result: Result<R, E>) {
        self.slot.complete(&self.key, result);
        self.published = true;
    }
}

impl<R, E> Drop for LeaderGuard<R, E> {
    fn drop(&mut self) {
        if !self.published {
            self.slot.cancel(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn single_caller_executes_and_returns() {
        let coordinator: SingleflightCoordinator<u32, String> = SingleflightCoordinator::new();
        let result = coordinator.do_once("k", async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let coordinator: SingleflightCoordinator<u32, String> = SingleflightCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let coordinator = coordinator.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .do_once("shared-key", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(7u32)
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == 7));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let coordinator: SingleflightCoordinator<u32, String> = SingleflightCoordinator::new();
        let a = coordinator.do_once("a", async { Ok::<_, String>(1) });
        let b = coordinator.do_once("b", async { Ok::<_, String>(2) });
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
    }

    #[tokio::test]
    async fn late_arrival_after_completion_starts_fresh() {
        let coordinator: SingleflightCoordinator<u32, String> = SingleflightCoordinator::new();
        let first = coordinator.do_once("k", async { Ok::<_, String>(1) }).await;
        assert_eq!(first.unwrap(), 1);

        let second = coordinator.do_once("k", async { Ok::<_, String>(2) }).await;
        assert_eq!(second.unwrap(), 2);
    }

    #[tokio::test]
    async fn leader_error_propagates_to_waiters() {
        let coordinator: SingleflightCoordinator<u32, String> = SingleflightCoordinator::new();
        let leader = coordinator.do_once("k", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<u32, _>("boom".to_string())
        });
        let waiter = coordinator.do_once("k", async { Ok::<_, String>(99) });

        let (leader_result, waiter_result) = tokio::join!(leader, waiter);
        assert!(matches!(leader_result, Err(CoalesceError::Leader(ref e)) if e == "boom"));
        assert!(matches!(waiter_result, Err(CoalesceError::Leader(ref e)) if e == "boom"));
    }
}
