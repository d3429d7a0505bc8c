//! De-duplication of concurrent fetches for the same identity key.
//!
//! Overlapping flows (auth-state-change and the initial session check, or
//! two widgets reading the same cart) must not each hit the remote store.
//! The first caller for a key becomes the leader and runs the loader;
//! every concurrent caller for the same key is satisfied by the leader's
//! settled result. The guard also records which keys have a completed
//! successful fetch, so mutations can explicitly `invalidate` them.
//!
//! The guard is keyed state owned by a coordinator - it has no ties to any
//! UI re-render cycle.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::SyncError;

/// Collapses concurrent fetches for the same key into one logical
/// operation with a shared result.
#[derive(Debug)]
pub struct FetchGuard<T> {
    inner: Mutex<GuardState<T>>,
}

#[derive(Debug)]
struct GuardState<T> {
    inflight: HashMap<String, broadcast::Sender<Result<T, SyncError>>>,
    completed: HashSet<String>,
}

/// Removes the in-flight entry if the leader is dropped before settling,
/// so followers observe a closed channel instead of hanging.
struct LeaderSlot<'a, T> {
    guard: &'a FetchGuard<T>,
    key: &'a str,
    settled: bool,
}

impl<T> Drop for LeaderSlot<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.inner.lock().inflight.remove(self.key);
        }
    }
}

impl<T: Clone> FetchGuard<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GuardState {
                inflight: HashMap::new(),
                completed: HashSet::new(),
            }),
        }
    }

    /// Run `loader` for `key`, unless a load for the same key is already
    /// in flight - in that case await and return the in-flight result
    /// without invoking `loader`.
    ///
    /// # Errors
    ///
    /// Returns whatever the (shared) loader returned; if the leading
    /// caller was cancelled before settling, followers get
    /// [`SyncError::Unknown`].
    pub async fn run<F, Fut>(&self, key: &str, loader: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let follower = {
            let mut state = self.inner.lock();
            if let Some(tx) = state.inflight.get(key) {
                Some(tx.subscribe())
            } else {
                let (tx, _) = broadcast::channel(1);
                state.inflight.insert(key.to_owned(), tx);
                None
            }
        };

        if let Some(mut rx) = follower {
            return match rx.recv().await {
                Ok(shared) => shared,
                Err(_) => Err(SyncError::Unknown(
                    "concurrent fetch was cancelled before settling".to_owned(),
                )),
            };
        }

        let mut slot = LeaderSlot {
            guard: self,
            key,
            settled: false,
        };

        let result = loader().await;

        {
            let mut state = self.inner.lock();
            if let Some(tx) = state.inflight.remove(key) {
                // Nobody listening is fine; send only fails then.
                let _ = tx.send(result.clone());
            }
            if result.is_ok() {
                state.completed.insert(key.to_owned());
            } else {
                state.completed.remove(key);
            }
        }
        slot.settled = true;

        result
    }

    /// Whether the last fetch for `key` completed successfully and has not
    /// been invalidated since.
    #[must_use]
    pub fn has_completed(&self, key: &str) -> bool {
        self.inner.lock().completed.contains(key)
    }

    /// Forget the completed marker for `key`. Issued by mutations so the
    /// next read re-fetches.
    pub fn invalidate(&self, key: &str) {
        self.inner.lock().completed.remove(key);
    }
}

impl<T: Clone> Default for FetchGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_load() {
        let guard = FetchGuard::new();
        let calls = AtomicUsize::new(0);

        let load = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec!["line".to_owned()])
        };

        let (a, b) = tokio::join!(guard.run("owner-1", load), guard.run("owner-1", load));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(guard.has_completed("owner-1"));
    }

    #[tokio::test]
    async fn test_distinct_keys_load_independently() {
        let guard = FetchGuard::new();
        let calls = AtomicUsize::new(0);

        let load = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1_u32)
        };

        let (a, b) = tokio::join!(guard.run("owner-1", load), guard.run("owner-2", load));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_shared_but_not_memoized() {
        let guard: FetchGuard<u32> = FetchGuard::new();

        let fail = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(SyncError::Unreachable("down".to_owned()))
        };
        let (a, b) = tokio::join!(guard.run("owner-1", fail), guard.run("owner-1", fail));

        assert_eq!(a, Err(SyncError::Unreachable("down".to_owned())));
        assert_eq!(b, Err(SyncError::Unreachable("down".to_owned())));
        assert!(!guard.has_completed("owner-1"));

        // The next call is free to retry.
        let ok = guard.run("owner-1", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        assert!(guard.has_completed("owner-1"));
    }

    #[tokio::test]
    async fn test_invalidate_clears_completed_marker() {
        let guard = FetchGuard::new();
        guard.run("owner-1", || async { Ok(0_u32) }).await.unwrap();
        assert!(guard.has_completed("owner-1"));

        guard.invalidate("owner-1");
        assert!(!guard.has_completed("owner-1"));
    }

    #[tokio::test]
    async fn test_sequential_runs_each_invoke_loader() {
        let guard = FetchGuard::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let load = || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            };
            guard.run("owner-1", load).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
