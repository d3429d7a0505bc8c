//! The failover policy, defined once for both domains.
//!
//! A [`SyncCoordinator`] orchestrates every read and mutation of one
//! domain (cart, session/profile): consult the mode latch, try the remote
//! adapter, fall back to the shadow store on infrastructure failure, and
//! invalidate the read cache so subsequent reads reflect the mutation.
//! The cart and session code paths share this policy instead of each
//! re-implementing it.
//!
//! # Concurrency
//!
//! Mutations are serialized per domain by an async mutex, so two
//! read-modify-write decisions never interleave against the same local
//! snapshot. Reads are not serialized against each other; concurrent
//! duplicate fetches collapse into one through the [`FetchGuard`].

use std::sync::Arc;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use farmlink_core::UserId;

use crate::config::CacheConfig;
use crate::error::SyncError;
use crate::guard::FetchGuard;
use crate::latch::ModeLatch;
use crate::notify::{Notice, Notifier};
use crate::store::{KeyedRecordStore, StorageMedium};

/// A record the coordinator can synchronize.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The identifier upserts and removals are keyed by.
    fn record_id(&self) -> &str;
}

/// One mutation against a domain's record collection.
#[derive(Debug, Clone)]
pub enum Change<R> {
    /// Insert or replace the record with the same identifier.
    Upsert(R),
    /// Remove the record with this identifier, if present.
    Remove(String),
    /// Remove the owner's whole collection.
    Clear,
}

/// Orchestrates one domain's reads and mutations across the remote store
/// and the local shadow store.
pub struct SyncCoordinator<R, A> {
    domain: &'static str,
    remote: A,
    shadow: KeyedRecordStore<R>,
    latch: ModeLatch,
    guard: FetchGuard<Vec<R>>,
    cache: Cache<String, Vec<R>>,
    mutation_lock: Mutex<()>,
    notifier: Arc<dyn Notifier>,
}

impl<R, A> SyncCoordinator<R, A>
where
    R: SyncRecord,
    A: crate::remote::RemoteAdapter<R>,
{
    /// Build a coordinator for `domain`, which doubles as the shadow
    /// store's key namespace.
    #[must_use]
    pub fn new(
        domain: &'static str,
        remote: A,
        medium: Arc<dyn StorageMedium>,
        notifier: Arc<dyn Notifier>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            domain,
            remote,
            shadow: KeyedRecordStore::new(medium, domain),
            latch: ModeLatch::new(domain),
            guard: FetchGuard::new(),
            cache: Cache::builder()
                .max_capacity(cache.capacity)
                .time_to_live(cache.ttl)
                .build(),
            mutation_lock: Mutex::new(()),
            notifier,
        }
    }

    /// The domain's mode latch.
    #[must_use]
    pub const fn latch(&self) -> &ModeLatch {
        &self.latch
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read the owner's records through the cache.
    ///
    /// Infrastructure failures are recovered from the shadow store, so
    /// the caller always gets renderable data for them.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unauthorized`] or [`SyncError::Conflict`]
    /// unrecovered; neither touches the latch or the shadow store.
    pub async fn read_all(&self, owner: &UserId) -> Result<Vec<R>, SyncError> {
        let key = owner.as_str();
        if let Some(hit) = self.cache.get(key).await {
            return Ok(hit);
        }

        self.guard.run(key, || self.load(owner)).await
    }

    async fn load(&self, owner: &UserId) -> Result<Vec<R>, SyncError> {
        let key = owner.as_str();

        if self.latch.is_local() {
            let records = self.shadow.read(key);
            self.cache.insert(key.to_owned(), records.clone()).await;
            return Ok(records);
        }

        match self.remote.fetch_all(owner).await {
            Ok(records) => {
                // Mirror the fetch into the shadow store so a later
                // failover serves the last known remote state instead of
                // nothing. Mutations don't mirror; the next successful
                // read does.
                self.shadow.write(key, &records);
                self.cache.insert(key.to_owned(), records.clone()).await;
                Ok(records)
            }
            Err(err) if err.triggers_fallback() => {
                self.enter_local_mode(&err);
                let records = self.shadow.read(key);
                self.cache.insert(key.to_owned(), records.clone()).await;
                Ok(records)
            }
            Err(err) => {
                self.surface(&err);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply one mutation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unauthorized`] or [`SyncError::Conflict`]
    /// with all stores untouched. Infrastructure failures do not error:
    /// the mutation lands in the shadow store instead.
    pub async fn apply(&self, owner: &UserId, change: Change<R>) -> Result<(), SyncError> {
        let _serialized = self.mutation_lock.lock().await;
        self.apply_locked(owner, change).await
    }

    /// Read-modify-write: `decide` sees the owner's current records and
    /// returns the mutation to apply, or `None` for a no-op. The whole
    /// sequence holds the domain's mutation lock.
    ///
    /// # Errors
    ///
    /// As for [`apply`](Self::apply); the snapshot read can also surface
    /// [`SyncError::Unauthorized`].
    pub async fn mutate_with<F>(&self, owner: &UserId, decide: F) -> Result<(), SyncError>
    where
        F: FnOnce(Vec<R>) -> Option<Change<R>> + Send,
    {
        let _serialized = self.mutation_lock.lock().await;

        let current = if self.latch.is_local() {
            self.shadow.read(owner.as_str())
        } else {
            self.read_all(owner).await?
        };

        match decide(current) {
            Some(change) => self.apply_locked(owner, change).await,
            None => Ok(()),
        }
    }

    async fn apply_locked(&self, owner: &UserId, change: Change<R>) -> Result<(), SyncError> {
        if self.latch.is_local() {
            self.apply_to_shadow(owner, &change);
            self.invalidate(owner).await;
            return Ok(());
        }

        let outcome = match &change {
            Change::Upsert(record) => self.remote.upsert(record).await,
            Change::Remove(id) => self.remote.remove_by_id(id).await,
            Change::Clear => self.remote.remove_all_by_owner(owner).await,
        };

        match outcome {
            Ok(()) => {
                // Remote is the source of truth; no local mirror, just
                // drop the stale read state.
                self.invalidate(owner).await;
                Ok(())
            }
            Err(err) if err.triggers_fallback() => {
                self.enter_local_mode(&err);
                self.apply_to_shadow(owner, &change);
                self.invalidate(owner).await;
                Ok(())
            }
            Err(err) => {
                self.surface(&err);
                Err(err)
            }
        }
    }

    fn apply_to_shadow(&self, owner: &UserId, change: &Change<R>) {
        let key = owner.as_str();
        match change {
            Change::Upsert(record) => {
                let mut records = self.shadow.read(key);
                match records
                    .iter_mut()
                    .find(|existing| existing.record_id() == record.record_id())
                {
                    Some(slot) => *slot = record.clone(),
                    None => records.push(record.clone()),
                }
                self.shadow.write(key, &records);
            }
            Change::Remove(id) => {
                let mut records = self.shadow.read(key);
                records.retain(|existing| existing.record_id() != id);
                self.shadow.write(key, &records);
            }
            Change::Clear => self.shadow.clear(key),
        }
    }

    // =========================================================================
    // Cache control
    // =========================================================================

    /// Drop the owner's cached read state so the next read re-fetches.
    pub async fn invalidate(&self, owner: &UserId) {
        self.cache.invalidate(owner.as_str()).await;
        self.guard.invalidate(owner.as_str());
    }

    /// Re-initialize the domain for `owner`: drop cached read state and
    /// return the latch to remote mode. Called on fresh sign-in.
    pub async fn reinitialize(&self, owner: &UserId) {
        self.invalidate(owner).await;
        self.latch.reset();
    }

    /// Destroy the owner's locally held records (shadow store and read
    /// cache) without touching the remote store. Called on sign-out.
    pub async fn purge_local(&self, owner: &UserId) {
        self.shadow.clear(owner.as_str());
        self.invalidate(owner).await;
    }

    fn enter_local_mode(&self, cause: &SyncError) {
        if self.latch.trip() {
            tracing::warn!(
                domain = self.domain,
                cause = %cause,
                "remote store unavailable, serving from local shadow store"
            );
            self.notifier.notify(Notice::offline(self.domain));
        }
    }

    fn surface(&self, err: &SyncError) {
        match err {
            SyncError::Unauthorized(_) => self.notifier.notify(Notice::unauthorized(self.domain)),
            SyncError::Conflict(_) => self.notifier.notify(Notice::conflict(self.domain)),
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::{MemoryNotifier, NoticeKind};
    use crate::remote::RemoteAdapter;
    use crate::store::MemoryMedium;
    use parking_lot::Mutex as SyncMutex;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Row {
        id: String,
        value: u32,
    }

    impl SyncRecord for Row {
        fn record_id(&self) -> &str {
            &self.id
        }
    }

    fn row(id: &str, value: u32) -> Row {
        Row {
            id: id.to_owned(),
            value,
        }
    }

    /// Scripted remote: serves rows from memory until told to fail.
    #[derive(Default)]
    struct ScriptedRemote {
        rows: SyncMutex<Vec<Row>>,
        failure: SyncMutex<Option<SyncError>>,
        fetch_calls: AtomicUsize,
        mutate_calls: AtomicUsize,
    }

    impl ScriptedRemote {
        fn fail_with(&self, err: SyncError) {
            *self.failure.lock() = Some(err);
        }

        fn check(&self) -> Result<(), SyncError> {
            self.failure.lock().clone().map_or(Ok(()), Err)
        }
    }

    impl RemoteAdapter<Row> for &ScriptedRemote {
        async fn fetch_all(&self, _owner: &UserId) -> Result<Vec<Row>, SyncError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.rows.lock().clone())
        }

        async fn upsert(&self, record: &Row) -> Result<(), SyncError> {
            self.mutate_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let mut rows = self.rows.lock();
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => *slot = record.clone(),
                None => rows.push(record.clone()),
            }
            Ok(())
        }

        async fn remove_by_id(&self, id: &str) -> Result<(), SyncError> {
            self.mutate_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.rows.lock().retain(|r| r.id != id);
            Ok(())
        }

        async fn remove_all_by_owner(&self, _owner: &UserId) -> Result<(), SyncError> {
            self.mutate_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.rows.lock().clear();
            Ok(())
        }
    }

    fn coordinator<'a>(
        remote: &'a ScriptedRemote,
        notifier: Arc<MemoryNotifier>,
    ) -> SyncCoordinator<Row, &'a ScriptedRemote> {
        SyncCoordinator::new(
            "cart",
            remote,
            Arc::new(MemoryMedium::new()),
            notifier,
            &CacheConfig::default(),
        )
    }

    fn owner() -> UserId {
        UserId::new("owner-1")
    }

    #[tokio::test]
    async fn test_remote_mutation_invalidates_cache() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        assert!(coordinator.read_all(&owner()).await.unwrap().is_empty());

        coordinator
            .apply(&owner(), Change::Upsert(row("a", 1)))
            .await
            .unwrap();

        // The next read re-fetches and sees the remote write.
        assert_eq!(
            coordinator.read_all(&owner()).await.unwrap(),
            vec![row("a", 1)]
        );
        assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_reads() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        coordinator.read_all(&owner()).await.unwrap();
        coordinator.read_all(&owner()).await.unwrap();
        coordinator.read_all(&owner()).await.unwrap();

        assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_infra_failure_falls_back_and_latches() {
        let remote = ScriptedRemote::default();
        let notifier = MemoryNotifier::new();
        let coordinator = coordinator(&remote, Arc::clone(&notifier));

        remote.fail_with(SyncError::Unreachable("down".to_owned()));

        // The mutation still succeeds, against the shadow store.
        coordinator
            .apply(&owner(), Change::Upsert(row("a", 1)))
            .await
            .unwrap();

        assert!(coordinator.latch().is_local());
        assert_eq!(
            coordinator.read_all(&owner()).await.unwrap(),
            vec![row("a", 1)]
        );

        // Latched: no further remote calls for this domain.
        let mutations_so_far = remote.mutate_calls.load(Ordering::SeqCst);
        let fetches_so_far = remote.fetch_calls.load(Ordering::SeqCst);
        coordinator
            .apply(&owner(), Change::Upsert(row("b", 2)))
            .await
            .unwrap();
        coordinator.invalidate(&owner()).await;
        coordinator.read_all(&owner()).await.unwrap();
        assert_eq!(remote.mutate_calls.load(Ordering::SeqCst), mutations_so_far);
        assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), fetches_so_far);

        // And the offline notice fired exactly once.
        assert_eq!(notifier.count_of(NoticeKind::OfflineFallback), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_propagates_without_fallback() {
        let remote = ScriptedRemote::default();
        let notifier = MemoryNotifier::new();
        let coordinator = coordinator(&remote, Arc::clone(&notifier));

        remote.fail_with(SyncError::Unauthorized("jwt expired".to_owned()));

        let err = coordinator
            .apply(&owner(), Change::Upsert(row("a", 1)))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Unauthorized(_)));
        assert!(!coordinator.latch().is_local());
        assert_eq!(notifier.count_of(NoticeKind::Unauthorized), 1);

        // The shadow store was not touched.
        assert!(coordinator.shadow.read("owner-1").is_empty());
    }

    #[tokio::test]
    async fn test_conflict_propagates_and_leaves_data_unchanged() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        remote.rows.lock().push(row("a", 1));
        remote.fail_with(SyncError::Conflict("stale".to_owned()));

        let err = coordinator
            .apply(&owner(), Change::Upsert(row("a", 9)))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));

        remote.failure.lock().take();
        assert_eq!(
            coordinator.read_all(&owner()).await.unwrap(),
            vec![row("a", 1)]
        );
    }

    #[tokio::test]
    async fn test_mutate_with_sees_serialized_snapshot() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        for _ in 0..3 {
            coordinator
                .mutate_with(&owner(), |rows| {
                    let value = rows.first().map_or(0, |r| r.value);
                    Some(Change::Upsert(row("a", value + 1)))
                })
                .await
                .unwrap();
        }

        assert_eq!(
            coordinator.read_all(&owner()).await.unwrap(),
            vec![row("a", 3)]
        );
    }

    #[tokio::test]
    async fn test_mutate_with_none_is_a_noop() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        coordinator
            .mutate_with(&owner(), |_| None)
            .await
            .unwrap();

        assert_eq!(remote.mutate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reinitialize_returns_to_remote() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        remote.fail_with(SyncError::Unreachable("down".to_owned()));
        coordinator
            .apply(&owner(), Change::Upsert(row("a", 1)))
            .await
            .unwrap();
        assert!(coordinator.latch().is_local());

        remote.failure.lock().take();
        remote.rows.lock().push(row("remote", 7));
        coordinator.reinitialize(&owner()).await;

        assert!(!coordinator.latch().is_local());
        assert_eq!(
            coordinator.read_all(&owner()).await.unwrap(),
            vec![row("remote", 7)]
        );
    }

    #[tokio::test]
    async fn test_clear_in_local_mode_empties_shadow() {
        let remote = ScriptedRemote::default();
        let coordinator = coordinator(&remote, MemoryNotifier::new());

        remote.fail_with(SyncError::Unknown("???".to_owned()));
        coordinator
            .apply(&owner(), Change::Upsert(row("a", 1)))
            .await
            .unwrap();
        coordinator.apply(&owner(), Change::Clear).await.unwrap();

        assert!(coordinator.read_all(&owner()).await.unwrap().is_empty());
    }
}
