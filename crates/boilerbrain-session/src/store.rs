//! Session store: LRU cache in front of a durable backing store.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use boilerbrain_types::{BackingStore, ReadFailurePolicy, StoreError};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::bounded::BoundedCache;
use crate::codec;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::metrics::{SessionMetrics, SessionStats};
use crate::session::{Session, SessionUpdate};
use crate::ttl::ExpiryPolicy;

/// How hard a write tries to reach the backing store before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Await the backing-store write before returning. Failures are still
    /// logged and counted rather than returned.
    Sync,
    /// Spawn the backing-store write and return immediately. Pending writes
    /// can be awaited with [`SessionStore::flush`].
    BestEffort,
}

/// Outcome of a backing-store read.
enum Loaded {
    Found(Session),
    Absent,
    Failed,
}

struct Inner {
    cache: Mutex<BoundedCache<String, Session>>,
    backing: Arc<dyn BackingStore>,
    config: SessionConfig,
    expiry: ExpiryPolicy,
    metrics: SessionMetrics,
    /// Serializes writers per session id.
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Best-effort writes still in flight.
    pending: Mutex<Vec<JoinHandle<()>>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

/// Session store with LRU caching, TTL sweeps and write-through persistence.
///
/// Reads are served from the cache when possible and fall back to the
/// backing store. Writes land in the cache first and are then pushed to the
/// backing store according to the caller's [`Durability`].
///
/// No public method fails. A missing session, an unreachable backing store
/// and a corrupt stored record all yield a usable fresh [`Session`]; write
/// failures leave the cache as the authority. Every such degradation is
/// logged and counted in [`SessionStats`].
///
/// Cloning is cheap and clones share the same cache.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store over the given backing store.
    pub fn new(config: SessionConfig, backing: Arc<dyn BackingStore>) -> Self {
        let inner = Inner {
            cache: Mutex::new(BoundedCache::new(config.max_sessions)),
            backing,
            expiry: ExpiryPolicy::new(config.ttl),
            config,
            metrics: SessionMetrics::default(),
            write_locks: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            cleanup_task: Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Get a session, loading or creating it as needed.
    ///
    /// A cache hit bumps the session's `updated_at`. On a miss the backing
    /// store is consulted; if it has no usable record the caller gets a
    /// fresh empty session.
    pub async fn get_session(&self, id: &str) -> Session {
        if let Some(session) = self.touch_cached(id) {
            trace!(session_id = %id, "Session found in cache");
            SessionMetrics::incr(&self.inner.metrics.cache_hits);
            return session;
        }

        SessionMetrics::incr(&self.inner.metrics.cache_misses);
        debug!(session_id = %id, "Session cache miss, loading from backing store");
        self.load(id).await
    }

    /// Create a session, replacing any cached copy.
    ///
    /// The backing store receives an insert; if that fails the in-memory
    /// session stays authoritative until it is evicted.
    pub async fn create_session(
        &self,
        id: &str,
        init: SessionUpdate,
        durability: Durability,
    ) -> Session {
        let guard = self.write_lock(id).await;

        let mut session = Session::new(id);
        session.apply(init);
        self.cache_put(session.clone());

        debug!(session_id = %id, "Session created");
        self.persist(session.clone(), PersistMode::Insert, durability, guard)
            .await;
        session
    }

    /// Update a session, loading or creating it first.
    ///
    /// History is replaced wholesale when given; boiler info is merged.
    /// Persistence probes the backing store and issues an update or an
    /// insert accordingly.
    pub async fn update_session(
        &self,
        id: &str,
        update: SessionUpdate,
        durability: Durability,
    ) -> Session {
        self.mutate(id, durability, |session| session.apply(update))
            .await
    }

    /// Append a summary annotation to a session.
    pub async fn add_summary(&self, id: &str, summary: &str, durability: Durability) -> Session {
        self.mutate(id, durability, |session| session.push_summary(summary))
            .await
    }

    /// Remove a session from the cache and the backing store.
    ///
    /// Returns whether the backing-store delete succeeded.
    pub async fn delete_session(&self, id: &str) -> bool {
        let _guard = self.write_lock(id).await;
        self.inner.cache.lock().delete(id);

        match self.inner.backing.delete(&self.inner.config.table, id).await {
            Ok(removed) => {
                debug!(session_id = %id, removed, "Session deleted");
                true
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to delete session from backing store");
                false
            }
        }
    }

    /// Drop the cached copy and reload the session from the backing store.
    ///
    /// Used when the cached copy is suspected stale or corrupt. Falls back
    /// to a fresh session if the backing store has nothing usable.
    pub async fn recover_session(&self, id: &str) -> Session {
        let _guard = self.write_lock(id).await;
        if self.inner.cache.lock().delete(id).is_some() {
            debug!(session_id = %id, "Dropped cached session for recovery");
        }
        self.load(id).await
    }

    /// Sweep idle sessions out of the cache.
    ///
    /// Sessions whose `updated_at` is older than the TTL are evicted from
    /// the cache only; their durable records are untouched. Afterwards the
    /// configured maintenance hook, if any, is run on the backing store.
    ///
    /// Returns the number of sessions evicted.
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let expired = {
            let mut cache = self.inner.cache.lock();
            cache.remove_where(|_, session| self.inner.expiry.is_expired(session.updated_at, now))
        };
        let count = expired.len();

        for (id, _) in &expired {
            debug!(session_id = %id, "Cleaning up expired session");
        }
        if count > 0 {
            SessionMetrics::add(&self.inner.metrics.ttl_expirations, count as u64);
            debug!(count, "Cleaned up expired sessions");
        }
        self.prune_write_locks();

        if let Some(hook) = &self.inner.config.maintenance_hook {
            if let Err(e) = self.inner.backing.run_maintenance_hook(hook).await {
                SessionMetrics::incr(&self.inner.metrics.maintenance_failures);
                debug!(hook = %hook, error = %e, "Maintenance hook failed");
            }
        }

        count
    }

    /// Look at a cached session without touching recency or `updated_at`.
    pub fn peek(&self, id: &str) -> Option<Session> {
        self.inner.cache.lock().peek(id).cloned()
    }

    /// Check if a session is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.cache.lock().has(id)
    }

    /// Get the current number of cached sessions.
    pub fn len(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.cache.lock().is_empty()
    }

    /// Get store statistics.
    pub fn stats(&self) -> SessionStats {
        let (size, capacity) = {
            let cache = self.inner.cache.lock();
            (cache.len(), cache.capacity())
        };
        self.inner.metrics.snapshot(size, capacity)
    }

    /// Start the periodic sweep. Calling it again while running is a no-op.
    pub fn start_cleanup_task(&self) {
        let mut slot = self.inner.cleanup_task.lock();
        if slot.is_some() {
            return;
        }

        let period = self
            .inner
            .config
            .effective_cleanup_interval()
            .max(Duration::from_millis(1));
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SessionStore { inner }.cleanup().await;
            }
        }));

        info!(interval_ms = period.as_millis() as u64, "Session cleanup task started");
    }

    /// Wait for every in-flight best-effort write to finish.
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.pending.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background session write panicked");
                }
            }
        }
    }

    /// Stop the sweep task and flush pending writes.
    pub async fn close(&self) {
        let task = self.inner.cleanup_task.lock().take();
        if let Some(task) = task {
            task.abort();
            info!("Session cleanup task stopped");
        }
        self.flush().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn touch_cached(&self, id: &str) -> Option<Session> {
        let mut cache = self.inner.cache.lock();
        cache.get_mut(id).map(|session| {
            session.touch();
            session.clone()
        })
    }

    /// Insert or replace a session in the cache, counting any eviction.
    fn cache_put(&self, session: Session) {
        let evicted = self.inner.cache.lock().set(session.id.clone(), session);
        self.note_eviction(evicted);
    }

    fn note_eviction(&self, evicted: Option<(String, Session)>) {
        if let Some((evicted_id, _)) = evicted {
            SessionMetrics::incr(&self.inner.metrics.lru_evictions);
            debug!(session_id = %evicted_id, "Evicted LRU session to make room");
        }
    }

    /// Cache a loaded session unless another task cached one first.
    fn adopt(&self, session: Session) -> Session {
        let mut cache = self.inner.cache.lock();
        if let Some(existing) = cache.get_mut(&session.id) {
            existing.touch();
            return existing.clone();
        }
        let evicted = cache.set(session.id.clone(), session.clone());
        drop(cache);

        self.note_eviction(evicted);
        session
    }

    async fn load(&self, id: &str) -> Session {
        match self.read_backing(id).await {
            Loaded::Found(mut session) => {
                // Stored `updated_at` is the last write, not this access.
                session.touch();
                let session = self.adopt(session);
                debug!(
                    session_id = %id,
                    cache_size = self.len(),
                    "Session loaded from backing store"
                );
                session
            }
            Loaded::Absent => {
                SessionMetrics::incr(&self.inner.metrics.cold_starts);
                self.adopt(Session::new(id))
            }
            Loaded::Failed => match self.inner.config.read_failure_policy {
                ReadFailurePolicy::CacheFresh => self.adopt(Session::new(id)),
                ReadFailurePolicy::RetryNextAccess => Session::new(id),
            },
        }
    }

    async fn read_backing(&self, id: &str) -> Loaded {
        let record = match self.inner.backing.read(&self.inner.config.table, id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Loaded::Absent,
            Err(StoreError::Malformed(reason)) => {
                SessionMetrics::incr(&self.inner.metrics.decode_failures);
                warn!(session_id = %id, error = %reason, "Stored session is malformed, using fresh session");
                return Loaded::Absent;
            }
            Err(e) => {
                SessionMetrics::incr(&self.inner.metrics.read_failures);
                warn!(session_id = %id, error = %e, "Backing store read failed, using fresh session");
                return Loaded::Failed;
            }
        };

        match codec::decode(id, record) {
            Ok(session) => Loaded::Found(session),
            Err(e) => {
                SessionMetrics::incr(&self.inner.metrics.decode_failures);
                warn!(session_id = %id, error = %e, "Stored session is malformed, using fresh session");
                Loaded::Absent
            }
        }
    }

    /// Load, mutate in cache, then persist.
    async fn mutate<F>(&self, id: &str, durability: Durability, f: F) -> Session
    where
        F: FnOnce(&mut Session),
    {
        let guard = self.write_lock(id).await;
        let base = self.get_session(id).await;

        let (snapshot, evicted) = {
            let mut cache = self.inner.cache.lock();
            match cache.get_mut(id) {
                Some(session) => {
                    f(session);
                    (session.clone(), None)
                }
                None => {
                    // Not cached: the read failed under RetryNextAccess, or
                    // the entry was evicted in between.
                    let mut session = base;
                    f(&mut session);
                    let evicted = cache.set(id.to_string(), session.clone());
                    (session, evicted)
                }
            }
        };
        self.note_eviction(evicted);

        self.persist(snapshot.clone(), PersistMode::Upsert, durability, guard)
            .await;
        snapshot
    }

    async fn persist(
        &self,
        session: Session,
        mode: PersistMode,
        durability: Durability,
        guard: OwnedMutexGuard<()>,
    ) {
        match durability {
            Durability::Sync => {
                self.write_through(&session, mode).await;
                drop(guard);
            }
            Durability::BestEffort => {
                let store = self.clone();
                let handle = tokio::spawn(async move {
                    store.write_through(&session, mode).await;
                    drop(guard);
                });
                let mut pending = self.inner.pending.lock();
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
        }
    }

    async fn write_through(&self, session: &Session, mode: PersistMode) {
        match self.try_write(session, mode).await {
            Ok(()) => {
                SessionMetrics::incr(&self.inner.metrics.persist_successes);
                if let Some(cached) = self.inner.cache.lock().peek_mut(&session.id) {
                    cached.persisted = true;
                }
                trace!(session_id = %session.id, "Session persisted");
            }
            Err(e) => {
                SessionMetrics::incr(&self.inner.metrics.persist_failures);
                warn!(session_id = %session.id, error = %e, "Failed to persist session, keeping cached copy");
            }
        }
    }

    async fn try_write(&self, session: &Session, mode: PersistMode) -> Result<()> {
        let table = &self.inner.config.table;
        let backing = &self.inner.backing;

        let exists = match mode {
            PersistMode::Insert => false,
            PersistMode::Upsert => backing.exists(table, &session.id).await?,
        };

        if exists {
            backing
                .update(table, &session.id, codec::encode_changes(session)?)
                .await
                .map_err(SessionError::from)
        } else {
            backing
                .insert(table, &session.id, codec::encode(session)?)
                .await
                .map_err(SessionError::from)
        }
    }

    async fn write_lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.write_locks.lock();
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget write locks nobody is holding or waiting on.
    fn prune_write_locks(&self) {
        self.inner
            .write_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[derive(Debug, Clone, Copy)]
enum PersistMode {
    /// Plain insert.
    Insert,
    /// Probe for existence, then update or insert.
    Upsert,
}
