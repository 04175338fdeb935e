//! Read-through TTL cache keyed by domain.
//!
//! Readers never block each other. A miss starts exactly one load per key;
//! concurrent callers for the same key await that load instead of starting
//! their own. An expired entry still inside the stale window is served as-is
//! while a single background refresh runs. A load every caller has given up
//! on is dropped, not resumed by the next caller.
//!
//! Entries past their stale window are swept out on insert once the map has
//! grown past a threshold, or on demand with [`TtlCache::purge_expired`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

/// Longest time-to-live or stale window honoured; longer ones are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const SWEEP_THRESHOLD: usize = 256;

type LoadFuture<V, E> = BoxFuture<'static, Result<V, Arc<E>>>;
type SharedLoad<V, E> = Shared<LoadFuture<V, E>>;

#[derive(Clone)]
struct TtlEntry<V> {
    value: V,
    expires: Instant,
}

struct Inner<V, E> {
    entries: RwLock<HashMap<String, TtlEntry<V>>>,
    in_flight: Mutex<HashMap<String, WeakShared<LoadFuture<V, E>>>>,
    stale_window: Duration,
    sweep_at: AtomicUsize,
}

impl<V, E> Inner<V, E> {
    fn store(&self, key: String, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires = deadline_after(now, ttl);
        let mut entries = self.entries.write();
        if entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            let before = entries.len();
            entries.retain(|_, entry| !self.is_dead(entry, now));
            tracing::trace!(evicted = before - entries.len(), "cache sweep");
            self.sweep_at
                .store((entries.len() * 2).max(SWEEP_THRESHOLD), Ordering::Relaxed);
        }
        entries.insert(key, TtlEntry { value, expires });
    }

    fn is_dead(&self, entry: &TtlEntry<V>, now: Instant) -> bool {
        deadline_after(entry.expires, self.stale_window) <= now
    }
}

fn deadline_after(from: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(MAX_TTL);
    from.checked_add(ttl).unwrap_or(from)
}

/// Failed loads are handed to every waiter and never stored.
pub struct TtlCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for TtlCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> TtlCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(stale_window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                stale_window: stale_window.min(MAX_TTL),
                sweep_at: AtomicUsize::new(SWEEP_THRESHOLD),
            }),
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.inner.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.expires > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Returns the cached value or runs `load`, sharing one in-flight load
    /// among all concurrent callers. `load` yields the value together with
    /// the time-to-live it should be cached for.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Duration), E>> + Send + 'static,
    {
        let now = Instant::now();
        let cached = self.inner.entries.read().get(key).cloned();
        if let Some(entry) = cached {
            if entry.expires > now {
                return Ok(entry.value);
            }
            if !self.inner.is_dead(&entry, now) {
                let refresh = self.start_load(key, load);
                tokio::spawn(refresh.map(|_| ()));
                return Ok(entry.value);
            }
        }
        self.start_load(key, load).await
    }

    /// A `ttl` above [`MAX_TTL`] is clamped.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.store(key.into(), value, ttl);
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    /// Drops every entry past its stale window and returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.inner.is_dead(entry, now));
        self.inner
            .in_flight
            .lock()
            .retain(|_, pending| pending.upgrade().is_some());
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_load<F, Fut>(&self, key: &str, load: F) -> SharedLoad<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Duration), E>> + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(pending) = in_flight.get(key).and_then(WeakShared::upgrade) {
            return pending;
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let pending = load();
        let shared = async move {
            let outcome = match pending.await {
                Ok((value, ttl)) => {
                    inner.store(owned_key.clone(), value.clone(), ttl);
                    Ok(value)
                }
                Err(err) => Err(Arc::new(err)),
            };
            inner.in_flight.lock().remove(&owned_key);
            outcome
        }
        .boxed()
        .shared();

        match shared.downgrade() {
            Some(weak) => {
                in_flight.insert(key.to_string(), weak);
            }
            None => {
                in_flight.remove(key);
            }
        }
        shared
    }
}
