//! Cache port with a bounded, TTL-based in-memory implementation.
//!
//! Caches are best-effort: a miss (including an expired entry) must always be
//! resolvable from the authoritative store by the caller.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;

/// Key-value cache with per-entry expiry.
pub trait Cache<V>: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace an entry that expires after `ttl`.
    fn put(&self, key: &str, value: V, ttl: Duration);

    /// Drop an entry if present.
    fn invalidate(&self, key: &str);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// LRU-bounded cache whose entries also expire after their TTL.
pub struct MemoryCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
}

impl<V> MemoryCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held (expired entries included).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry<V>>> {
        // A poisoned cache is still structurally valid.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.lock();
        let expired = match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.pop(key);
        }
        None
    }

    fn put(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock().put(key.to_string(), Entry { value, expires_at });
    }

    fn invalidate(&self, key: &str) {
        self.lock().pop(key);
    }
}
