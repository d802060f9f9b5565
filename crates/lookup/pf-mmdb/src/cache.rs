//! Per-client LRU cache for lookup results.

use lru::LruCache;
use parking_lot::Mutex;
use pf_types::LookupValue;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Thread-safe LRU cache of lookup results keyed by address.
///
/// Misses (`None`) are cached as well: a client's database never changes, so
/// an uncovered address stays uncovered for the client's lifetime.
pub struct ResultCache {
    /// The cache itself, protected by a Mutex (LRU reads reorder entries).
    entries: Mutex<LruCache<IpAddr, Option<LookupValue>>>,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a cached result.
    ///
    /// The outer `Option` is "cached or not", the inner one is the result.
    pub fn get(&self, addr: &IpAddr) -> Option<Option<LookupValue>> {
        let cached = self.entries.lock().get(addr).cloned();
        match cached {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(addr = %addr, "Cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        cached
    }

    /// Insert a result, evicting the least recently used entry when full.
    pub fn insert(&self, addr: IpAddr, result: Option<LookupValue>) {
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(addr, result) {
            if evicted != addr {
                trace!(addr = %evicted, "Evicted cache entry");
            }
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Get the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that had to go to the database.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
