//! Bounded TTL cache.
//!
//! Capacity and TTL are fixed at construction. Expired entries are never
//! returned; eviction runs on insert once the cache is over capacity
//! (expired entries first, then oldest insertions). Time comes from a
//! [`Clock`] so expiry can be tested without sleeping.

use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Concurrent map with per-entry expiry and a size bound.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            clock,
        }
    }

    /// Fresh value for `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if !self.is_expired(&entry, now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert or replace, then enforce the capacity bound.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.entries.insert(key, Entry { value, inserted_at: now });

        if self.entries.len() > self.capacity {
            self.evict(now);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    fn evict(&self, now: Instant) {
        self.entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < self.ttl);

        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }

        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
    }
}
