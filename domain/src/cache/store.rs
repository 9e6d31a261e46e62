//! TTL + LRU query cache with optional fuzzy lookup.
//!
//! Entries expire strictly: an entry is never returned once `now` has passed
//! its `expires_at`. Recency for LRU eviction is tracked with a monotonic
//! access counter, so eviction order does not depend on clock resolution.

use super::key::CacheKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    key: CacheKey,
    value: V,
    created_at: Instant,
    expires_at: Instant,
    last_access: u64,
    hit_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Counters reported by [`QueryCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub fuzzy_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// A fuzzy lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyHit<V> {
    pub value: V,
    pub similarity: f64,
    pub matched_query: String,
}

#[derive(Debug, Clone)]
pub struct QueryCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    capacity: usize,
    default_ttl: Duration,
    tick: u64,
    stats: CacheStats,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            default_ttl,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Exact lookup as of `now`. Expired entries are evicted and reported as a miss.
    pub fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<V> {
        let id = key.to_string();
        let expired = match self.entries.get(&id) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            self.entries.remove(&id);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(&id)?;
        entry.last_access = tick;
        entry.hit_count += 1;
        self.stats.hits += 1;
        Some(entry.value.clone())
    }

    /// Insert with `ttl`, or the default TTL when `None`.
    pub fn set(&mut self, key: CacheKey, value: V, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub fn set_at(&mut self, key: CacheKey, value: V, ttl: Option<Duration>, now: Instant) {
        let id = key.to_string();
        if !self.entries.contains_key(&id) && self.entries.len() >= self.capacity {
            self.prune_expired_at(now);
            if self.entries.len() >= self.capacity {
                self.evict_lru();
            }
        }
        self.tick += 1;
        self.entries.insert(
            id,
            CacheEntry {
                key,
                value,
                created_at: now,
                expires_at: now + ttl.unwrap_or(self.default_ttl),
                last_access: self.tick,
                hit_count: 0,
            },
        );
    }

    pub fn get_fuzzy(&mut self, key: &CacheKey, threshold: f64) -> Option<FuzzyHit<V>> {
        self.get_fuzzy_at(key, threshold, Instant::now())
    }

    /// Best live entry in the same context whose normalized query is at
    /// least `threshold` similar (normalized Levenshtein).
    pub fn get_fuzzy_at(&mut self, key: &CacheKey, threshold: f64, now: Instant) -> Option<FuzzyHit<V>> {
        let best = self
            .entries
            .iter()
            .filter(|(_, e)| e.key.context() == key.context() && !e.is_expired(now))
            .map(|(id, e)| {
                let similarity =
                    strsim::normalized_levenshtein(e.key.normalized_query(), key.normalized_query());
                (id.clone(), similarity)
            })
            .filter(|(_, similarity)| *similarity >= threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(&best.0)?;
        entry.last_access = tick;
        entry.hit_count += 1;
        self.stats.fuzzy_hits += 1;
        Some(FuzzyHit {
            value: entry.value.clone(),
            similarity: best.1,
            matched_query: entry.key.normalized_query().to_string(),
        })
    }

    /// Drop every entry, returning how many were dropped. Used when the
    /// active document set changes.
    pub fn invalidate_all(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn prune_expired(&mut self) -> usize {
        self.prune_expired_at(Instant::now())
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn prune_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }

    /// Age of the entry under `key`, if present.
    pub fn age_of(&self, key: &CacheKey, now: Instant) -> Option<Duration> {
        self.entries
            .get(&key.to_string())
            .map(|e| now.saturating_duration_since(e.created_at))
    }

    /// How many times the entry under `key` has been served.
    pub fn hit_count(&self, key: &CacheKey) -> Option<u64> {
        self.entries.get(&key.to_string()).map(|e| e.hit_count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Clear entries and counters.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
        self.tick = 0;
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
            self.stats.evictions += 1;
        }
    }
}
