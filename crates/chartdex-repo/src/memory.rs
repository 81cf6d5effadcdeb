//! Shared in-memory cache with per-item expiration
//!
//! Holds parsed indexes across repository instances. The number of items is
//! bounded: storing a new key into a full cache fails instead of evicting.
//! Keys must be tenant-safe, since any holder of the key reads the entry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::{RepoError, Result};

/// Cache lookup outcome, reported to metrics recorders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "cache_hit",
            CacheEvent::Miss => "cache_miss",
        }
    }
}

#[derive(Debug, Clone)]
struct Item<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Item<V> {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe key/value store with TTLs and a maximum item count
#[derive(Debug)]
pub struct MemoryCache<V> {
    items: RwLock<HashMap<String, Item<V>>>,
    max_items: usize,
}

impl<V: Clone> MemoryCache<V> {
    /// Create a cache holding at most `max_items` entries
    pub fn new(max_items: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            max_items,
        }
    }

    /// Store a value, replacing any existing one
    ///
    /// A zero `ttl` never expires. Fails with `CacheFull` when the key is new
    /// and the cache already holds `max_items` entries.
    pub fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if !items.contains_key(key) && items.len() >= self.max_items {
            return Err(RepoError::CacheFull {
                key: key.to_string(),
            });
        }

        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        items.insert(key.to_string(), Item { value, expires_at });
        Ok(())
    }

    /// Get a value unless it is missing or expired
    pub fn get(&self, key: &str) -> Option<V> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let item = items.get(key)?;
        if item.expired(Instant::now()) {
            return None;
        }
        Some(item.value.clone())
    }

    /// Remove a value; missing keys are ignored
    pub fn delete(&self, key: &str) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Remove every item
    pub fn clear(&self) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = HashMap::new();
    }

    /// Number of items, including expired ones not yet removed
    pub fn item_count(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when the key is missing or its item has expired
    pub fn has_expired(&self, key: &str) -> bool {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items
            .get(key)
            .is_none_or(|item| item.expired(Instant::now()))
    }

    /// Drop expired items, returning how many were removed
    pub fn delete_expired(&self) -> usize {
        let now = Instant::now();
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|_, item| !item.expired(now));
        before - items.len()
    }
}
