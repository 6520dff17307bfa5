//! Client-side request cache
//!
//! Views read through [`QueryCache::get_or_fetch`]; the live client only
//! knows the [`CacheInvalidator`] seam and marks everything stale when the
//! server signals a bulk change.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::LiveResult;
use crate::types::Filter;

/// Something that can be told "everything you hold may be stale"
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_all(&self);
}

impl<F> CacheInvalidator for F
where
    F: Fn() + Send + Sync,
{
    fn invalidate_all(&self) {
        self()
    }
}

/// Identity of a cached request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Stats,
    Beads(Filter),
    Bead(String),
    Epics,
    Health,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    fresh: bool,
    fetched_at: DateTime<Utc>,
}

/// A cached value as seen by a reader
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub fresh: bool,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory request cache keyed by [`QueryKey`]
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Entry>>,
    /// Bumped on every invalidation; a fetch that straddles one is stored stale
    generation: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the fresh cached value for `key`, or run `fetch` and cache its
    /// result. Fetch errors are passed through and nothing is stored.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> LiveResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = LiveResult<T>>,
    {
        if let Some(value) = self.fresh_value(&key) {
            if let Ok(decoded) = serde_json::from_value(value) {
                return Ok(decoded);
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let value = fetch().await?;
        let json = serde_json::to_value(&value)?;
        let fresh = self.generation.load(Ordering::SeqCst) == generation;

        self.entries.write().insert(
            key,
            Entry {
                value: json,
                fresh,
                fetched_at: Utc::now(),
            },
        );

        Ok(value)
    }

    /// Read whatever is cached, fresh or stale
    pub fn peek<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<Cached<T>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        let value = serde_json::from_value(entry.value.clone()).ok()?;
        Some(Cached {
            value,
            fresh: entry.fresh,
            fetched_at: entry.fetched_at,
        })
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.entries.read().get(key).is_some_and(|e| e.fresh)
    }

    /// Mark a single entry stale
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            entry.fresh = false;
        }
    }

    /// Number of bulk invalidations so far
    pub fn invalidation_count(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn fresh_value(&self, key: &QueryKey) -> Option<Value> {
        self.entries
            .read()
            .get(key)
            .filter(|e| e.fresh)
            .map(|e| e.value.clone())
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for entry in self.entries.write().values_mut() {
            entry.fresh = false;
        }
        tracing::debug!("request cache invalidated");
    }
}
