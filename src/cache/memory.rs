//! In-process cache store backed by Moka.
//!
//! Entries are kept as serialized JSON so a hit returns an independent copy
//! and the memory footprint is predictable. Each entry expires after the TTL
//! it was written with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::store::{CacheEntry, CacheStore, StoreError};

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Stored value: the serialized entry plus the TTL it was written with.
#[derive(Clone)]
struct Stored {
    json: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // A full overwrite restarts the clock with the new TTL
        Some(value.ttl)
    }
}

/// Concurrent in-memory [`CacheStore`].
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Stored>,
    max_entries: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` responses.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache, max_entries }
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        match self.cache.get(key).await {
            Some(stored) => Ok(Some(serde_json::from_str(&stored.json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        let json: Arc<str> = serde_json::to_string(&entry)?.into();
        self.cache.insert(key.to_string(), Stored { json, ttl }).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.cache.contains_key(key))
    }

    async fn entry_count(&self) -> Option<u64> {
        // Flush pending inserts/evictions so the count is accurate
        self.cache.run_pending_tasks().await;
        Some(self.cache.entry_count())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("max_entries", &self.max_entries)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
