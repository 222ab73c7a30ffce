//! Cache store abstraction consumed by the response cache middleware.
//!
//! The middleware holds no locks of its own; every implementation must make
//! `get`, `exists` and `set` individually atomic and must never expose a
//! partially-written entry to concurrent readers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted unit of the response cache.
///
/// Written whole on a cacheable miss and read whole on a hit. Expiry is the
/// store's concern; the entry itself carries no timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: String,
    pub headers: HashMap<String, Vec<String>>,
}

/// Cache store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Key/value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the entry stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Number of live entries, when the backend can tell.
    async fn entry_count(&self) -> Option<u64> {
        None
    }

    /// Short backend name for logs and health output.
    fn name(&self) -> &str;
}
