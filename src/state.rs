//! Shared application state for Axum handlers.
//!
//! The cache store is the one process-wide resource; it is constructed once
//! in `main` and passed in explicitly, so tests can substitute their own
//! [`CacheStore`] implementation.
//!
//! # Thread Safety
//!
//! All state components are wrapped in `Arc` or use atomics, so the state is
//! safe to share across concurrently running handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::cache::CacheStore;
use crate::config::Config;

/// Shared application state for Axum handlers.
///
/// This struct is cloned for each request handler. All internal data
/// is wrapped in `Arc` for efficient sharing.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Backing store of the response cache
    pub store: Arc<dyn CacheStore>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Number of pages rendered by the demo handlers (cache hits do not count)
    renders: Arc<AtomicU64>,
}

impl AppState {
    /// Create new application state from configuration and a cache store.
    pub fn new(config: Config, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            started_at: Instant::now(),
            renders: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count a page render, returning the new total.
    pub fn record_render(&self) -> u64 {
        self.renders.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Total number of pages rendered so far.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
