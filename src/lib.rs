//! # edgeguard
//!
//! Request filtering and response caching middleware for Axum:
//!
//! - **IP Filter**: IPv4 CIDR blacklist/whitelist answering 403 or a 302 redirect
//! - **Response Cache**: Deterministic keys from path + filtered query,
//!   short-circuit on hit, configurable path/query/method/status eligibility
//! - **Pluggable Store**: [`cache::CacheStore`] trait with an in-memory Moka backend
//! - **Observability**: Request IDs, structured logging, Prometheus counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → IP Filter → Cache → CORS) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Filters (path regexes, query key sets, CIDR ranges)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CacheStore (MemoryStore on Moka, per-entry TTL)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edgeguard::{AppState, Config, build_router};
//! use edgeguard::cache::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(MemoryStore::new(config.cache_max_entries));
//!
//!     let state = AppState::new(config, store);
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Cache responses for ten minutes, but never under `/admin`:
//! ```bash
//! CACHE_TTL=600 CACHE_EXCLUDED_PATH='["^/admin"]' cargo run
//! ```
//!
//! Refuse a private range and redirect it elsewhere:
//! ```bash
//! IP_FILTER_BLACKLIST='["10.0.0.0/8"]' IP_FILTER_BLACKLISTED_REDIRECT=https://example.com cargo run
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use cache::{CacheConfig, CacheEntry, CacheStore, MemoryStore, StoreError};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use filter::FilterSpec;
pub use middleware::{IpFilterConfig, IpFilterLayer, ResponseCacheLayer};
pub use routes::build_router;
pub use state::AppState;
