//! Response cache building blocks.
//!
//! - [`config`]: immutable `CacheConfig` built from a defaults-then-overrides merge
//! - [`key`]: deterministic cache key derivation
//! - [`store`]: the `CacheStore` trait the middleware reads and writes through
//! - [`memory`]: in-process `MemoryStore` on Moka

pub mod config;
pub mod key;
pub mod memory;
pub mod store;

pub use config::CacheConfig;
pub use key::build_key;
pub use memory::MemoryStore;
pub use store::{CacheEntry, CacheStore, StoreError};
