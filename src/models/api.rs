use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Backend name of the cache store
    pub cache_store: String,
    /// Live cache entries, when the store can tell
    pub cache_entries: Option<u64>,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Blog index entry.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
}

/// A rendered demo page.
///
/// `render` increases on every handler run, so a response replayed from
/// the cache keeps the number of the render that produced it.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub title: String,
    pub body: String,
    /// Posts listed on the page (index only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<PostSummary>,
    /// Sequence number of this render
    pub render: u64,
    /// When the page was rendered
    pub rendered_at: DateTime<Utc>,
}

/// Administrative statistics response.
#[derive(Debug, Serialize)]
pub struct AdminStatsResponse {
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Total page renders (cache hits excluded)
    pub renders: u64,
    pub cache_enabled: bool,
    pub cache_store: String,
    pub cache_entries: Option<u64>,
    pub ip_filter_enabled: bool,
}

/// Echo response.
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    /// Request body as received
    pub echo: String,
    /// Body length in bytes
    pub length: usize,
}
