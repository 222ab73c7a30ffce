//! Prometheus metrics for the filtering and caching middleware.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090).
//! Every recording function is a no-op until [`init_metrics`] installs the
//! exporter, so the middleware can record unconditionally.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `edgeguard_cache_lookups_total` - Store lookups (labels: result = hit | miss)
//! - `edgeguard_cache_writes_total` - Responses written to the store
//! - `edgeguard_cache_skips_total` - Misses not written (labels: reason)
//! - `edgeguard_cache_store_errors_total` - Store failures (labels: op = get | set)
//! - `edgeguard_ip_filter_decisions_total` - IP filter outcomes (labels: decision, rule)
//!
//! ## Histograms
//! - `edgeguard_cache_store_duration_seconds` - Store call latency (labels: op)
//!
//! # Usage
//!
//! ```rust,ignore
//! use edgeguard::metrics::{init_metrics, record_cache_lookup};
//!
//! init_metrics("0.0.0.0:9090".parse()?)?;
//! record_cache_lookup(true);
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_LOOKUPS_TOTAL: &str = "edgeguard_cache_lookups_total";
    pub const CACHE_WRITES_TOTAL: &str = "edgeguard_cache_writes_total";
    pub const CACHE_SKIPS_TOTAL: &str = "edgeguard_cache_skips_total";
    pub const CACHE_STORE_ERRORS_TOTAL: &str = "edgeguard_cache_store_errors_total";
    pub const CACHE_STORE_DURATION_SECONDS: &str = "edgeguard_cache_store_duration_seconds";
    pub const IP_FILTER_DECISIONS_TOTAL: &str = "edgeguard_ip_filter_decisions_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message when the exporter cannot be installed (port in use,
/// recorder already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::CACHE_LOOKUPS_TOTAL,
        "Total number of response cache lookups"
    );
    describe_counter!(
        names::CACHE_WRITES_TOTAL,
        "Total number of responses written to the cache"
    );
    describe_counter!(
        names::CACHE_SKIPS_TOTAL,
        "Total number of cache misses whose response was not stored"
    );
    describe_counter!(
        names::CACHE_STORE_ERRORS_TOTAL,
        "Total number of failed cache store operations"
    );
    describe_histogram!(
        names::CACHE_STORE_DURATION_SECONDS,
        "Cache store operation duration in seconds"
    );
    describe_counter!(
        names::IP_FILTER_DECISIONS_TOTAL,
        "Total number of IP filter decisions"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(names::CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
}

/// Record a response written to the cache.
pub fn record_cache_write() {
    counter!(names::CACHE_WRITES_TOTAL).increment(1);
}

/// Record a miss whose response was not stored.
pub fn record_cache_skip(reason: &'static str) {
    counter!(names::CACHE_SKIPS_TOTAL, "reason" => reason).increment(1);
}

/// Record a failed store operation.
pub fn record_cache_store_error(op: &'static str) {
    counter!(names::CACHE_STORE_ERRORS_TOTAL, "op" => op).increment(1);
}

/// Record an IP filter decision.
pub fn record_ip_filter_decision(decision: &'static str, rule: &'static str) {
    counter!(names::IP_FILTER_DECISIONS_TOTAL, "decision" => decision, "rule" => rule)
        .increment(1);
}

// =============================================================================
// Histogram Recording Functions
// =============================================================================

/// Record cache store operation duration.
pub fn record_cache_store_duration(op: &'static str, duration_secs: f64) {
    histogram!(names::CACHE_STORE_DURATION_SECONDS, "op" => op).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed exporter must not panic.

    #[test]
    fn test_record_cache_counters() {
        record_cache_lookup(true);
        record_cache_lookup(false);
        record_cache_write();
        record_cache_skip("status");
        record_cache_store_error("get");
    }

    #[test]
    fn test_record_ip_filter_decision() {
        record_ip_filter_decision("deny", "blacklist");
        record_ip_filter_decision("allow", "none");
    }

    #[test]
    fn test_record_cache_store_duration() {
        record_cache_store_duration("set", 0.002);
    }
}
