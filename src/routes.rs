//! Router assembly.
//!
//! Layers wrap the routes in this order, outermost first:
//!
//! | Layer | Effect |
//! |-------|--------|
//! | `SetRequestId` | Assigns `x-request-id` when the client sent none |
//! | `Trace` | One span per request, tagged with the request id |
//! | `PropagateRequestId` | Copies `x-request-id` onto the response |
//! | `IpFilter` | 403 / 302 for refused clients; mounted only with a list configured |
//! | `ResponseCache` | Serves hits, stores misses; store errors become 503 |
//! | `Cors` | Cross-origin headers |
//!
//! CORS sits inside the cache, so its headers are stored with the response
//! and replayed on a hit.
//!
//! Routes: `/health`, `/blog`, `/blog/{slug}`, `/admin/stats`, `POST /echo`
//! and `/teapot` (always 418).

use axum::Router;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{
    IpFilterLayer, ResponseCacheLayer, UuidRequestId, handle_cache_error, request_span,
};
use crate::state::AppState;

/// Mount every route and the middleware stack described in the module docs.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/blog", get(handlers::blog_index))
        .route("/blog/{slug}", get(handlers::blog_post))
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/echo", post(handlers::echo))
        .route("/teapot", get(handlers::teapot));

    // Each `.layer` wraps everything added before it
    router = router.layer(cors_layer(&config.cors_allowed_origins));

    // Response cache (if enabled), with store failures turned into responses
    if config.cache_enabled {
        info!(
            store = state.store.name(),
            ttl_secs = config.cache.ttl.as_secs(),
            methods = ?config.cache.methods,
            "Response cache enabled"
        );
        router = router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_cache_error))
                .layer(ResponseCacheLayer::new(
                    config.cache.clone(),
                    state.store.clone(),
                )),
        );
    } else {
        info!("Response cache disabled (CACHE_ENABLED=false)");
    }

    // IP filter (if any list is configured)
    let ip_filter = IpFilterLayer::new(config.ip_filter.clone());
    if ip_filter.is_enabled() {
        info!(
            blacklist = config.ip_filter.blacklist.len(),
            whitelist = config.ip_filter.whitelist.len(),
            fail_on_invalid_ip = config.ip_filter.fail_on_invalid_ip,
            "IP filter enabled"
        );
        router = router.layer(ip_filter);
    } else {
        info!("IP filter disabled (no IP_FILTER_BLACKLIST or IP_FILTER_WHITELIST set)");
    }

    // Request id and tracing
    router = router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId));

    router.with_state(state)
}

/// `"*"` anywhere in the list allows every origin; otherwise only the
/// listed origins that parse as header values are allowed.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
