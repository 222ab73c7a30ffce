//! Response caching middleware.
//!
//! # Request Flow
//!
//! ```text
//! request ──► build key ──► store.get ──hit──► 200 + stored body/headers (next never runs)
//!                               │
//!                              miss
//!                               ▼
//!                          next(request)
//!                               │
//!          status/method ► included path ► excluded path ► included query ► excluded query
//!                               │ (any check fails: response returned uncached)
//!                               ▼
//!                     collect body ──► store.set(key, entry, ttl) ──► response
//! ```
//!
//! Each request performs exactly one store read and at most one store write.
//!
//! # Errors
//!
//! Store failures are never turned into a silent miss. The service error
//! type is [`BoxError`]; mount it behind `HandleErrorLayer` with
//! [`handle_cache_error`] to turn failures into responses.
//!
//! # Response Headers
//!
//! Responses passing through the middleware carry `x-cache: HIT` or
//! `x-cache: MISS`. The marker itself is never stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::Query;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use tower::{BoxError, Layer, Service};
use tracing::{debug, error};

use crate::cache::{CacheConfig, CacheEntry, CacheStore, StoreError, build_key};
use crate::error::AppError;
use crate::filter::query::QueryParams;
use crate::filter::{is_query_excluded, is_query_included, parse_ignored_params, path_matches};
use crate::metrics;

/// Header marking whether a response was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Response cache layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
/// let app = Router::new()
///     .route("/blog", get(blog))
///     .layer(
///         ServiceBuilder::new()
///             .layer(HandleErrorLayer::new(handle_cache_error))
///             .layer(ResponseCacheLayer::new(CacheConfig::default(), store)),
///     );
/// ```
#[derive(Clone)]
pub struct ResponseCacheLayer {
    config: Arc<CacheConfig>,
    store: Arc<dyn CacheStore>,
}

impl ResponseCacheLayer {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

impl<S> Layer<S> for ResponseCacheLayer {
    type Service = ResponseCacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseCacheService {
            inner,
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}

/// Response cache service wrapper.
#[derive(Clone)]
pub struct ResponseCacheService<S> {
    inner: S,
    config: Arc<CacheConfig>,
    store: Arc<dyn CacheStore>,
}

impl<S> Service<Request<Body>> for ResponseCacheService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let params = match Query::<QueryParams>::try_from_uri(req.uri()) {
                Ok(Query(params)) => params,
                Err(e) => {
                    debug!(
                        path = %req.uri().path(),
                        error = %e,
                        "Undecodable query string, bypassing cache"
                    );
                    metrics::record_cache_skip("query_invalid");
                    let response = inner.call(req).await.map_err(Into::<BoxError>::into)?;
                    return Ok(mark_miss(response));
                }
            };

            let path = req.uri().path().to_owned();
            let key = build_key(&path, &params, &config);

            if let Some(entry) = lookup(store.as_ref(), &key).await? {
                debug!(key = %key, "Cache hit");
                metrics::record_cache_lookup(true);
                return Ok(hit_response(entry));
            }
            debug!(key = %key, "Cache miss");
            metrics::record_cache_lookup(false);

            let method = req.method().clone();
            let response = inner.call(req).await.map_err(Into::<BoxError>::into)?;

            if let Some(reason) = skip_reason(&config, response.status(), &method, &path, &params)
            {
                return Ok(skip(response, &key, reason));
            }

            let (parts, body) = response.into_parts();

            // Only bodies of known, bounded size are captured
            let limit = u64::try_from(config.max_body_bytes).unwrap_or(u64::MAX);
            let hint = body.size_hint();
            if hint.lower() > limit || hint.upper().is_none_or(|upper| upper > limit) {
                let reason = if hint.upper().is_none() {
                    "body_unbounded"
                } else {
                    "body_too_large"
                };
                return Ok(skip(Response::from_parts(parts, body), &key, reason));
            }

            let bytes = to_bytes(body, config.max_body_bytes).await?;
            let text = match std::str::from_utf8(&bytes) {
                Ok(text) => text.to_owned(),
                Err(_) => {
                    return Ok(skip(
                        Response::from_parts(parts, Body::from(bytes)),
                        &key,
                        "body_not_utf8",
                    ));
                }
            };

            let entry = CacheEntry {
                body: text,
                headers: capture_headers(&parts.headers),
            };
            persist(store.as_ref(), &key, entry, &config).await?;

            Ok(mark_miss(Response::from_parts(parts, Body::from(bytes))))
        })
    }
}

/// Single store read, timed and logged on failure.
async fn lookup(store: &dyn CacheStore, key: &str) -> Result<Option<CacheEntry>, StoreError> {
    let start = Instant::now();
    let result = store.get(key).await;
    metrics::record_cache_store_duration("get", start.elapsed().as_secs_f64());

    result.inspect_err(|e| {
        error!(key = %key, store = store.name(), error = %e, "Cache lookup failed");
        metrics::record_cache_store_error("get");
    })
}

/// Single store write, timed and logged on failure.
async fn persist(
    store: &dyn CacheStore,
    key: &str,
    entry: CacheEntry,
    config: &CacheConfig,
) -> Result<(), StoreError> {
    let start = Instant::now();
    let result = store.set(key, entry, config.ttl).await;
    metrics::record_cache_store_duration("set", start.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            debug!(key = %key, ttl_secs = config.ttl.as_secs(), "Response cached");
            metrics::record_cache_write();
            Ok(())
        }
        Err(e) => {
            error!(key = %key, store = store.name(), error = %e, "Cache write failed");
            metrics::record_cache_store_error("set");
            Err(e)
        }
    }
}

/// First eligibility check a miss fails, in evaluation order.
fn skip_reason(
    config: &CacheConfig,
    status: StatusCode,
    method: &Method,
    path: &str,
    params: &QueryParams,
) -> Option<&'static str> {
    if !config.is_active(status, method) {
        return Some(if config.status_codes.contains(&status) {
            "method"
        } else {
            "status"
        });
    }
    if !path_matches(&config.included_path, path) {
        return Some("path_not_included");
    }
    if path_matches(&config.excluded_path, path) {
        return Some("path_excluded");
    }
    // Parameters that are neither included nor ignored bust the cache
    if !is_query_included(params, &config.included_query)
        && !parse_ignored_params(params, &config.ignored_query, &config.included_query).is_empty()
    {
        return Some("query_not_included");
    }
    if is_query_excluded(params, &config.excluded_query) {
        return Some("query_excluded");
    }
    None
}

fn skip(response: Response<Body>, key: &str, reason: &'static str) -> Response<Body> {
    debug!(key = %key, reason = reason, "Response not cached");
    metrics::record_cache_skip(reason);
    mark_miss(response)
}

fn mark_miss(mut response: Response<Body>) -> Response<Body> {
    response.headers_mut().insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static("MISS"),
    );
    response
}

/// Copy response headers into the persisted multi-value form.
fn capture_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut captured: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if name.as_str() == CACHE_STATUS_HEADER {
            continue;
        }
        // Opaque (non-UTF-8) values cannot be stored
        if let Ok(value) = value.to_str() {
            captured
                .entry(name.as_str().to_owned())
                .or_default()
                .push(value.to_owned());
        }
    }
    captured
}

/// Rebuild a response from a stored entry.
fn hit_response(entry: CacheEntry) -> Response<Body> {
    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    for (name, values) in &entry.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    headers.insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static("HIT"),
    );
    response
}

/// Error handler for `HandleErrorLayer` wrapping [`ResponseCacheLayer`].
///
/// Store failures become `AppError::Store` (503); anything else, such as a
/// failing body stream, becomes `AppError::Internal` (500).
pub async fn handle_cache_error(err: BoxError) -> AppError {
    match err.downcast::<StoreError>() {
        Ok(store_error) => AppError::Store(*store_error),
        Err(other) => AppError::Internal(other.to_string()),
    }
}
