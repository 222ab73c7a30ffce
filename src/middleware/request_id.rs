//! Request ID generation and request span wiring.
//!
//! `SetRequestIdLayer` (tower-http) keeps a client-supplied `X-Request-Id`
//! and otherwise asks [`UuidRequestId`] for a fresh UUIDv4;
//! `PropagateRequestIdLayer` copies it onto the response. [`request_span`]
//! puts the ID on the request's tracing span so every log line emitted by
//! the IP filter and the response cache can be correlated.
//!
//! # Client Usage
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:3000/blog
//! ```

use axum::http::header::HeaderValue;
use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{Span, info_span};
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates UUIDv4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Span for one request, tagged with its request ID.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
