//! HTTP middleware for request filtering, response caching, and observability.
//!
//! - **IP Filter**: CIDR blacklist/whitelist with 403 or 302 outcomes
//! - **Response Cache**: Serves stored responses and stores cacheable ones
//! - **Request ID**: UUID generation and span tagging for correlation
//! - **Client IP**: Forwarding-header and peer-address extraction
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → IP Filter → Response Cache → CORS → Handler
//!                                    ↓              ↓
//!                               403 / 302      HIT: stored response
//! ```
//!
//! # Security Considerations
//!
//! - The IP filter trusts `X-Forwarded-For` / `X-Real-IP`; run it behind a
//!   proxy that overwrites those headers
//! - The response cache runs after the IP filter, so a blocked client can
//!   never be served a cached page

pub mod ip;
pub mod ip_filter;
pub mod request_id;
pub mod response_cache;

pub use ip::{ClientIp, IpSource, extract_client_ip};
pub use ip_filter::{Decision, IpFilterConfig, IpFilterLayer, Rule};
pub use request_id::{REQUEST_ID_HEADER, UuidRequestId, request_span};
pub use response_cache::{CACHE_STATUS_HEADER, ResponseCacheLayer, handle_cache_error};
