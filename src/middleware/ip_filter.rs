//! CIDR-based IP allow/deny middleware.
//!
//! # Evaluation Order
//!
//! ```text
//! client IP ──invalid──► lists configured && fail_on_invalid_ip ? 403 : next
//!     │
//!     ▼
//! blacklist hit? ──yes──► blacklisted_redirect ? 302 : 403
//!     │ no
//!     ▼
//! whitelist configured and missed? ──yes──► not_whitelisted_redirect ? 302 : 403
//!     │ no
//!     ▼
//!   next
//! ```
//!
//! The blacklist is checked first, so an address present in both lists is
//! blocked. An empty whitelist restricts nothing.
//!
//! # Configuration
//!
//! | Key                        | Default | Shape                          |
//! |----------------------------|---------|--------------------------------|
//! | `blacklist`                | `null`  | CIDR list (or one CIDR string) |
//! | `whitelist`                | `null`  | CIDR list (or one CIDR string) |
//! | `blacklisted_redirect`     | `null`  | redirect target                |
//! | `not_whitelisted_redirect` | `null`  | redirect target                |
//! | `fail_on_invalid_ip`       | `false` | bool                           |

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{HeaderValue, LOCATION};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::{ClientIp, extract_client_ip};
use crate::error::{AppError, AppResult};
use crate::filter::{CidrRange, cidr_contains};
use crate::metrics;

/// Every key accepted in an IP filter configuration map.
pub const IP_FILTER_KEYS: [&str; 5] = [
    "blacklist",
    "whitelist",
    "blacklisted_redirect",
    "not_whitelisted_redirect",
    "fail_on_invalid_ip",
];

/// Immutable IP filter configuration.
#[derive(Debug, Clone, Default)]
pub struct IpFilterConfig {
    /// Ranges that are always refused (empty = none)
    pub blacklist: Vec<CidrRange>,
    /// Ranges that are the only ones allowed (empty = all allowed)
    pub whitelist: Vec<CidrRange>,
    pub blacklisted_redirect: Option<HeaderValue>,
    pub not_whitelisted_redirect: Option<HeaderValue>,
    /// Refuse requests whose client IP cannot be determined
    pub fail_on_invalid_ip: bool,
}

/// Which rule produced a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    InvalidIp,
    Blacklisted,
    NotWhitelisted,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::InvalidIp => "invalid_ip",
            Rule::Blacklisted => "blacklist",
            Rule::NotWhitelisted => "whitelist",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a client against the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Rule),
    Redirect(Rule, HeaderValue),
}

impl IpFilterConfig {
    /// Build the configuration from a map of overrides (all keys optional).
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidCidr` for a malformed or IPv6 range, and
    /// `AppError::ConfigError` for unknown keys, wrongly-typed values and
    /// redirect targets that are not valid header values.
    pub fn from_overrides(overrides: &Map<String, Value>) -> AppResult<Self> {
        if let Some(key) = overrides
            .keys()
            .find(|key| !IP_FILTER_KEYS.contains(&key.as_str()))
        {
            return Err(AppError::ConfigError(format!(
                "Unknown IP filter setting `{key}`"
            )));
        }

        let get = |key: &str| overrides.get(key).unwrap_or(&Value::Null);

        let fail_on_invalid_ip = match get("fail_on_invalid_ip") {
            Value::Null => false,
            Value::Bool(b) => *b,
            other => {
                return Err(AppError::ConfigError(format!(
                    "`fail_on_invalid_ip` must be a boolean, got {other}"
                )));
            }
        };

        Ok(Self {
            blacklist: parse_ranges("blacklist", get("blacklist"))?,
            whitelist: parse_ranges("whitelist", get("whitelist"))?,
            blacklisted_redirect: parse_redirect(
                "blacklisted_redirect",
                get("blacklisted_redirect"),
            )?,
            not_whitelisted_redirect: parse_redirect(
                "not_whitelisted_redirect",
                get("not_whitelisted_redirect"),
            )?,
            fail_on_invalid_ip,
        })
    }

    /// Whether any list is configured.
    pub fn is_enabled(&self) -> bool {
        !self.blacklist.is_empty() || !self.whitelist.is_empty()
    }

    /// Decide what to do with a client.
    pub fn evaluate(&self, client: &ClientIp) -> Decision {
        let Some(ip) = client.addr() else {
            return if self.is_enabled() && self.fail_on_invalid_ip {
                Decision::Deny(Rule::InvalidIp)
            } else {
                Decision::Allow
            };
        };

        if cidr_contains(ip, &self.blacklist) {
            return refuse(Rule::Blacklisted, self.blacklisted_redirect.as_ref());
        }

        if !self.whitelist.is_empty() && !cidr_contains(ip, &self.whitelist) {
            return refuse(Rule::NotWhitelisted, self.not_whitelisted_redirect.as_ref());
        }

        Decision::Allow
    }
}

fn refuse(rule: Rule, redirect: Option<&HeaderValue>) -> Decision {
    match redirect {
        Some(target) => Decision::Redirect(rule, target.clone()),
        None => Decision::Deny(rule),
    }
}

fn parse_ranges(key: &str, value: &Value) -> AppResult<Vec<CidrRange>> {
    let items: Vec<&Value> = match value {
        Value::Null | Value::Bool(false) => return Ok(Vec::new()),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| {
            item.as_str()
                .and_then(CidrRange::parse)
                .ok_or_else(|| AppError::InvalidCidr {
                    key: key.to_string(),
                    value: item.to_string(),
                })
        })
        .collect()
}

fn parse_redirect(key: &str, value: &Value) -> AppResult<Option<HeaderValue>> {
    match value {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => HeaderValue::from_str(s.trim())
            .map(Some)
            .map_err(|e| AppError::ConfigError(format!("Invalid `{key}` target {s:?}: {e}"))),
        other => Err(AppError::ConfigError(format!(
            "`{key}` must be a URL string, got {other}"
        ))),
    }
}

/// IP filter layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let config = IpFilterConfig::from_overrides(&overrides)?;
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(IpFilterLayer::new(config));
/// ```
#[derive(Clone)]
pub struct IpFilterLayer {
    config: Arc<IpFilterConfig>,
}

impl IpFilterLayer {
    pub fn new(config: IpFilterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Whether the filter restricts anything.
    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }
}

impl<S> Layer<S> for IpFilterLayer {
    type Service = IpFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpFilterService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// IP filter service wrapper.
#[derive(Clone)]
pub struct IpFilterService<S> {
    inner: S,
    config: Arc<IpFilterConfig>,
}

impl<S> Service<Request<Body>> for IpFilterService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client = extract_client_ip(&req);
        let decision = self.config.evaluate(&client);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path();
            match decision {
                Decision::Allow => {
                    if client.addr().is_none() {
                        debug!(path = %path, client = ?client, "Client IP unavailable, allowing request");
                    }
                    metrics::record_ip_filter_decision("allow", "none");
                    inner.call(req).await
                }
                Decision::Deny(rule) => {
                    warn!(
                        client = ?client,
                        path = %path,
                        rule = %rule,
                        "Request blocked by IP filter"
                    );
                    metrics::record_ip_filter_decision("deny", rule.as_str());
                    Ok(forbidden_response())
                }
                Decision::Redirect(rule, target) => {
                    warn!(
                        client = ?client,
                        path = %path,
                        rule = %rule,
                        location = ?target,
                        "Request redirected by IP filter"
                    );
                    metrics::record_ip_filter_decision("redirect", rule.as_str());
                    Ok(redirect_response(target))
                }
            }
        })
    }
}

/// Build a forbidden (403) response.
fn forbidden_response() -> Response<Body> {
    (
        StatusCode::FORBIDDEN,
        [("Content-Type", "application/json")],
        r#"{"error":"forbidden","message":"Access from your network is not allowed"}"#,
    )
        .into_response()
}

/// Build a redirect (302) response.
fn redirect_response(target: HeaderValue) -> Response<Body> {
    (StatusCode::FOUND, [(LOCATION, target)]).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::middleware::ip::IpSource;
    use serde_json::json;
    use std::convert::Infallible;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{ServiceExt, service_fn};

    fn config(value: Value) -> IpFilterConfig {
        match value {
            Value::Object(map) => IpFilterConfig::from_overrides(&map).unwrap(),
            _ => panic!("config must be an object"),
        }
    }

    fn client(ip: &str) -> ClientIp {
        ClientIp::Valid(ip.parse::<Ipv4Addr>().unwrap(), IpSource::Peer)
    }

    /// Filter over a `next` that counts calls and answers 200.
    fn filtered(
        config: IpFilterConfig,
        calls: Arc<AtomicUsize>,
    ) -> impl Service<Request<Body>, Response = Response<Body>, Error = Infallible> {
        let next = service_fn(move |_req: Request<Body>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Body::from("ok")))
            }
        });
        IpFilterLayer::new(config).layer(next)
    }

    fn request_from(forwarded_for: &str) -> Request<Body> {
        Request::builder()
            .uri("/page")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_unresolvable_ip_passes_with_default_config() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = filtered(IpFilterConfig::default(), calls.clone());

        let response = svc.oneshot(request_from("garbage")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = filtered(config(json!({ "blacklist": ["10.0.0.0/8"] })), calls.clone());

        let response = svc.oneshot(request_from("10.1.2.3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirected_request_never_reaches_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = filtered(
            config(json!({
                "whitelist": ["192.168.1.0/24"],
                "not_whitelisted_redirect": "/login",
            })),
            calls.clone(),
        );

        let response = svc.oneshot(request_from("8.8.8.8")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = filtered(config(json!({ "blacklist": ["10.0.0.0/8"] })), calls.clone());

        let response = svc.oneshot(request_from("192.0.2.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_config_is_disabled() {
        let config = IpFilterConfig::default();
        assert!(!config.is_enabled());
        assert_eq!(config.evaluate(&client("1.2.3.4")), Decision::Allow);
    }

    #[test]
    fn test_blacklist_denies() {
        let config = config(json!({ "blacklist": ["10.0.0.0/8"] }));
        assert_eq!(
            config.evaluate(&client("10.1.2.3")),
            Decision::Deny(Rule::Blacklisted)
        );
        assert_eq!(config.evaluate(&client("11.0.0.1")), Decision::Allow);
    }

    #[test]
    fn test_blacklist_redirects_when_configured() {
        let config = config(json!({
            "blacklist": "10.0.0.0/8",
            "blacklisted_redirect": "https://example.com/blocked",
        }));
        assert_eq!(
            config.evaluate(&client("10.1.2.3")),
            Decision::Redirect(
                Rule::Blacklisted,
                HeaderValue::from_static("https://example.com/blocked")
            )
        );
    }

    #[test]
    fn test_whitelist_restricts() {
        let config = config(json!({ "whitelist": ["192.168.1.0/24", "127.0.0.1"] }));
        assert_eq!(config.evaluate(&client("192.168.1.77")), Decision::Allow);
        assert_eq!(config.evaluate(&client("127.0.0.1")), Decision::Allow);
        assert_eq!(
            config.evaluate(&client("8.8.8.8")),
            Decision::Deny(Rule::NotWhitelisted)
        );
    }

    #[test]
    fn test_not_whitelisted_redirect() {
        let config = config(json!({
            "whitelist": ["192.168.1.0/24"],
            "not_whitelisted_redirect": "/login",
        }));
        assert_eq!(
            config.evaluate(&client("8.8.8.8")),
            Decision::Redirect(Rule::NotWhitelisted, HeaderValue::from_static("/login"))
        );
    }

    #[test]
    fn test_blacklist_wins_over_whitelist() {
        let config = config(json!({
            "blacklist": ["192.168.1.5"],
            "whitelist": ["192.168.1.0/24"],
        }));
        assert_eq!(
            config.evaluate(&client("192.168.1.5")),
            Decision::Deny(Rule::Blacklisted)
        );
        assert_eq!(config.evaluate(&client("192.168.1.6")), Decision::Allow);
    }

    #[test]
    fn test_invalid_ip_fails_open_by_default() {
        let config = config(json!({ "whitelist": ["192.168.1.0/24"] }));
        assert_eq!(config.evaluate(&ClientIp::Missing), Decision::Allow);
        assert_eq!(
            config.evaluate(&ClientIp::Invalid(IpSource::ForwardedFor)),
            Decision::Allow
        );
    }

    #[test]
    fn test_invalid_ip_fails_closed_when_configured() {
        let config = config(json!({
            "whitelist": ["192.168.1.0/24"],
            "fail_on_invalid_ip": true,
        }));
        assert_eq!(
            config.evaluate(&ClientIp::Missing),
            Decision::Deny(Rule::InvalidIp)
        );
    }

    #[test]
    fn test_fail_on_invalid_ip_without_lists_still_allows() {
        let config = config(json!({ "fail_on_invalid_ip": true }));
        assert_eq!(config.evaluate(&ClientIp::Missing), Decision::Allow);
    }

    #[test]
    fn test_malformed_cidr_fails_fast() {
        let err = IpFilterConfig::from_overrides(
            json!({ "blacklist": ["10.0.0.0/8", "10.0.0.0/40"] })
                .as_object()
                .unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidCidr { ref key, .. } if key == "blacklist"));
    }

    #[test]
    fn test_ipv6_range_rejected() {
        let result = IpFilterConfig::from_overrides(
            json!({ "whitelist": ["::1/128"] }).as_object().unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_and_bad_types_rejected() {
        assert!(
            IpFilterConfig::from_overrides(json!({ "blacklst": [] }).as_object().unwrap()).is_err()
        );
        assert!(
            IpFilterConfig::from_overrides(json!({ "fail_on_invalid_ip": "yes" }).as_object().unwrap())
                .is_err()
        );
        assert!(
            IpFilterConfig::from_overrides(json!({ "blacklisted_redirect": 5 }).as_object().unwrap())
                .is_err()
        );
    }

    #[test]
    fn test_empty_redirect_is_none() {
        let config = config(json!({ "blacklisted_redirect": "" }));
        assert!(config.blacklisted_redirect.is_none());
    }

    #[test]
    fn test_redirect_response_sets_location() {
        let response = redirect_response(HeaderValue::from_static("/elsewhere"));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/elsewhere");
    }

    #[test]
    fn test_forbidden_response_status() {
        assert_eq!(forbidden_response().status(), StatusCode::FORBIDDEN);
    }
}
