//! Cache key derivation.
//!
//! # Key Format
//!
//! ```text
//! request.<route.path>[.<sha256 hex of filtered query>]
//! ```
//!
//! - The route path is the request path with surrounding slashes trimmed
//!   (`/` for the root), prefixed with `request/`, and every `/` replaced
//!   by `.`: `/blog/post-1` becomes `request.blog.post-1`
//! - When the request has query parameters, the parameters that survive
//!   [`parse_ignored_params`] are serialized as a key-sorted JSON object and
//!   hashed, so parameter order never changes the key
//!
//! Keys are a pure function of `(path, query, config)`.

use sha2::{Digest, Sha256};

use super::config::CacheConfig;
use crate::filter::parse_ignored_params;
use crate::filter::query::QueryParams;

/// Namespace prefix shared by every response cache key.
pub const KEY_NAMESPACE: &str = "request/";

/// Derive the cache key for a request.
pub fn build_key(path: &str, params: &QueryParams, config: &CacheConfig) -> String {
    let mut key = format!("{KEY_NAMESPACE}{}", route_path(path)).replace('/', ".");

    if !params.is_empty() {
        let key_params =
            parse_ignored_params(params, &config.ignored_query, &config.included_query);
        key.push('.');
        key.push_str(&hash_params(&key_params));
    }

    key
}

/// Path without leading/trailing slashes; the root path stays `/`.
fn route_path(path: &str) -> &str {
    match path.trim_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Stable hash of the canonical (key-sorted) serialization of `params`.
fn hash_params(params: &QueryParams) -> String {
    // BTreeMap serializes in key order; serializing a string map cannot fail,
    // but fall back to the Debug form rather than panic
    let canonical = serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"));
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_key_without_query() {
        let config = CacheConfig::default();
        assert_eq!(build_key("/blog", &QueryParams::new(), &config), "request.blog");
        assert_eq!(
            build_key("/blog/post-1/", &QueryParams::new(), &config),
            "request.blog.post-1"
        );
    }

    #[test]
    fn test_key_for_root_path() {
        let config = CacheConfig::default();
        assert_eq!(build_key("/", &QueryParams::new(), &config), "request..");
    }

    #[test]
    fn test_key_with_query_appends_hash() {
        let config = CacheConfig::default();
        let key = build_key("/blog", &params(&[("x", "1")]), &config);

        let expected = hex::encode(Sha256::digest(br#"{"x":"1"}"#));
        assert_eq!(key, format!("request.blog.{expected}"));
    }

    #[test]
    fn test_key_is_deterministic_and_order_independent() {
        let config = CacheConfig::default();
        let decode = |uri: &str| {
            let uri: axum::http::Uri = uri.parse().unwrap();
            axum::extract::Query::<QueryParams>::try_from_uri(&uri).unwrap().0
        };

        let first = build_key("/list", &decode("/list?a=1&b=2"), &config);
        assert_eq!(first, build_key("/list", &decode("/list?a=1&b=2"), &config));
        assert_eq!(first, build_key("/list", &decode("/list?b=2&a=1"), &config));
    }

    #[test]
    fn test_different_values_give_different_keys() {
        let config = CacheConfig::default();
        assert_ne!(
            build_key("/list", &params(&[("page", "1")]), &config),
            build_key("/list", &params(&[("page", "2")]), &config)
        );
    }

    #[test]
    fn test_ignored_keys_do_not_change_the_key() {
        let config = CacheConfig {
            ignored_query: FilterSpec::query_rule("ignored_query", &json!(["utm_source"])).unwrap(),
            ..CacheConfig::default()
        };

        let plain = build_key("/blog", &params(&[("page", "2")]), &config);
        let tracked = build_key("/blog", &params(&[("page", "2"), ("utm_source", "mail")]), &config);
        assert_eq!(plain, tracked);
    }

    #[test]
    fn test_fully_ignored_query_still_hashes_empty_map() {
        let config = CacheConfig {
            ignored_query: FilterSpec::Wildcard,
            included_query: FilterSpec::Wildcard,
            ..CacheConfig::default()
        };

        let key = build_key("/blog", &params(&[("x", "1")]), &config);
        let empty = hex::encode(Sha256::digest(b"{}"));
        assert_eq!(key, format!("request.blog.{empty}"));
    }
}
