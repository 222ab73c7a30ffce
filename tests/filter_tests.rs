//! Black-box tests of the public matching and key-derivation API.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::Ipv4Addr;

use axum::extract::Query;
use axum::http::Uri;
use serde_json::{Value, json};

use edgeguard::cache::build_key;
use edgeguard::filter::query::QueryParams;
use edgeguard::filter::{
    CidrRange, FilterSpec, cidr_contains, is_query_excluded, is_query_included,
    parse_ignored_params, path_matches,
};
use edgeguard::{AppError, CacheConfig};

fn path_rule(value: Value) -> FilterSpec {
    FilterSpec::path_rule("included_path", &value).unwrap()
}

fn query_rule(value: Value) -> FilterSpec {
    FilterSpec::query_rule("included_query", &value).unwrap()
}

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn ranges(cidrs: &[&str]) -> Vec<CidrRange> {
    cidrs.iter().map(|c| CidrRange::parse(c).unwrap()).collect()
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

// ============================================================================
// Path Matching
// ============================================================================

#[test]
fn test_path_wildcard_and_empty() {
    assert!(path_matches(&path_rule(json!("*")), "/anything/at/all"));
    assert!(!path_matches(&path_rule(Value::Null), "/anything"));
    assert!(!path_matches(&path_rule(json!([])), "/anything"));
}

#[test]
fn test_path_patterns_are_unanchored_unless_written_so() {
    let spec = path_rule(json!("admin"));
    assert!(path_matches(&spec, "/site/admin/users"));

    let anchored = path_rule(json!(["^/admin", "^/private/"]));
    assert!(path_matches(&anchored, "/admin/x"));
    assert!(path_matches(&anchored, "/private/notes"));
    assert!(!path_matches(&anchored, "/site/admin"));
}

#[test]
fn test_invalid_path_pattern_is_a_configuration_error() {
    let err = FilterSpec::path_rule("excluded_path", &json!(["^/ok", "(unclosed"])).unwrap_err();
    assert!(matches!(err, AppError::InvalidPattern { ref key, .. } if key == "excluded_path"));
}

// ============================================================================
// Query Filtering
// ============================================================================

#[test]
fn test_query_inclusion() {
    let included = query_rule(json!(["page", "sort"]));

    assert!(is_query_included(&QueryParams::new(), &FilterSpec::Empty));
    assert!(is_query_included(&params(&[("page", "1")]), &included));
    assert!(!is_query_included(&params(&[("session", "x")]), &included));
    assert!(!is_query_included(&params(&[("page", "1")]), &FilterSpec::Empty));
    assert!(is_query_included(&params(&[("anything", "1")]), &FilterSpec::Wildcard));
}

#[test]
fn test_query_exclusion() {
    let excluded = query_rule(json!({ "preview": true }));

    assert!(is_query_excluded(&params(&[("preview", "1")]), &excluded));
    assert!(!is_query_excluded(&params(&[("page", "1")]), &excluded));
    assert!(!is_query_excluded(&params(&[("page", "1")]), &FilterSpec::Empty));
}

#[test]
fn test_ignored_params_are_removed() {
    let all = params(&[("page", "2"), ("utm_source", "mail"), ("utm_medium", "email")]);
    let ignored = query_rule(json!(["utm_source", "utm_medium"]));

    let kept = parse_ignored_params(&all, &ignored, &FilterSpec::Wildcard);
    assert_eq!(kept, params(&[("page", "2")]));
}

#[test]
fn test_ignore_everything_keeps_only_included_keys() {
    let all = params(&[("page", "2"), ("fbclid", "abc")]);
    let included = query_rule(json!(["page"]));

    let kept = parse_ignored_params(&all, &FilterSpec::Wildcard, &included);
    assert_eq!(kept, params(&[("page", "2")]));
}

#[test]
fn test_nothing_ignored_keeps_everything() {
    let all = params(&[("a", "1"), ("b", "2")]);
    assert_eq!(parse_ignored_params(&all, &FilterSpec::Empty, &FilterSpec::Wildcard), all);
}

// ============================================================================
// Cache Keys
// ============================================================================

#[test]
fn test_key_is_deterministic() {
    let config = CacheConfig::default();
    let query = params(&[("b", "2"), ("a", "1")]);

    let first = build_key("/blog", &query, &config);
    for _ in 0..10 {
        assert_eq!(build_key("/blog", &query, &config), first);
    }
}

#[test]
fn test_key_ignores_query_string_order() {
    let config = CacheConfig::default();
    let decode = |uri: &str| {
        let uri: Uri = uri.parse().unwrap();
        Query::<QueryParams>::try_from_uri(&uri).unwrap().0
    };

    assert_eq!(
        build_key("/search", &decode("/search?a=1&z=26&m=x"), &config),
        build_key("/search", &decode("/search?z=26&m=x&a=1"), &config)
    );
}

#[test]
fn test_key_shape() {
    let config = CacheConfig::default();

    assert_eq!(build_key("/blog", &QueryParams::new(), &config), "request.blog");

    let with_query = build_key("/blog", &params(&[("x", "1")]), &config);
    let hash = with_query.strip_prefix("request.blog.").unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_different_paths_give_different_keys() {
    let config = CacheConfig::default();
    assert_ne!(
        build_key("/blog/a", &QueryParams::new(), &config),
        build_key("/blog/b", &QueryParams::new(), &config)
    );
}

// ============================================================================
// CIDR Matching
// ============================================================================

#[test]
fn test_cidr_reference_cases() {
    assert!(cidr_contains(ip("192.168.1.5"), &ranges(&["192.168.1.0/24"])));
    assert!(!cidr_contains(ip("10.0.0.1"), &ranges(&["192.168.1.0/24"])));
    assert!(cidr_contains(ip("127.0.0.1"), &ranges(&["127.0.0.1"])));
}

#[test]
fn test_cidr_list_is_a_logical_or() {
    let list = ranges(&["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]);

    assert!(cidr_contains(ip("172.20.1.1"), &list));
    assert!(cidr_contains(ip("192.168.200.1"), &list));
    assert!(!cidr_contains(ip("8.8.8.8"), &list));
    assert!(!cidr_contains(ip("8.8.8.8"), &[]));
}

#[test]
fn test_cidr_edges() {
    assert!(cidr_contains(ip("203.0.113.9"), &ranges(&["0.0.0.0/0"])));
    assert!(!cidr_contains(ip("192.168.1.6"), &ranges(&["192.168.1.5/32"])));
    // Host bits in the subnet are masked off
    assert!(cidr_contains(ip("192.168.1.200"), &ranges(&["192.168.1.77/24"])));
}

#[test]
fn test_malformed_cidr_is_rejected() {
    for bad in ["", "10.0.0.0/33", "10.0.0/8", "::1/128", "10.0.0.0/-1", "a.b.c.d", "10.0.0.0/"] {
        assert!(CidrRange::parse(bad).is_none(), "{bad:?} should not parse");
    }
}
