//! Fuzz testing for filter and configuration parsing.
//!
//! Every parser that sees operator-supplied text must reject bad input with
//! an error, never a panic:
//!
//! - `CidrRange::parse` on arbitrary strings
//! - `FilterSpec::path_rule` / `FilterSpec::query_rule` on arbitrary JSON
//! - `CacheConfig::from_overrides` / `IpFilterConfig::from_overrides`
//! - `build_key` over whatever query map the parsers produce
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_filters -- -max_total_time=60
//! ```

#![no_main]

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

use edgeguard::cache::build_key;
use edgeguard::filter::{CidrRange, FilterSpec, path_matches};
use edgeguard::{CacheConfig, IpFilterConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    cidr: String,
    ip: u32,
    rule_json: String,
    path: String,
    query: Vec<(String, String)>,
}

fuzz_target!(|input: Input| {
    if let Some(range) = CidrRange::parse(&input.cidr) {
        let _ = range.contains(Ipv4Addr::from(input.ip));
        let _ = range.to_string();
    }

    // Bare strings are accepted the same way the environment loader does
    let value: Value = serde_json::from_str(&input.rule_json)
        .unwrap_or_else(|_| Value::String(input.rule_json.clone()));

    if let Ok(spec) = FilterSpec::path_rule("included_path", &value) {
        let _ = path_matches(&spec, &input.path);
    }
    let _ = FilterSpec::query_rule("ignored_query", &value);

    for key in ["included_path", "excluded_query", "methods", "status_codes", "ttl"] {
        let mut overrides = Map::new();
        overrides.insert(key.to_string(), value.clone());
        if let Ok(config) = CacheConfig::from_overrides(&overrides) {
            let params: BTreeMap<String, String> = input.query.iter().cloned().collect();
            let _ = build_key(&input.path, &params, &config);
        }
    }

    for key in ["blacklist", "whitelist", "blacklisted_redirect"] {
        let mut overrides = Map::new();
        overrides.insert(key.to_string(), value.clone());
        let _ = IpFilterConfig::from_overrides(&overrides);
    }
});
