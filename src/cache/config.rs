//! Response cache configuration.
//!
//! Built once from a map of overrides merged over [`defaults`], validated,
//! and never mutated afterwards. Every key of the map is optional:
//!
//! | Key              | Default    | Shape                                  |
//! |------------------|------------|----------------------------------------|
//! | `included_path`  | `"*"`      | `"*"`, regex, list of regexes, `null`  |
//! | `excluded_path`  | `null`     | same as `included_path`                |
//! | `methods`        | `["GET"]`  | list of HTTP methods (or one string)   |
//! | `status_codes`   | `[200]`    | list of status codes (or one number)   |
//! | `ttl`            | `864000`   | seconds, > 0                           |
//! | `included_query` | `"*"`      | `"*"`, key list, key map, `null`       |
//! | `excluded_query` | `null`     | same as `included_query`               |
//! | `ignored_query`  | `null`     | same as `included_query`               |
//! | `max_body_bytes` | `10485760` | largest response body that is captured |
//!
//! An explicit `null` override replaces the default, so
//! `{"included_query": null}` turns query inclusion into default-deny.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::{Map, Value, json};

use crate::error::{AppError, AppResult};
use crate::filter::FilterSpec;

/// Ten days.
pub const DEFAULT_TTL_SECS: u64 = 864_000;

/// Largest response body captured into the cache (10MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Every key accepted in a cache configuration map.
pub const CACHE_KEYS: [&str; 9] = [
    "included_path",
    "excluded_path",
    "methods",
    "status_codes",
    "ttl",
    "included_query",
    "excluded_query",
    "ignored_query",
    "max_body_bytes",
];

/// Default configuration map.
pub fn defaults() -> Map<String, Value> {
    let value = json!({
        "included_path": "*",
        "excluded_path": null,
        "methods": ["GET"],
        "status_codes": [200],
        "ttl": DEFAULT_TTL_SECS,
        "included_query": "*",
        "excluded_query": null,
        "ignored_query": null,
        "max_body_bytes": DEFAULT_MAX_BODY_BYTES,
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Immutable response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub included_path: FilterSpec,
    pub excluded_path: FilterSpec,
    /// HTTP methods eligible for caching (never empty)
    pub methods: Vec<Method>,
    /// Response status codes eligible for caching (never empty)
    pub status_codes: Vec<StatusCode>,
    pub ttl: Duration,
    pub included_query: FilterSpec,
    pub excluded_query: FilterSpec,
    pub ignored_query: FilterSpec,
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            included_path: FilterSpec::Wildcard,
            excluded_path: FilterSpec::Empty,
            methods: vec![Method::GET],
            status_codes: vec![StatusCode::OK],
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            included_query: FilterSpec::Wildcard,
            excluded_query: FilterSpec::Empty,
            ignored_query: FilterSpec::Empty,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CacheConfig {
    /// Merge `overrides` over the defaults and resolve the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for unknown keys, wrongly-typed
    /// values, empty method/status lists or a zero TTL, and
    /// `AppError::InvalidPattern` for path rules that do not compile.
    pub fn from_overrides(overrides: &Map<String, Value>) -> AppResult<Self> {
        let mut merged = defaults();
        for (key, value) in overrides {
            if !CACHE_KEYS.contains(&key.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Unknown response cache setting `{key}`"
                )));
            }
            merged.insert(key.clone(), value.clone());
        }

        let get = |key: &str| merged.get(key).unwrap_or(&Value::Null);

        Ok(Self {
            included_path: FilterSpec::path_rule("included_path", get("included_path"))?,
            excluded_path: FilterSpec::path_rule("excluded_path", get("excluded_path"))?,
            methods: parse_methods(get("methods"))?,
            status_codes: parse_status_codes(get("status_codes"))?,
            ttl: Duration::from_secs(parse_positive("ttl", get("ttl"))?),
            included_query: FilterSpec::query_rule("included_query", get("included_query"))?,
            excluded_query: FilterSpec::query_rule("excluded_query", get("excluded_query"))?,
            ignored_query: FilterSpec::query_rule("ignored_query", get("ignored_query"))?,
            max_body_bytes: usize::try_from(parse_positive(
                "max_body_bytes",
                get("max_body_bytes"),
            )?)
            .map_err(|e| AppError::ConfigError(format!("Invalid max_body_bytes: {e}")))?,
        })
    }

    /// Whether a response with `status` to a `method` request may be cached.
    pub fn is_active(&self, status: StatusCode, method: &Method) -> bool {
        self.status_codes.contains(&status) && self.methods.contains(method)
    }
}

/// Accept a list or a lone scalar.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn parse_methods(value: &Value) -> AppResult<Vec<Method>> {
    let methods = as_list(value)
        .into_iter()
        .map(|item| {
            let name = item.as_str().ok_or_else(|| {
                AppError::ConfigError(format!("`methods` must contain strings, got {item}"))
            })?;
            Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
                .map_err(|e| AppError::ConfigError(format!("Invalid method `{name}`: {e}")))
        })
        .collect::<AppResult<Vec<_>>>()?;

    if methods.is_empty() {
        return Err(AppError::ConfigError(
            "`methods` must list at least one HTTP method".to_string(),
        ));
    }
    Ok(methods)
}

fn parse_status_codes(value: &Value) -> AppResult<Vec<StatusCode>> {
    let codes = as_list(value)
        .into_iter()
        .map(|item| {
            item.as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .filter(|code| (100..=599).contains(code))
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| {
                    AppError::ConfigError(format!(
                        "`status_codes` must contain codes between 100 and 599, got {item}"
                    ))
                })
        })
        .collect::<AppResult<Vec<_>>>()?;

    if codes.is_empty() {
        return Err(AppError::ConfigError(
            "`status_codes` must list at least one status code".to_string(),
        ));
    }
    Ok(codes)
}

fn parse_positive(key: &str, value: &Value) -> AppResult<u64> {
    value
        .as_u64()
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::ConfigError(format!("`{key}` must be a positive integer, got {value}")))
}
