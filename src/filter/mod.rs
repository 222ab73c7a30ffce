//! Include/exclude rules shared by the caching and IP filtering middleware.
//!
//! Configuration arrives as loosely-typed JSON values (`"*"`, a string, a
//! list, an object, or nothing at all). Each value is resolved exactly once,
//! at configuration time, into a [`FilterSpec`] so that the matching code
//! only ever sees a closed set of cases:
//!
//! ```text
//!   JSON value              path rule               query rule
//!   ─────────────────────   ─────────────────────   ─────────────────────
//!   "*"                     Wildcard                Wildcard
//!   "^/blog"                Pattern(regex)          Keys({"^/blog"})
//!   ["^/a", "^/b"]          Patterns([..])          Keys({"^/a", "^/b"})
//!   {"page": true}          error                   Keys({"page"})
//!   null / false / "" / []  Empty                   Empty
//! ```
//!
//! - [`path`]: regex matching of request paths (PathMatcher)
//! - [`query`]: key-set filtering of query parameters (QueryFilter)
//! - [`cidr`]: IPv4 range membership (CidrMatcher)

pub mod cidr;
pub mod path;
pub mod query;

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub use cidr::{CidrRange, contains as cidr_contains};
pub use path::matches as path_matches;
pub use query::{is_query_excluded, is_query_included, parse_ignored_params};

/// Literal that selects everything.
pub const WILDCARD: &str = "*";

/// A resolved inclusion or exclusion rule.
///
/// Immutable once built. The same type serves both path rules (regex
/// semantics) and query rules (key-membership semantics); which variants
/// can appear depends on the constructor used.
#[derive(Debug, Clone, Default)]
pub enum FilterSpec {
    /// No rule configured. Matches nothing.
    #[default]
    Empty,
    /// `"*"`. Matches everything.
    Wildcard,
    /// A single unanchored regular expression (path rules only).
    Pattern(Regex),
    /// Any of several regular expressions (path rules only).
    Patterns(Vec<Regex>),
    /// A set of query parameter names (query rules only).
    Keys(BTreeSet<String>),
}

impl FilterSpec {
    /// Resolve a path rule from its configuration value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidPattern` if a pattern does not compile, or
    /// `AppError::ConfigError` for a value of the wrong JSON type.
    pub fn path_rule(key: &str, value: &Value) -> AppResult<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(Self::Empty),
            Value::String(s) if s.is_empty() => Ok(Self::Empty),
            Value::String(s) if s == WILDCARD => Ok(Self::Wildcard),
            Value::String(s) => compile(key, s).map(Self::Pattern),
            Value::Array(items) => {
                let patterns = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => compile(key, s),
                        other => Err(wrong_type(key, "a list of patterns", other)),
                    })
                    .collect::<AppResult<Vec<_>>>()?;

                if patterns.is_empty() {
                    Ok(Self::Empty)
                } else {
                    Ok(Self::Patterns(patterns))
                }
            }
            other => Err(wrong_type(key, "\"*\", a pattern or a list of patterns", other)),
        }
    }

    /// Resolve a query rule from its configuration value.
    ///
    /// Objects contribute their keys (values are ignored), lists contribute
    /// their string items, and a lone non-wildcard string names one key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for a value of the wrong JSON type.
    pub fn query_rule(key: &str, value: &Value) -> AppResult<Self> {
        let keys: BTreeSet<String> = match value {
            Value::Null | Value::Bool(false) => BTreeSet::new(),
            Value::String(s) if s == WILDCARD => return Ok(Self::Wildcard),
            Value::String(s) if s.is_empty() => BTreeSet::new(),
            Value::String(s) => BTreeSet::from([s.clone()]),
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(wrong_type(key, "a list of parameter names", other)),
                })
                .collect::<AppResult<_>>()?,
            other => return Err(wrong_type(key, "\"*\", a key list or a key map", other)),
        };

        if keys.is_empty() {
            Ok(Self::Empty)
        } else {
            Ok(Self::Keys(keys))
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The key set, when this filter is one.
    pub fn keys(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Keys(keys) => Some(keys),
            _ => None,
        }
    }
}

fn compile(key: &str, pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern).map_err(|source| AppError::InvalidPattern {
        key: key.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> AppError {
    AppError::ConfigError(format!("`{key}` must be {expected}, got {got}"))
}
