//! Query parameter filtering for cache decisions and cache keys.
//!
//! Query rules are key sets: a rule selects a request when at least one of
//! the request's parameter names is in the set (intersection, not
//! containment). Parameter values never participate in a rule.

use std::collections::BTreeMap;

use super::FilterSpec;

/// Decoded query parameters, sorted by name.
pub type QueryParams = BTreeMap<String, String>;

/// Whether the request's query parameters are covered by `included`.
///
/// A request without query parameters is trivially included.
pub fn is_query_included(params: &QueryParams, included: &FilterSpec) -> bool {
    if params.is_empty() {
        return true;
    }
    match included {
        FilterSpec::Wildcard => true,
        other => intersects(params, other),
    }
}

/// Whether any of the request's query parameters is excluded.
pub fn is_query_excluded(params: &QueryParams, excluded: &FilterSpec) -> bool {
    match excluded {
        FilterSpec::Wildcard => true,
        other => intersects(params, other),
    }
}

/// Select the query parameters that participate in the cache key.
///
/// - `ignored` is `Wildcard`: only the parameters named by `included` are
///   kept (none unless `included` is a key set)
/// - `ignored` is empty: every parameter is kept
/// - otherwise: every parameter except those named by `ignored`
///
/// Parameters listed in an explicit ignore set are dropped, so two requests
/// differing only in ignored parameters share a cache key.
pub fn parse_ignored_params(
    params: &QueryParams,
    ignored: &FilterSpec,
    included: &FilterSpec,
) -> QueryParams {
    match ignored {
        FilterSpec::Wildcard => match included.keys() {
            Some(keys) => params
                .iter()
                .filter(|(name, _)| keys.contains(*name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            None => QueryParams::new(),
        },
        FilterSpec::Keys(keys) => params
            .iter()
            .filter(|(name, _)| !keys.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        // Regex rules cannot name parameters, so they ignore nothing
        FilterSpec::Empty | FilterSpec::Pattern(_) | FilterSpec::Patterns(_) => params.clone(),
    }
}

fn intersects(params: &QueryParams, spec: &FilterSpec) -> bool {
    spec.keys()
        .is_some_and(|keys| params.keys().any(|name| keys.contains(name)))
}
