//! Request path matching against include/exclude rules.
//!
//! The matcher only answers "does this rule select this path"; whether a
//! match means include or exclude is decided by the caller.

use super::FilterSpec;

/// Evaluate a path rule against a request path.
///
/// - `Wildcard` always matches
/// - `Empty` never matches
/// - `Pattern` matches when the regex finds a match anywhere in the path
///   (unanchored unless the pattern anchors itself)
/// - `Patterns` matches when any pattern matches; evaluation stops at the
///   first hit
/// - `Keys` describes query parameters and never matches a path
#[inline]
pub fn matches(spec: &FilterSpec, path: &str) -> bool {
    match spec {
        FilterSpec::Wildcard => true,
        FilterSpec::Empty | FilterSpec::Keys(_) => false,
        FilterSpec::Pattern(re) => re.is_match(path),
        FilterSpec::Patterns(patterns) => patterns.iter().any(|re| re.is_match(path)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(value: serde_json::Value) -> FilterSpec {
        FilterSpec::path_rule("included_path", &value).unwrap()
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let spec = rule(json!("*"));
        assert!(matches(&spec, "/"));
        assert!(matches(&spec, "/admin/users/1"));
        assert!(matches(&spec, ""));
    }

    #[test]
    fn test_empty_matches_nothing() {
        let spec = rule(json!(null));
        assert!(!matches(&spec, "/"));
        assert!(!matches(&spec, "/blog"));
    }

    #[test]
    fn test_single_pattern_is_unanchored() {
        let spec = rule(json!("admin"));
        assert!(matches(&spec, "/admin"));
        assert!(matches(&spec, "/site/admin/x"));
        assert!(!matches(&spec, "/blog"));
    }

    #[test]
    fn test_single_pattern_anchored_by_user() {
        let spec = rule(json!("^/admin"));
        assert!(matches(&spec, "/admin/x"));
        assert!(!matches(&spec, "/site/admin"));
    }

    #[test]
    fn test_pattern_list_is_or_combined() {
        let spec = rule(json!(["^/admin", "\\.json$"]));
        assert!(matches(&spec, "/admin/x"));
        assert!(matches(&spec, "/api/feed.json"));
        assert!(!matches(&spec, "/blog/post"));
    }

    #[test]
    fn test_key_set_never_matches_a_path() {
        let spec = FilterSpec::query_rule("included_query", &json!(["/blog"])).unwrap();
        assert!(!matches(&spec, "/blog"));
    }
}
