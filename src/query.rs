//! Request-target splitting
//!
//! Splits a request target such as `/a/b?x=1&y=2` into its path and a map
//! of query parameters. Values are kept as sent; no percent-decoding.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Query parameters keyed by name. Later duplicates replace earlier ones.
pub type QueryParams = BTreeMap<String, String>;

/// Split a request target into `(path, params)`
///
/// An empty target yields `("/", {})`. Pairs without `=` map to an empty
/// value, empty pairs (`a=1&&b=2`) are skipped. Never fails.
pub fn split_path_query(target: &str) -> (String, QueryParams) {
    let mut params = QueryParams::new();
    if target.is_empty() {
        return ("/".to_string(), params);
    }

    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(key.to_string(), value.to_string());
    }

    (path.to_string(), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_params() {
        let (path, params) = split_path_query("/a/b?x=1&y=2");
        assert_eq!(path, "/a/b");
        assert_eq!(params.len(), 2);
        assert_eq!(params["x"], "1");
        assert_eq!(params["y"], "2");
    }

    #[test]
    fn test_empty_target_is_root() {
        let (path, params) = split_path_query("");
        assert_eq!(path, "/");
        assert!(params.is_empty());
    }

    #[test]
    fn test_flag_without_value() {
        let (path, params) = split_path_query("/p?flag");
        assert_eq!(path, "/p");
        assert_eq!(params["flag"], "");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let (_, params) = split_path_query("/?k=first&k=second");
        assert_eq!(params.len(), 1);
        assert_eq!(params["k"], "second");
    }

    #[test]
    fn test_value_keeps_extra_equals() {
        let (_, params) = split_path_query("/x?expr=a=b");
        assert_eq!(params["expr"], "a=b");
    }

    #[test]
    fn test_malformed_queries_degrade() {
        let (path, params) = split_path_query("/s?&&=&");
        assert_eq!(path, "/s");
        // "=" is a pair with an empty key and empty value
        assert_eq!(params.len(), 1);
        assert_eq!(params[""], "");

        let (path, params) = split_path_query("?");
        assert_eq!(path, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_path_without_query() {
        let (path, params) = split_path_query("/state");
        assert_eq!(path, "/state");
        assert!(params.is_empty());
    }
}
