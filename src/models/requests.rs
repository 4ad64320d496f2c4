//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{validate_key, Strategy, StrategyOptions};

/// Resource type used when a request does not name one.
pub const DEFAULT_RESOURCE_TYPE: &str = "default";

/// Request body for the precache operation (PUT /set)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Resource type label, only used for logging on writes
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    /// Any JSON value
    pub value: serde_json::Value,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key).err().map(|e| e.to_string())
    }
}

/// Query for DELETE /invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    /// Plain substring matched against tracked keys
    pub pattern: String,
}

/// Query parameters the proxy consumes itself. Everything else belongs to
/// the upstream request.
const CONTROL_PARAMS: [&str; 4] = ["strategy", "resource_type", "force_refresh", "timeout_ms"];

/// Query for GET /fetch/*path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    pub strategy: Strategy,
    /// Defaults to the first segment of the upstream path
    pub resource_type: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
    pub timeout_ms: Option<u64>,
}

impl FetchQuery {
    /// Resource type for `path`: explicit if given, else its first segment.
    pub fn resource_type_for(&self, path: &str) -> String {
        self.resource_type.clone().unwrap_or_else(|| {
            path.trim_start_matches('/')
                .split('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_RESOURCE_TYPE)
                .to_string()
        })
    }

    pub fn options(&self) -> StrategyOptions {
        StrategyOptions {
            force_refresh: self.force_refresh,
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Upstream target for `path`: the path plus the non-control parameters of
/// the raw query string, kept in their original order and encoding.
///
/// The result is both the cache key and the upstream path, so `?page=2` and
/// `?page=3` are cached separately.
pub fn upstream_target(path: &str, raw_query: Option<&str>) -> String {
    let forwarded: Vec<&str> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|param| !param.is_empty())
        .filter(|param| {
            let name = param.split_once('=').map_or(*param, |(name, _)| name);
            !CONTROL_PARAMS.contains(&name)
        })
        .collect();

    if forwarded.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, forwarded.join("&"))
    }
}

fn default_resource_type() -> String {
    DEFAULT_RESOURCE_TYPE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "categories", "value": ["food", "bars"]}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "categories");
        assert_eq!(req.resource_type, DEFAULT_RESOURCE_TYPE);
        assert_eq!(req.value, serde_json::json!(["food", "bars"]));
    }

    #[test]
    fn test_validate_empty_key() {
        let req = SetRequest {
            key: "".to_string(),
            resource_type: "t".to_string(),
            value: serde_json::Value::Null,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req = SetRequest {
            key: "valid_key".to_string(),
            resource_type: "t".to_string(),
            value: serde_json::json!(1),
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_fetch_query_resource_type() {
        let query = FetchQuery::default();
        assert_eq!(query.resource_type_for("listings/page/2"), "listings");
        assert_eq!(query.resource_type_for(""), DEFAULT_RESOURCE_TYPE);

        let explicit = FetchQuery {
            resource_type: Some("banners".to_string()),
            ..FetchQuery::default()
        };
        assert_eq!(explicit.resource_type_for("listings/page/2"), "banners");
    }

    #[test]
    fn test_upstream_target_keeps_only_forwarded_params() {
        assert_eq!(upstream_target("listings", None), "listings");
        assert_eq!(
            upstream_target("listings", Some("strategy=swr&force_refresh=true")),
            "listings"
        );
        assert_eq!(
            upstream_target(
                "listings",
                Some("page=2&strategy=network-first&q=caf%C3%A9&timeout_ms=50&sort")
            ),
            "listings?page=2&q=caf%C3%A9&sort"
        );
        assert_ne!(
            upstream_target("listings", Some("page=2")),
            upstream_target("listings", Some("page=3"))
        );
    }

    #[test]
    fn test_fetch_query_options() {
        let query = FetchQuery {
            force_refresh: true,
            timeout_ms: Some(250),
            ..FetchQuery::default()
        };
        let options = query.options();
        assert!(options.force_refresh);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
    }
}
