//! TTL Policy Module
//!
//! Maps resource types to their maximum age and decides whether a stored
//! timestamp is still fresh.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

/// TTL applied to resource types without an explicit policy (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

// == TTL Policy ==
/// Static table of resource type -> time-to-live.
///
/// A resource type is a caller-chosen label such as `"listings"` or
/// `"categories"`. It is independent of the cache key, so many keys can share
/// one policy.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    by_type: HashMap<String, Duration>,
}

impl TtlPolicy {
    // == Constructor ==
    /// Creates an empty table that falls back to `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            by_type: HashMap::new(),
        }
    }

    /// Adds or replaces the TTL for one resource type.
    pub fn with_ttl(mut self, resource_type: impl Into<String>, ttl: Duration) -> Self {
        self.by_type.insert(resource_type.into(), ttl);
        self
    }

    /// Parses `type=millis` pairs separated by commas.
    ///
    /// Malformed pairs are skipped with a warning so one typo does not take
    /// down the whole table.
    pub fn parse(default_ttl: Duration, pairs: &str) -> Self {
        let mut policy = Self::new(default_ttl);
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let parsed = pair
                .split_once('=')
                .and_then(|(ty, ms)| Some((ty.trim(), ms.trim().parse::<u64>().ok()?)))
                .filter(|(ty, _)| !ty.is_empty());

            match parsed {
                Some((ty, ms)) => {
                    policy.by_type.insert(ty.to_string(), Duration::from_millis(ms));
                }
                None => warn!(pair = %pair, "Ignoring malformed TTL policy entry"),
            }
        }
        policy
    }

    // == Lookup ==
    /// Returns the TTL for a resource type, or the default.
    pub fn ttl_for(&self, resource_type: &str) -> Duration {
        self.by_type
            .get(resource_type)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Returns the fallback TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of explicitly configured resource types.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

// == Validity ==
/// Decides whether an entry written at `stored_at` is fresh at `now`.
///
/// Never valid without a timestamp. An entry whose age has reached the TTL is
/// stale. A timestamp in the future (clock skew) counts as age zero.
pub fn is_valid(stored_at: Option<u64>, ttl: Duration, now: u64) -> bool {
    match stored_at {
        Some(ts) => (now.saturating_sub(ts) as u128) < ttl.as_millis(),
        None => false,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_for_falls_back_to_default() {
        let policy = TtlPolicy::new(Duration::from_secs(60))
            .with_ttl("categories", Duration::from_secs(86_400));

        assert_eq!(policy.ttl_for("categories"), Duration::from_secs(86_400));
        assert_eq!(policy.ttl_for("unknown"), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_policy_string() {
        let policy = TtlPolicy::parse(
            DEFAULT_TTL,
            "categories=86400000, listings=30000,broken,=5,banners=abc",
        );

        assert_eq!(policy.len(), 2);
        assert_eq!(policy.ttl_for("listings"), Duration::from_millis(30_000));
        assert_eq!(policy.ttl_for("categories"), Duration::from_millis(86_400_000));
        assert_eq!(policy.ttl_for("banners"), DEFAULT_TTL);
    }

    #[test]
    fn test_never_valid_without_timestamp() {
        assert!(!is_valid(None, Duration::from_secs(3600), 0));
    }

    #[test]
    fn test_listings_window() {
        // Written at t=0 with a 30s TTL
        let ttl = Duration::from_millis(30_000);
        assert!(is_valid(Some(0), ttl, 10_000));
        assert!(!is_valid(Some(0), ttl, 31_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let ttl = Duration::from_millis(1_000);
        assert!(is_valid(Some(5_000), ttl, 5_999));
        assert!(!is_valid(Some(5_000), ttl, 6_000), "age == ttl is stale");
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        assert!(is_valid(Some(10_000), Duration::from_millis(1), 9_000));
    }
}
