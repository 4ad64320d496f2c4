//! Introspection report types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of everything the timestamp index knows.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub total_entries: usize,
    pub entries: Vec<EntryReport>,
}

/// One tracked key.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub key: String,
    /// Unix milliseconds of the last write
    pub stored_at: u64,
    /// `stored_at` rendered as RFC 3339, when representable
    pub stored_at_iso: Option<String>,
    pub age_ms: u64,
    /// Judged against the default TTL; resource types are not persisted
    pub is_valid: bool,
}

impl EntryReport {
    pub fn new(key: &str, stored_at: u64, now: u64, is_valid: bool) -> Self {
        let stored_at_iso = i64::try_from(stored_at)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339());

        Self {
            key: key.to_string(),
            stored_at,
            stored_at_iso,
            age_ms: now.saturating_sub(stored_at),
            is_valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_report_age_and_iso() {
        let report = EntryReport::new("cities", 1_700_000_000_000, 1_700_000_004_500, true);
        assert_eq!(report.age_ms, 4_500);
        assert_eq!(
            report.stored_at_iso.as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
    }

    #[test]
    fn test_entry_report_future_timestamp_has_zero_age() {
        let report = EntryReport::new("k", 2_000, 1_000, true);
        assert_eq!(report.age_ms, 0);
    }
}
