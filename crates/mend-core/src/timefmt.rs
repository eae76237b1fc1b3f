//! Timestamp formatting.
//!
//! Timestamps are persisted as ISO-8601 UTC strings whose lexicographic
//! order equals chronological order. The merge engine sorts by plain string
//! comparison, so every writer must go through [`now_timestamp`]: fixed
//! millisecond precision and a trailing `Z` keep the strings the same width
//! and the ordering total.

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 sortable string, e.g.
/// `2024-03-01T09:15:42.123Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        // 2024-03-01T09:15:42.123Z
        assert_eq!(ts.len(), 24);
    }

    #[test]
    fn test_lexicographic_order_matches_chronological() {
        // Fixed-width formatting means later instants compare greater.
        let earlier = "2024-01-02T00:00:00.000Z";
        let later = "2024-01-02T00:00:01.000Z";
        assert!(earlier < later);
        let next_day = "2024-01-03T00:00:00.000Z";
        assert!(later < next_day);
    }
}
