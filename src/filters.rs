//! Filtering module for session populations
//!
//! Date filtering is inclusive at day granularity: `since` keeps sessions
//! whose start-of-day is on or after the bound, `until` keeps sessions on or
//! before it. Sessions without a date always pass — an undated session can
//! never be proven outside the range.
//!
//! # Examples
//!
//! ```
//! use droidusage::filters::DateRangeFilter;
//! use chrono::NaiveDate;
//!
//! let filter = DateRangeFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
//! ```

use crate::types::Session;
use chrono::NaiveDate;

/// Inclusive day-granularity date range filter
#[derive(Debug, Default, Clone, Copy)]
pub struct DateRangeFilter {
    /// Start date (inclusive)
    pub since: Option<NaiveDate>,
    /// End date (inclusive)
    pub until: Option<NaiveDate>,
}

impl DateRangeFilter {
    /// Create a filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start date
    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Set the end date
    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }

    /// Whether any bound is configured
    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    /// Check whether a session passes the filter
    pub fn matches(&self, session: &Session) -> bool {
        let Some(date) = session.date else {
            // Undated sessions are never excluded by a date range.
            return true;
        };
        let day = date.date_naive();

        if let Some(since) = self.since {
            if day < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if day > until {
                return false;
            }
        }
        true
    }

    /// Retain only the matching sessions
    pub fn apply(&self, sessions: Vec<Session>) -> Vec<Session> {
        if self.is_unbounded() {
            return sessions;
        }
        sessions.into_iter().filter(|s| self.matches(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionId, TokenCounts};
    use chrono::{DateTime, Utc};

    fn session(date: Option<&str>) -> Session {
        Session {
            id: SessionId::new("test"),
            date: date.map(|d| {
                DateTime::parse_from_rfc3339(d)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
            model: "glm-4".to_string(),
            provider: "zhipuai".to_string(),
            tokens: TokenCounts::default(),
            active_time_ms: 0,
            user_interactions: 0,
            total_tokens: 0,
            cost: 0.0,
        }
    }

    #[test]
    fn test_inclusive_bounds() {
        let filter = DateRangeFilter::new()
            .with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .with_until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        assert!(!filter.matches(&session(Some("2023-12-31T23:59:59Z"))));
        assert!(filter.matches(&session(Some("2024-01-01T00:00:00Z"))));
        assert!(filter.matches(&session(Some("2024-01-31T23:59:00Z"))));
        assert!(!filter.matches(&session(Some("2024-02-01T00:00:00Z"))));
    }

    #[test]
    fn test_undated_sessions_always_pass() {
        let filter = DateRangeFilter::new()
            .with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .with_until(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(filter.matches(&session(None)));
    }

    #[test]
    fn test_unbounded_passes_everything() {
        let filter = DateRangeFilter::new();
        assert!(filter.is_unbounded());
        assert!(filter.matches(&session(Some("1999-01-01T00:00:00Z"))));
        assert!(filter.matches(&session(None)));
    }
}
