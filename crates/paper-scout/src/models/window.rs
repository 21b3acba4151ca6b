//! Search window and record budgets.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    /// First day (inclusive).
    pub since: NaiveDate,
    /// Last day (inclusive).
    pub until: NaiveDate,
}

impl SearchWindow {
    /// Create a window; callers validate ordering.
    #[must_use]
    pub const fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self { since, until }
    }

    /// Window covering the last `days` days up to and including `today`.
    #[must_use]
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        let since = today.checked_sub_days(Days::new(u64::from(days))).unwrap_or(today);
        Self { since, until: today }
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.since <= date && date <= self.until
    }

    /// Whether the window is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.since <= self.until
    }
}

/// Record budgets for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Cap across all sources.
    pub total: usize,
    /// Cap for any single source.
    pub per_source: usize,
}

impl SearchLimits {
    /// The cap a single source actually gets.
    #[must_use]
    pub fn effective_per_source(&self) -> usize {
        self.per_source.min(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_days_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = SearchWindow::last_days(1, today);
        assert_eq!(window.since, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(window.contains(today));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()));
    }

    #[test]
    fn test_effective_limit() {
        let limits = SearchLimits { total: 100, per_source: 400 };
        assert_eq!(limits.effective_per_source(), 100);
    }
}
