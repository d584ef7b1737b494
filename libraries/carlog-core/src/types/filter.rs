//! Read-side filters for the stats queries.

use serde::{Deserialize, Serialize};

/// Restricts stats queries to a calendar year, or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearFilter {
    /// No restriction.
    AllTime,
    /// A single calendar year.
    Year(i32),
}

impl YearFilter {
    /// The `[start, end)` date-string range for this filter, or `None` for
    /// all time.
    ///
    /// Summary rows store backend timestamps as ISO-8601 strings, so a plain
    /// lexicographic comparison against `YYYY-01-01` bounds is correct.
    #[must_use]
    pub fn date_range(&self) -> Option<(String, String)> {
        match self {
            Self::AllTime => None,
            Self::Year(year) => Some((format!("{year}-01-01"), format!("{}-01-01", year + 1))),
        }
    }
}

/// Granularity for time-bucketed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    /// One bucket per day.
    Daily,
    /// One bucket per ISO week.
    Weekly,
    /// One bucket per month.
    Monthly,
}

impl TimeBucket {
    /// Pick a bucket size for a span: up to 30 days daily, up to 90 days
    /// weekly, monthly beyond that.
    #[must_use]
    pub fn for_span_days(days: i64) -> Self {
        if days <= 30 {
            Self::Daily
        } else if days <= 90 {
            Self::Weekly
        } else {
            Self::Monthly
        }
    }

    /// SQLite `strftime` pattern producing the bucket key.
    #[must_use]
    pub fn strftime_pattern(&self) -> &'static str {
        match self {
            Self::Daily => "%Y-%m-%d",
            Self::Weekly => "%Y-%W",
            Self::Monthly => "%Y-%m",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_filter_range_is_half_open() {
        let (start, end) = YearFilter::Year(2023).date_range().unwrap();
        assert_eq!(start, "2023-01-01");
        assert_eq!(end, "2024-01-01");
        // an ISO timestamp inside the year sorts between the bounds
        let ts = "2023-06-15T08:30:00Z";
        assert!(ts >= start.as_str() && ts < end.as_str());
    }

    #[test]
    fn all_time_has_no_range() {
        assert!(YearFilter::AllTime.date_range().is_none());
    }

    #[test]
    fn bucket_follows_span_length() {
        assert_eq!(TimeBucket::for_span_days(7), TimeBucket::Daily);
        assert_eq!(TimeBucket::for_span_days(30), TimeBucket::Daily);
        assert_eq!(TimeBucket::for_span_days(31), TimeBucket::Weekly);
        assert_eq!(TimeBucket::for_span_days(90), TimeBucket::Weekly);
        assert_eq!(TimeBucket::for_span_days(91), TimeBucket::Monthly);
        assert_eq!(TimeBucket::for_span_days(3650), TimeBucket::Monthly);
    }
}
