//! Accumulated reading progress and its wire shapes

use serde::{Deserialize, Serialize};

/// Cumulative totals for one book, as held locally and reported by the
/// server. Totals only ever grow; local accumulation is additive on top of
/// the seeded server values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTotals {
    /// Last page the reader was on (1-based)
    #[serde(default)]
    pub current_page: usize,
    /// Total reading time in seconds
    #[serde(default)]
    pub total_reading_time: u64,
    /// Distinct forward pages read
    #[serde(default)]
    pub total_pages_read: u64,
}

impl ProgressTotals {
    /// Reconcile two progress records, keeping the larger totals and the
    /// page position of whichever record has read further.
    #[must_use]
    pub fn merge_max(self, other: Self) -> Self {
        let current_page = if other.total_reading_time > self.total_reading_time {
            other.current_page
        } else {
            self.current_page
        };

        Self {
            current_page,
            total_reading_time: self.total_reading_time.max(other.total_reading_time),
            total_pages_read: self.total_pages_read.max(other.total_pages_read),
        }
    }
}

/// Body of a progress update POST
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub current_page: usize,
    pub is_session_start: bool,
    pub total_reading_time: u64,
    pub total_pages_read: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn from_totals(totals: &ProgressTotals, is_session_start: bool) -> Self {
        Self {
            current_page: totals.current_page,
            is_session_start,
            total_reading_time: totals.total_reading_time,
            total_pages_read: totals.total_pages_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_larger_totals() {
        let server = ProgressTotals {
            current_page: 12,
            total_reading_time: 300,
            total_pages_read: 40,
        };
        let local = ProgressTotals {
            current_page: 14,
            total_reading_time: 350,
            total_pages_read: 42,
        };

        let merged = server.merge_max(local);
        assert_eq!(merged.current_page, 14);
        assert_eq!(merged.total_reading_time, 350);
        assert_eq!(merged.total_pages_read, 42);
    }

    #[test]
    fn merge_prefers_page_of_record_with_more_time() {
        let ahead = ProgressTotals {
            current_page: 20,
            total_reading_time: 500,
            total_pages_read: 10,
        };
        let behind = ProgressTotals {
            current_page: 3,
            total_reading_time: 100,
            total_pages_read: 50,
        };

        assert_eq!(ahead.merge_max(behind).current_page, 20);
        assert_eq!(behind.merge_max(ahead).current_page, 20);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let update = ProgressUpdate {
            current_page: 7,
            is_session_start: true,
            total_reading_time: 120,
            total_pages_read: 5,
        };

        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["currentPage"], 7);
        assert_eq!(json["isSessionStart"], true);
        assert_eq!(json["totalReadingTime"], 120);
        assert_eq!(json["totalPagesRead"], 5);
    }
}
