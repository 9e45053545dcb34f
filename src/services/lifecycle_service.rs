use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::listing::Listing;
use crate::utils::time::{parse_listing_date, start_of_day};

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Active-record counts around a cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub before: usize,
    pub after: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(DEFAULT_RETENTION_DAYS)
    }
}

impl RetentionPolicy {
    pub fn days(days: i64) -> Self {
        Self {
            window: Duration::days(days.max(0)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// When the record entered the portal: `addedTimestamp`, or the parsed
    /// record date for legacy records without one.
    pub fn added_at(listing: &Listing) -> Option<DateTime<Utc>> {
        if listing.added_timestamp > 0 {
            return crate::utils::time::from_millis(listing.added_timestamp);
        }
        listing
            .application_start_date
            .as_deref()
            .or(listing.date.as_deref())
            .and_then(parse_listing_date)
            .map(start_of_day)
    }

    /// Records without a usable age are never expired.
    pub fn is_expired(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        Self::added_at(listing)
            .map(|added| now - added > self.window)
            .unwrap_or(false)
    }

    /// Ids of active records past the window, in input order.
    pub fn expired_ids(&self, records: &[Listing], now: DateTime<Utc>) -> Vec<String> {
        records
            .iter()
            .filter(|l| l.is_active && self.is_expired(l, now))
            .map(|l| l.id.clone())
            .collect()
    }
}
