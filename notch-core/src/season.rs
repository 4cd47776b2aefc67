//! Season clock.
//!
//! Seasons are fixed-length scoring epochs counted from a start instant.
//! Times before the first season's start map to season 1.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// 2025-08-18T00:00:00Z
pub const DEFAULT_SEASON_START: i64 = 1_755_475_200;
pub const DEFAULT_SEASON_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: u32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonClock {
    first_start: DateTime<Utc>,
    length: Duration,
}

impl SeasonClock {
    pub fn new(first_start: DateTime<Utc>, length_days: u32) -> Self {
        Self {
            first_start,
            length: Duration::days(i64::from(length_days.max(1))),
        }
    }

    /// Season number for `now`, 1-based.
    pub fn season_id(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.first_start).num_seconds().max(0);
        let index = elapsed / self.length.num_seconds();
        u32::try_from(index).unwrap_or(u32::MAX - 1) + 1
    }

    /// The season containing `now`.
    pub fn current(&self, now: DateTime<Utc>) -> Season {
        let id = self.season_id(now);
        let start = self.first_start + self.length * (id as i32 - 1);
        let end = start + self.length;
        let days_remaining = ((end - now).num_seconds().max(0) + 86_399) / 86_400;
        Season {
            id,
            name: format!("Season {id}"),
            start,
            end,
            days_remaining,
        }
    }
}

impl Default for SeasonClock {
    fn default() -> Self {
        let start = DateTime::from_timestamp(DEFAULT_SEASON_START, 0).unwrap_or_default();
        Self::new(start, DEFAULT_SEASON_DAYS)
    }
}
