//! Daily activity streaks.

use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use notch_core::Fid;

use crate::store::{keys, KvStore};
use crate::types::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub consecutive_days: u32,
    pub last_active: NaiveDate,
    pub first_seen: NaiveDate,
}

impl Streak {
    fn start(today: NaiveDate) -> Self {
        Self {
            consecutive_days: 1,
            last_active: today,
            first_seen: today,
        }
    }

    /// The streak after activity on `today`.
    fn advance(self, today: NaiveDate) -> Self {
        if today <= self.last_active {
            return self;
        }
        let consecutive_days = if today - self.last_active == ChronoDuration::days(1) {
            self.consecutive_days.saturating_add(1)
        } else {
            1
        };
        Self {
            consecutive_days,
            last_active: today,
            first_seen: self.first_seen,
        }
    }
}

/// Streak records in the key-value store.
#[derive(Clone)]
pub struct StreakTracker {
    kv: Arc<dyn KvStore>,
    retention: Duration,
}

impl StreakTracker {
    pub fn new(kv: Arc<dyn KvStore>, retention: Duration) -> Self {
        Self { kv, retention }
    }

    pub async fn get(&self, fid: Fid) -> Result<Option<Streak>> {
        Ok(self.kv.get_json(&keys::player_activity(fid)).await?)
    }

    /// Record activity on `today` and return the updated streak.
    pub async fn touch(&self, fid: Fid, today: NaiveDate) -> Result<Streak> {
        let current = self.get(fid).await?;
        let next = match current {
            Some(streak) => streak.advance(today),
            None => Streak::start(today),
        };
        if current != Some(next) {
            self.kv
                .set_json(&keys::player_activity(fid), &next, self.retention)
                .await?;
            debug!(fid = fid, days = next.consecutive_days, "Streak updated");
        }
        Ok(next)
    }

    /// Streak length as of `today`; zero once a day has been missed.
    pub async fn current_days(&self, fid: Fid, today: NaiveDate) -> Result<u32> {
        Ok(match self.get(fid).await? {
            Some(streak) if today - streak.last_active <= ChronoDuration::days(1) => {
                streak.consecutive_days
            }
            _ => 0,
        })
    }
}
