//! Referral tracking.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use notch_core::{ActivityLogEntry, Category, Fid};

use crate::activity::ActivityLog;
use crate::store::ScoreStore;
use crate::types::{EngineError, Result};

/// Activity type logged when a referral is recorded.
pub const REFERRAL_ACTIVITY: &str = "referral";

#[derive(Clone)]
pub struct ReferralTracker {
    store: Arc<dyn ScoreStore>,
    activity: ActivityLog,
}

impl ReferralTracker {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            activity: ActivityLog::new(store.clone()),
            store,
        }
    }

    /// Record that `referrer` brought in `referee`. Returns `false` if the
    /// referee was already referred by anyone.
    pub async fn record(&self, referrer: Fid, referee: Fid, now: DateTime<Utc>) -> Result<bool> {
        if referrer == referee {
            return Err(EngineError::InvalidReferral(format!(
                "fid {referrer} cannot refer itself"
            )));
        }
        if !self.store.record_referral_if_absent(referrer, referee).await? {
            return Ok(false);
        }

        self.activity
            .append(ActivityLogEntry::new(
                referrer,
                REFERRAL_ACTIVITY,
                Category::Player,
                0,
                serde_json::json!({ "referee": referee }),
                now,
            ))
            .await?;
        info!(referrer = referrer, referee = referee, "Referral recorded");
        Ok(true)
    }

    pub async fn count(&self, referrer: Fid) -> Result<u64> {
        Ok(self.store.referral_count(referrer).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_record_and_count() {
        let store: Arc<dyn ScoreStore> = Arc::new(MemoryStore::new());
        let tracker = ReferralTracker::new(store.clone());
        let now = Utc::now();

        assert!(tracker.record(1, 2, now).await.unwrap());
        assert!(!tracker.record(1, 2, now).await.unwrap());
        assert!(!tracker.record(3, 2, now).await.unwrap());
        assert_eq!(tracker.count(1).await.unwrap(), 1);
        assert_eq!(tracker.count(3).await.unwrap(), 0);

        let log = store.activity_log(1, None).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].points, 0);
    }

    #[tokio::test]
    async fn test_self_referral_rejected() {
        let tracker = ReferralTracker::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            tracker.record(5, 5, Utc::now()).await,
            Err(EngineError::InvalidReferral(_))
        ));
    }
}
