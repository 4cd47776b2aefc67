//! Referral check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use notch_core::{Fid, ReferralRequirement};
use notch_providers::{ProviderError, ProviderResult};

use crate::store::ScoreStore;

use super::VerificationStrategy;

/// Passes when the user has referred at least `min_referrals` distinct users.
pub struct ReferralStrategy {
    store: Arc<dyn ScoreStore>,
}

impl ReferralStrategy {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VerificationStrategy<ReferralRequirement> for ReferralStrategy {
    fn name(&self) -> &str {
        "referral"
    }

    async fn check(
        &self,
        fid: Fid,
        requirement: &ReferralRequirement,
        _now: DateTime<Utc>,
    ) -> ProviderResult<bool> {
        let count = self
            .store
            .referral_count(fid)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("referral store: {e}")))?;
        Ok(count >= u64::from(requirement.min_referrals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_counts_distinct_referees() {
        let store = Arc::new(MemoryStore::new());
        let strategy = ReferralStrategy::new(store.clone());
        let requirement = ReferralRequirement { min_referrals: 3 };
        let now = Utc::now();

        store.record_referral_if_absent(1, 10).await.unwrap();
        store.record_referral_if_absent(1, 11).await.unwrap();
        store.record_referral_if_absent(1, 11).await.unwrap();
        assert!(!strategy.check(1, &requirement, now).await.unwrap());

        store.record_referral_if_absent(1, 12).await.unwrap();
        assert!(strategy.check(1, &requirement, now).await.unwrap());
    }
}
