//! Attestation check.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use notch_core::{AttestationRequirement, Fid};
use notch_providers::{fid_recipient, AttestationProvider, ProviderResult};

use super::VerificationStrategy;

/// Passes when enough attestations under the listed schemas were recorded
/// for the user within the look-back window.
pub struct AttestationStrategy {
    provider: Arc<dyn AttestationProvider>,
    lookback: Duration,
}

impl AttestationStrategy {
    pub fn new(provider: Arc<dyn AttestationProvider>, lookback: Duration) -> Self {
        Self { provider, lookback }
    }
}

#[async_trait]
impl VerificationStrategy<AttestationRequirement> for AttestationStrategy {
    fn name(&self) -> &str {
        "attestation"
    }

    async fn check(
        &self,
        fid: Fid,
        requirement: &AttestationRequirement,
        now: DateTime<Utc>,
    ) -> ProviderResult<bool> {
        if requirement.schema_ids.is_empty() {
            return Ok(false);
        }
        let needed = requirement.min_attestations.max(1) as usize;
        let found = self
            .provider
            .query_attestations(&fid_recipient(fid), &requirement.schema_ids, now - self.lookback)
            .await?;
        Ok(found.len() >= needed)
    }
}
