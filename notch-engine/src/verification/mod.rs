//! Verification Strategies.
//!
//! Each task names a verification method and carries its parameters as a
//! [`VerificationConfig`] variant. The [`Verifier`] dispatches on the
//! variant to the matching [`VerificationStrategy`] and turns every error
//! or timeout into a rejection.

pub mod attestation;
pub mod onchain;
pub mod referral;
pub mod social;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use notch_core::{
    AttestationRequirement, Fid, OnchainRequirement, ReferralRequirement, SocialRequirement,
    TaskDefinition, VerificationConfig,
};
use notch_providers::{AttestationProvider, ChainProvider, ProviderError, ProviderResult, SocialProvider};

use crate::config::VerificationSettings;
use crate::store::ScoreStore;

pub use attestation::AttestationStrategy;
pub use onchain::OnchainActivityStrategy;
pub use referral::ReferralStrategy;
pub use social::SocialActivityStrategy;

/// A check that a claimed action really happened.
///
/// `R` is the requirement type the strategy understands. Implementations
/// return errors as-is; failing closed is the [`Verifier`]'s job.
#[async_trait]
pub trait VerificationStrategy<R: Sync>: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    async fn check(&self, fid: Fid, requirement: &R, now: DateTime<Utc>) -> ProviderResult<bool>;
}

/// Dispatches a task's verification to the matching strategy.
pub struct Verifier {
    social: Arc<dyn VerificationStrategy<SocialRequirement>>,
    onchain: Arc<dyn VerificationStrategy<OnchainRequirement>>,
    attestation: Arc<dyn VerificationStrategy<AttestationRequirement>>,
    referral: Arc<dyn VerificationStrategy<ReferralRequirement>>,
    timeout: Duration,
}

impl Verifier {
    /// Provider-backed strategies.
    pub fn new(
        social: Arc<dyn SocialProvider>,
        chain: Arc<dyn ChainProvider>,
        attestations: Arc<dyn AttestationProvider>,
        store: Arc<dyn ScoreStore>,
        settings: &VerificationSettings,
    ) -> Self {
        Self {
            social: Arc::new(SocialActivityStrategy::new(
                social,
                chrono::Duration::hours(settings.social_lookback_hours),
                settings.post_scan_limit,
            )),
            onchain: Arc::new(OnchainActivityStrategy::new(chain, settings.transfer_scan_depth)),
            attestation: Arc::new(AttestationStrategy::new(
                attestations,
                chrono::Duration::hours(settings.attestation_lookback_hours),
            )),
            referral: Arc::new(ReferralStrategy::new(store)),
            timeout: settings.timeout(),
        }
    }

    /// Replace the social strategy.
    pub fn with_social(mut self, strategy: Arc<dyn VerificationStrategy<SocialRequirement>>) -> Self {
        self.social = strategy;
        self
    }

    /// Replace the on-chain strategy.
    pub fn with_onchain(
        mut self,
        strategy: Arc<dyn VerificationStrategy<OnchainRequirement>>,
    ) -> Self {
        self.onchain = strategy;
        self
    }

    /// Replace the attestation strategy.
    pub fn with_attestation(
        mut self,
        strategy: Arc<dyn VerificationStrategy<AttestationRequirement>>,
    ) -> Self {
        self.attestation = strategy;
        self
    }

    /// Replace the referral strategy.
    pub fn with_referral(
        mut self,
        strategy: Arc<dyn VerificationStrategy<ReferralRequirement>>,
    ) -> Self {
        self.referral = strategy;
        self
    }

    /// Whether `fid` meets `task`'s requirement. Never errors: provider
    /// failures and timeouts count as not met.
    pub async fn verify(&self, fid: Fid, task: &TaskDefinition, now: DateTime<Utc>) -> bool {
        let (strategy, result) = match &task.verification {
            VerificationConfig::Social(req) => {
                (self.social.name(), self.run(self.social.check(fid, req, now)).await)
            }
            VerificationConfig::Onchain(req) => {
                (self.onchain.name(), self.run(self.onchain.check(fid, req, now)).await)
            }
            VerificationConfig::Attestation(req) => (
                self.attestation.name(),
                self.run(self.attestation.check(fid, req, now)).await,
            ),
            VerificationConfig::Referral(req) => {
                (self.referral.name(), self.run(self.referral.check(fid, req, now)).await)
            }
        };

        match result {
            Ok(passed) => {
                debug!(fid = fid, task_id = %task.id, strategy = strategy, passed = passed, "Verification finished");
                passed
            }
            Err(e) => {
                warn!(fid = fid, task_id = %task.id, strategy = strategy, error = %e, "Verification failed closed");
                false
            }
        }
    }

    async fn run<F>(&self, check: F) -> ProviderResult<bool>
    where
        F: std::future::Future<Output = ProviderResult<bool>>,
    {
        match tokio::time::timeout(self.timeout, check).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
