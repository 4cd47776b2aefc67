//! On-chain activity check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use notch_core::{Fid, OnchainEventType, OnchainRequirement};
use notch_providers::{ChainProvider, ProviderError, ProviderResult, Transfer, TransferFilter};

use super::VerificationStrategy;

/// Passes when any verified address of the user has a matching transfer
/// among its most recent `scan_depth`.
pub struct OnchainActivityStrategy {
    provider: Arc<dyn ChainProvider>,
    scan_depth: u32,
}

impl OnchainActivityStrategy {
    pub fn new(provider: Arc<dyn ChainProvider>, scan_depth: u32) -> Self {
        Self {
            provider,
            scan_depth,
        }
    }
}

fn matches(transfer: &Transfer, requirement: &OnchainRequirement) -> bool {
    match requirement.event_type {
        OnchainEventType::ContractCreation => transfer.is_contract_creation(),
        OnchainEventType::TokenSwap => {
            !transfer.is_contract_creation() && transfer.exceeds(requirement.min_value.unwrap_or(0.0))
        }
    }
}

#[async_trait]
impl VerificationStrategy<OnchainRequirement> for OnchainActivityStrategy {
    fn name(&self) -> &str {
        "onchain"
    }

    async fn check(
        &self,
        fid: Fid,
        requirement: &OnchainRequirement,
        _now: DateTime<Utc>,
    ) -> ProviderResult<bool> {
        if !requirement.network.eq_ignore_ascii_case(self.provider.network()) {
            debug!(
                fid = fid,
                wanted = %requirement.network,
                indexed = self.provider.network(),
                "No provider for requested network"
            );
            return Ok(false);
        }

        let addresses = self.provider.fetch_verified_addresses(fid).await?;
        if addresses.is_empty() {
            return Ok(false);
        }

        let filter = TransferFilter {
            max_count: self.scan_depth,
        };
        let mut last_error: Option<ProviderError> = None;
        let mut scanned = 0usize;
        for address in &addresses {
            match self.provider.fetch_asset_transfers(address, &filter).await {
                Ok(transfers) => {
                    scanned += 1;
                    if transfers.iter().any(|t| matches(t, requirement)) {
                        return Ok(true);
                    }
                }
                Err(e) => {
                    warn!(fid = fid, address = %address, error = %e, "Transfer lookup failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if scanned == 0 => Err(e),
            _ => Ok(false),
        }
    }
}
