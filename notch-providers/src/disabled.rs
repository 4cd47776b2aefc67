//! Provider that is never configured.
//!
//! Stands in for any capability the deployment has no credentials for, so
//! verification against it fails closed instead of the engine refusing to
//! start.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notch_core::Fid;

use crate::traits::*;

#[derive(Debug, Clone)]
pub struct DisabledProvider {
    name: String,
}

impl DisabledProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn refuse<T>(&self) -> ProviderResult<T> {
        Err(ProviderError::NotConfigured(self.name.clone()))
    }
}

#[async_trait]
impl SocialProvider for DisabledProvider {
    fn id(&self) -> &str {
        &self.name
    }

    async fn fetch_recent_posts(&self, _fid: Fid, _limit: u32) -> ProviderResult<Vec<Post>> {
        self.refuse()
    }

    async fn fetch_recent_reactions(
        &self,
        _fid: Fid,
        _kind: ReactionKind,
        _limit: u32,
    ) -> ProviderResult<Vec<Reaction>> {
        self.refuse()
    }
}

#[async_trait]
impl ChainProvider for DisabledProvider {
    fn network(&self) -> &str {
        &self.name
    }

    async fn fetch_verified_addresses(&self, _fid: Fid) -> ProviderResult<Vec<String>> {
        self.refuse()
    }

    async fn fetch_asset_transfers(
        &self,
        _address: &str,
        _filter: &TransferFilter,
    ) -> ProviderResult<Vec<Transfer>> {
        self.refuse()
    }

    async fn fetch_token_balances(&self, _address: &str) -> ProviderResult<Vec<TokenBalance>> {
        self.refuse()
    }

    async fn fetch_owned_nfts(&self, _address: &str) -> ProviderResult<Vec<OwnedNft>> {
        self.refuse()
    }
}

#[async_trait]
impl AttestationProvider for DisabledProvider {
    fn id(&self) -> &str {
        &self.name
    }

    async fn query_attestations(
        &self,
        _recipient: &str,
        _schema_ids: &[String],
        _since: DateTime<Utc>,
    ) -> ProviderResult<Vec<Attestation>> {
        self.refuse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_refused() {
        let provider = DisabledProvider::new("chain");
        assert!(matches!(
            provider.fetch_verified_addresses(1).await,
            Err(ProviderError::NotConfigured(name)) if name == "chain"
        ));
        assert!(provider
            .query_attestations("fid:1", &[], Utc::now())
            .await
            .is_err());
    }
}
