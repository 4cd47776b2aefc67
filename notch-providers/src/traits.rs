//! Capability interfaces for external data providers.
//!
//! The engine never talks to a remote API directly. It depends on these
//! traits, and adapters (HTTP clients, mocks) implement them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notch_core::Fid;

/// Error types for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider is not available
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider has no credentials or endpoint configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Remote answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Call exceeded its deadline
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

/// A published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub hash: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the post is a reply
    pub parent_id: Option<String>,
}

impl Post {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Recast,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Recast => "recast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: ReactionKind,
    pub timestamp: DateTime<Utc>,
}

/// Read access to a user's social activity.
#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// Provider identifier.
    fn id(&self) -> &str;

    /// Most recent posts, newest first, at most `limit`.
    async fn fetch_recent_posts(&self, fid: Fid, limit: u32) -> ProviderResult<Vec<Post>>;

    /// Most recent reactions of one kind, at most `limit`.
    async fn fetch_recent_reactions(
        &self,
        fid: Fid,
        kind: ReactionKind,
        limit: u32,
    ) -> ProviderResult<Vec<Reaction>>;
}

// ---------------------------------------------------------------------------
// Chain data
// ---------------------------------------------------------------------------

/// An asset transfer sent from an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub hash: Option<String>,
    pub from: String,
    /// `None` for contract creations
    pub to: Option<String>,
    pub value: Option<f64>,
    pub asset: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Value strictly greater than `min`.
    pub fn exceeds(&self, min: f64) -> bool {
        self.value.is_some_and(|v| v > min)
    }
}

/// Query options for [`ChainProvider::fetch_asset_transfers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFilter {
    pub max_count: u32,
}

impl Default for TransferFilter {
    fn default() -> Self {
        Self { max_count: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract_address: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedNft {
    pub contract_address: String,
    pub token_id: String,
}

/// Read access to on-chain data for a single network.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Network this provider indexes, e.g. `base`.
    fn network(&self) -> &str;

    /// Addresses the user has verified ownership of.
    async fn fetch_verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>>;

    /// Recent outgoing transfers from `address`.
    async fn fetch_asset_transfers(
        &self,
        address: &str,
        filter: &TransferFilter,
    ) -> ProviderResult<Vec<Transfer>>;

    async fn fetch_token_balances(&self, address: &str) -> ProviderResult<Vec<TokenBalance>>;

    async fn fetch_owned_nfts(&self, address: &str) -> ProviderResult<Vec<OwnedNft>>;
}

// ---------------------------------------------------------------------------
// Attestation ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: String,
    pub schema_id: Option<String>,
    pub time_created: DateTime<Utc>,
}

/// Query access to an attestation ledger.
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Provider identifier.
    fn id(&self) -> &str;

    /// Attestations for `recipient` under any of `schema_ids`, created at or
    /// after `since`.
    async fn query_attestations(
        &self,
        recipient: &str,
        schema_ids: &[String],
        since: DateTime<Utc>,
    ) -> ProviderResult<Vec<Attestation>>;
}

/// Recipient string attestations use for a user.
pub fn fid_recipient(fid: Fid) -> String {
    format!("fid:{fid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_classification() {
        let creation = Transfer {
            hash: None,
            from: "0xabc".into(),
            to: None,
            value: None,
            asset: None,
            timestamp: None,
        };
        assert!(creation.is_contract_creation());
        assert!(!creation.exceeds(0.0));

        let swap = Transfer {
            to: Some("0xdef".into()),
            value: Some(0.01),
            ..creation
        };
        assert!(!swap.is_contract_creation());
        assert!(swap.exceeds(0.001));
        assert!(!swap.exceeds(0.01));
    }

    #[test]
    fn test_fid_recipient() {
        assert_eq!(fid_recipient(42), "fid:42");
    }
}
