//! Social graph adapter for the Neynar Farcaster API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use notch_core::Fid;

use crate::traits::*;

pub const DEFAULT_NEYNAR_URL: &str = "https://api.neynar.com";

/// Neynar v2 client.
///
/// Without an API key every call fails with [`ProviderError::NotConfigured`].
pub struct NeynarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NeynarClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ProviderResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Client against the public Neynar endpoint.
    pub fn hosted(api_key: impl Into<String>) -> ProviderResult<Self> {
        Self::new(DEFAULT_NEYNAR_URL, Some(api_key.into()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("neynar api key".to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "neynar request");

        let response = self
            .client
            .get(&url)
            .header("api_key", api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Ethereum addresses the user has verified on their profile.
    pub async fn verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>> {
        let body: BulkUsersResponse = self
            .get_json("/v2/farcaster/user/bulk", &[("fids", fid.to_string())])
            .await?;

        Ok(body
            .users
            .into_iter()
            .next()
            .map(|u| u.verified_addresses.eth_addresses)
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct CastsResponse {
    #[serde(default)]
    casts: Vec<CastRecord>,
}

#[derive(Debug, Deserialize)]
struct CastRecord {
    hash: Option<String>,
    #[serde(default)]
    text: String,
    timestamp: DateTime<Utc>,
    parent_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionsResponse {
    #[serde(default)]
    reactions: Vec<ReactionRecord>,
}

#[derive(Debug, Deserialize)]
struct ReactionRecord {
    #[serde(alias = "reaction_timestamp")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct BulkUsersResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(default)]
    verified_addresses: VerifiedAddresses,
}

#[derive(Debug, Default, Deserialize)]
struct VerifiedAddresses {
    #[serde(default)]
    eth_addresses: Vec<String>,
}

#[async_trait]
impl SocialProvider for NeynarClient {
    fn id(&self) -> &str {
        "neynar"
    }

    async fn fetch_recent_posts(&self, fid: Fid, limit: u32) -> ProviderResult<Vec<Post>> {
        let body: CastsResponse = self
            .get_json(
                "/v2/farcaster/casts",
                &[("fid", fid.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        Ok(body
            .casts
            .into_iter()
            .map(|c| Post {
                hash: c.hash,
                text: c.text,
                timestamp: c.timestamp,
                parent_id: c.parent_hash,
            })
            .collect())
    }

    async fn fetch_recent_reactions(
        &self,
        fid: Fid,
        kind: ReactionKind,
        limit: u32,
    ) -> ProviderResult<Vec<Reaction>> {
        let body: ReactionsResponse = self
            .get_json(
                "/v2/farcaster/reactions",
                &[
                    ("fid", fid.to_string()),
                    ("reaction_type", kind.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(body
            .reactions
            .into_iter()
            .map(|r| Reaction {
                kind,
                timestamp: r.timestamp,
            })
            .collect())
    }
}
