//! Chain data adapter for the Alchemy indexing API.
//!
//! Transfers and token balances go through the JSON-RPC endpoint at
//! `{base}/v2/{key}`; NFTs through the REST `getNFTs` route. Verified
//! addresses are resolved through an [`AddressDirectory`], normally the
//! social graph client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use notch_core::Fid;

use crate::neynar::NeynarClient;
use crate::traits::*;

pub const DEFAULT_BASE_MAINNET_URL: &str = "https://base-mainnet.g.alchemy.com";

/// Source of the addresses a user has verified.
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    async fn verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>>;
}

#[async_trait]
impl AddressDirectory for NeynarClient {
    async fn verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>> {
        NeynarClient::verified_addresses(self, fid).await
    }
}

/// Alchemy client for a single network.
pub struct AlchemyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    network: String,
    directory: Arc<dyn AddressDirectory>,
}

impl AlchemyClient {
    pub fn new(
        base_url: impl Into<String>,
        network: impl Into<String>,
        api_key: Option<String>,
        directory: Arc<dyn AddressDirectory>,
    ) -> ProviderResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            network: network.into(),
            directory,
        })
    }

    /// Client for Base mainnet.
    pub fn base_mainnet(
        api_key: impl Into<String>,
        directory: Arc<dyn AddressDirectory>,
    ) -> ProviderResult<Self> {
        Self::new(DEFAULT_BASE_MAINNET_URL, "base", Some(api_key.into()), directory)
    }

    fn endpoint(&self) -> ProviderResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("alchemy api key".to_string()))?;
        Ok(format!("{}/v2/{}", self.base_url, key))
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ProviderResult<T> {
        let url = self.endpoint()?;
        debug!(method = method, network = %self.network, "alchemy rpc");

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        match (envelope.result, envelope.error) {
            (_, Some(err)) => Err(ProviderError::InvalidResponse(format!(
                "rpc error {}: {}",
                err.code, err.message
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ProviderError::InvalidResponse(
                "rpc response without result".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransfersResult {
    #[serde(default)]
    transfers: Vec<TransferRecord>,
}

#[derive(Debug, Deserialize)]
struct TransferRecord {
    hash: Option<String>,
    #[serde(default)]
    from: String,
    to: Option<String>,
    value: Option<f64>,
    asset: Option<String>,
    metadata: Option<TransferMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMetadata {
    block_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    #[serde(default)]
    token_balances: Vec<TokenBalanceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalanceRecord {
    contract_address: String,
    #[serde(default)]
    token_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedNftsResponse {
    #[serde(default)]
    owned_nfts: Vec<NftRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftRecord {
    contract: NftContract,
    id: NftId,
}

#[derive(Debug, Deserialize)]
struct NftContract {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftId {
    token_id: String,
}

#[async_trait]
impl ChainProvider for AlchemyClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn fetch_verified_addresses(&self, fid: Fid) -> ProviderResult<Vec<String>> {
        self.directory.verified_addresses(fid).await
    }

    async fn fetch_asset_transfers(
        &self,
        address: &str,
        filter: &TransferFilter,
    ) -> ProviderResult<Vec<Transfer>> {
        let params = serde_json::json!([{
            "fromAddress": address,
            "category": ["external", "internal"],
            "maxCount": format!("{:#x}", filter.max_count),
            "order": "desc",
            "withMetadata": true,
        }]);

        let result: TransfersResult = self.rpc("alchemy_getAssetTransfers", params).await?;

        Ok(result
            .transfers
            .into_iter()
            .map(|t| Transfer {
                hash: t.hash,
                from: t.from,
                to: t.to,
                value: t.value,
                asset: t.asset,
                timestamp: t.metadata.and_then(|m| m.block_timestamp),
            })
            .collect())
    }

    async fn fetch_token_balances(&self, address: &str) -> ProviderResult<Vec<TokenBalance>> {
        let params = serde_json::json!([address, "erc20"]);
        let result: TokenBalancesResult = self.rpc("alchemy_getTokenBalances", params).await?;

        Ok(result
            .token_balances
            .into_iter()
            .map(|b| TokenBalance {
                contract_address: b.contract_address,
                balance: b.token_balance.unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_owned_nfts(&self, address: &str) -> ProviderResult<Vec<OwnedNft>> {
        let url = format!("{}/getNFTs", self.endpoint()?);

        let response = self
            .client
            .get(&url)
            .query(&[("owner", address)])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let body: OwnedNftsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(body
            .owned_nfts
            .into_iter()
            .map(|n| OwnedNft {
                contract_address: n.contract.address,
                token_id: n.id.token_id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedDirectory(Vec<String>);

    #[async_trait]
    impl AddressDirectory for FixedDirectory {
        async fn verified_addresses(&self, _fid: Fid) -> ProviderResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn client(uri: String) -> AlchemyClient {
        AlchemyClient::new(
            uri,
            "base",
            Some("key".into()),
            Arc::new(FixedDirectory(vec!["0xaaa".into()])),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_asset_transfers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/key"))
            .and(body_partial_json(serde_json::json!({
                "method": "alchemy_getAssetTransfers",
                "params": [{"fromAddress": "0xaaa", "maxCount": "0x14"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"transfers": [
                    {"hash": "0x1", "from": "0xaaa", "to": null, "value": null, "asset": "ETH",
                     "metadata": {"blockTimestamp": "2025-09-01T00:00:00.000Z"}},
                    {"hash": "0x2", "from": "0xaaa", "to": "0xbbb", "value": 0.5, "asset": "ETH"}
                ]}
            })))
            .mount(&server)
            .await;

        let transfers = client(server.uri())
            .fetch_asset_transfers("0xaaa", &TransferFilter::default())
            .await
            .unwrap();

        assert_eq!(transfers.len(), 2);
        assert!(transfers[0].is_contract_creation());
        assert!(transfers[0].timestamp.is_some());
        assert!(transfers[1].exceeds(0.001));
    }

    #[tokio::test]
    async fn test_rpc_error_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": -32602, "message": "bad params"}
            })))
            .mount(&server)
            .await;

        let err = client(server.uri())
            .fetch_token_balances("0xaaa")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_owned_nfts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/key/getNFTs"))
            .and(query_param("owner", "0xaaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ownedNfts": [{"contract": {"address": "0xnft"}, "id": {"tokenId": "0x01"}}]
            })))
            .mount(&server)
            .await;

        let nfts = client(server.uri()).fetch_owned_nfts("0xaaa").await.unwrap();
        assert_eq!(nfts.len(), 1);
        assert_eq!(nfts[0].contract_address, "0xnft");
    }

    #[tokio::test]
    async fn test_addresses_come_from_directory() {
        let client = client("http://127.0.0.1:9".into());
        assert_eq!(client.fetch_verified_addresses(1).await.unwrap(), vec!["0xaaa"]);
    }
}
