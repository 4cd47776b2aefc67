//! Attestation adapter for the EAS GraphQL indexer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::traits::*;

pub const DEFAULT_EAS_BASE_URL: &str = "https://base.easscan.org/graphql";

const ATTESTATIONS_QUERY: &str = r#"
query RecentAttestations($recipient: String!, $schemaIds: [String!]!, $since: Int!) {
  attestations(
    where: {
      recipient: { equals: $recipient }
      schemaId: { in: $schemaIds }
      timeCreated: { gte: $since }
    }
  ) {
    id
    schemaId
    timeCreated
  }
}
"#;

pub struct EasClient {
    client: Client,
    endpoint: String,
}

impl EasClient {
    pub fn new(endpoint: impl Into<String>) -> ProviderResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Client for the Base mainnet indexer.
    pub fn base() -> ProviderResult<Self> {
        Self::new(DEFAULT_EAS_BASE_URL)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<AttestationsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AttestationsData {
    #[serde(default)]
    attestations: Vec<AttestationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationRecord {
    id: String,
    schema_id: Option<String>,
    time_created: i64,
}

#[async_trait]
impl AttestationProvider for EasClient {
    fn id(&self) -> &str {
        "eas"
    }

    async fn query_attestations(
        &self,
        recipient: &str,
        schema_ids: &[String],
        since: DateTime<Utc>,
    ) -> ProviderResult<Vec<Attestation>> {
        debug!(recipient = recipient, schemas = schema_ids.len(), "eas query");

        let body = serde_json::json!({
            "query": ATTESTATIONS_QUERY,
            "variables": {
                "recipient": recipient,
                "schemaIds": schema_ids,
                "since": since.timestamp(),
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(first) = parsed.errors.first() {
            return Err(ProviderError::InvalidResponse(first.message.clone()));
        }

        let records = parsed.data.map(|d| d.attestations).unwrap_or_default();
        records
            .into_iter()
            .map(|r| {
                let time_created = DateTime::from_timestamp(r.time_created, 0).ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("bad timeCreated {}", r.time_created))
                })?;
                Ok(Attestation {
                    id: r.id,
                    schema_id: r.schema_id,
                    time_created,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_attestations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "variables": {"recipient": "fid:5", "schemaIds": ["0xs1"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"attestations": [
                    {"id": "0xa1", "schemaId": "0xs1", "timeCreated": 1756684800},
                    {"id": "0xa2", "schemaId": "0xs1", "timeCreated": 1756688400}
                ]}
            })))
            .mount(&server)
            .await;

        let client = EasClient::new(server.uri()).unwrap();
        let found = client
            .query_attestations(&fid_recipient(5), &["0xs1".to_string()], Utc::now())
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "0xa1");
    }

    #[tokio::test]
    async fn test_graphql_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{"message": "schema not found"}]
            })))
            .mount(&server)
            .await;

        let client = EasClient::new(server.uri()).unwrap();
        let err = client
            .query_attestations("fid:1", &[], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(m) if m == "schema not found"));
    }
}
