//! reqwest-backed algod and indexer clients.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    AccountInformation, ApplicationResponse, NodeStatus, PendingTransaction, SubmitResponse,
    TransactionParams,
};
use super::{ClientLoader, IndexerApi, LedgerApi, LedgerFuture};
use crate::account::Address;
use crate::config::ClaimConfig;
use crate::error::{ClaimError, Result};
use crate::transaction::SuggestedParams;

const ALGOD_TOKEN_HEADER: &str = "X-Algo-API-Token";
const INDEXER_TOKEN_HEADER: &str = "X-Indexer-API-Token";

fn build_http_client(config: &ClaimConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(ClaimError::Network)
}

fn with_token(builder: RequestBuilder, header: &str, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.header(header, token),
        None => builder,
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Pull `message` out of an error body, falling back to the raw text.
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        return Err(ClaimError::Http {
            status: status.as_u16(),
            url,
            message: error_message(response).await,
        });
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClaimError::Decode(format!("{url}: {e}")))
}

// =============================================================================
// algod
// =============================================================================

/// Client for the live node REST API.
#[derive(Debug, Clone)]
pub struct AlgodClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl AlgodClient {
    pub fn new(config: &ClaimConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: trim_base_url(&config.algod_server),
            token: config.algod_token.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        with_token(builder, ALGOD_TOKEN_HEADER, self.token.as_deref())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "algod GET");
        let response = self.authorized(self.client.get(&url)).send().await?;
        read_json(response).await
    }
}

impl LedgerApi for AlgodClient {
    fn suggested_params(&self) -> LedgerFuture<'_, SuggestedParams> {
        Box::pin(async move {
            let params: TransactionParams =
                self.get_json("/v2/transactions/params".to_string()).await?;
            params.into_suggested()
        })
    }

    fn account_information(&self, address: Address) -> LedgerFuture<'_, AccountInformation> {
        Box::pin(async move { self.get_json(format!("/v2/accounts/{address}")).await })
    }

    fn send_raw_transaction(&self, payload: Vec<u8>) -> LedgerFuture<'_, String> {
        Box::pin(async move {
            let url = format!("{}/v2/transactions", self.base_url);
            tracing::debug!(%url, bytes = payload.len(), "algod POST");
            let response = self
                .authorized(self.client.post(&url))
                .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
                .body(payload)
                .send()
                .await?;
            if response.status().is_client_error() {
                return Err(ClaimError::TransactionRejected(
                    error_message(response).await,
                ));
            }
            let submitted: SubmitResponse = read_json(response).await?;
            Ok(submitted.tx_id)
        })
    }

    fn pending_transaction(&self, txid: &str) -> LedgerFuture<'_, PendingTransaction> {
        let path = format!("/v2/transactions/pending/{txid}");
        Box::pin(async move { self.get_json(path).await })
    }

    fn status(&self) -> LedgerFuture<'_, NodeStatus> {
        Box::pin(async move { self.get_json("/v2/status".to_string()).await })
    }

    fn status_after_block(&self, round: u64) -> LedgerFuture<'_, NodeStatus> {
        Box::pin(async move {
            self.get_json(format!("/v2/status/wait-for-block-after/{round}"))
                .await
        })
    }
}

// =============================================================================
// indexer
// =============================================================================

/// Client for the indexer REST API.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl IndexerClient {
    pub fn new(config: &ClaimConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: trim_base_url(&config.indexer_server),
            token: config.indexer_token.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        with_token(builder, INDEXER_TOKEN_HEADER, self.token.as_deref())
    }
}

impl IndexerApi for IndexerClient {
    fn lookup_application(&self, app_id: u64) -> LedgerFuture<'_, ApplicationResponse> {
        Box::pin(async move {
            let url = format!("{}/v2/applications/{app_id}", self.base_url);
            tracing::debug!(%url, "indexer GET");
            let response = self.authorized(self.client.get(&url)).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(ApplicationResponse::default());
            }
            read_json(response).await
        })
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Builds new HTTP clients from static configuration. No network I/O happens
/// until a client is used.
#[derive(Debug, Clone)]
pub struct HttpClientLoader {
    config: ClaimConfig,
}

impl HttpClientLoader {
    pub fn new(config: ClaimConfig) -> Self {
        Self { config }
    }
}

impl ClientLoader for HttpClientLoader {
    type Ledger = AlgodClient;
    type Indexer = IndexerClient;

    fn ledger(&self) -> Result<AlgodClient> {
        AlgodClient::new(&self.config)
    }

    fn indexer(&self) -> Result<IndexerClient> {
        IndexerClient::new(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_creates_clients_without_network() {
        let loader = HttpClientLoader::new(ClaimConfig::default());
        assert!(loader.ledger().is_ok());
        assert!(loader.indexer().is_ok());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ClaimConfig {
            algod_server: "http://localhost:4001/".to_string(),
            ..ClaimConfig::default()
        };
        let client = AlgodClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:4001");
    }
}
