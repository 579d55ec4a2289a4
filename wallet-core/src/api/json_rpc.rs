//! JSON-RPC adapter for nodes exposing the wallet query surface
//!
//! Implements the account, transaction and network namespaces of the
//! network API over HTTP JSON-RPC. Node URLs come from the network
//! properties of each call, so one client serves every configured network.

use crate::account::WalletAccount;
use crate::api::types::{
    AccountInfo, NetworkProperties, SignedTransaction, TransactionQuery, TransactionRecord,
    TransactionStatus,
};
use crate::api::{AccountApi, NetworkInfoApi, TransactionApi};
use crate::errors::{ApiErrorCode, WalletError, WalletResult};
use crate::security::SecurityConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client for node RPC communication
pub struct JsonRpcClient {
    client: Client,
    /// Service that knows the candidate node list of every network.
    statistics_url: String,
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: String,
    method: String,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // fields are populated via serde; not all are read by all call sites
struct JsonRpcResponse<T> {
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    id: u64,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcClient {
    /// Create a new client
    pub fn new(statistics_url: impl Into<String>, timeout: Duration) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::network(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(JsonRpcClient {
            client,
            statistics_url: statistics_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client using the configured statistics service and request timeout.
    pub fn from_config(config: &SecurityConfig) -> WalletResult<Self> {
        let statistics_url = config.statistics_url().ok_or_else(|| {
            WalletError::ValidationError("No statistics service URL configured".to_string())
        })?;
        Self::new(statistics_url, config.request_timeout()?)
    }

    /// Make a JSON-RPC call to a node
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        base_url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> WalletResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let url = format!("{}/jsonrpc", base_url.trim_end_matches('/'));
        log::debug!("RPC {} -> {}", method, url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::network(None, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::network(
                Some(status.as_u16()),
                format!("HTTP error calling {}: {}", method, status),
            ));
        }

        let rpc_response: JsonRpcResponse<T> = response.json().await.map_err(|e| {
            WalletError::api(
                ApiErrorCode::InvalidResponse,
                format!("Failed to parse response: {}", e),
            )
        })?;

        if let Some(error) = rpc_response.error {
            return Err(WalletError::api(
                ApiErrorCode::InvalidResponse,
                format!("RPC error {}: {}", error.code, error.message),
            ));
        }

        rpc_response.result.ok_or_else(|| {
            WalletError::api(
                ApiErrorCode::InvalidResponse,
                "No result in RPC response".to_string(),
            )
        })
    }
}

#[async_trait]
impl AccountApi for JsonRpcClient {
    async fn fetch_account_info(
        &self,
        properties: &NetworkProperties,
        address: &str,
    ) -> WalletResult<AccountInfo> {
        let params = serde_json::json!({ "address": address });
        self.rpc_call(&properties.node_url, "account_info", params)
            .await
    }
}

#[async_trait]
impl TransactionApi for JsonRpcClient {
    async fn fetch_account_transactions(
        &self,
        properties: &NetworkProperties,
        account: &WalletAccount,
        query: &TransactionQuery,
    ) -> WalletResult<Vec<TransactionRecord>> {
        let params = serde_json::json!({
            "address": account.address,
            "group": query.group,
            "filter": query.filter,
            "pageNumber": query.page_number,
            "pageSize": query.page_size
        });
        self.rpc_call(&properties.node_url, "account_transactions", params)
            .await
    }

    async fn fetch_transaction_status(
        &self,
        properties: &NetworkProperties,
        hash: &str,
    ) -> WalletResult<TransactionStatus> {
        let params = serde_json::json!({ "hash": hash });
        self.rpc_call(&properties.node_url, "transaction_status", params)
            .await
    }

    async fn announce_transaction(
        &self,
        properties: &NetworkProperties,
        transaction: &SignedTransaction,
    ) -> WalletResult<()> {
        let params = serde_json::json!({ "payload": transaction.payload });
        let response: serde_json::Value = self
            .rpc_call(&properties.node_url, "announce_transaction", params)
            .await
            .map_err(announce_error)?;
        log::debug!("Announced {}: {}", transaction.hash, response);
        Ok(())
    }

    async fn announce_transaction_bundle(
        &self,
        properties: &NetworkProperties,
        transactions: &[SignedTransaction],
    ) -> WalletResult<()> {
        let payloads: Vec<&str> = transactions.iter().map(|tx| tx.payload.as_str()).collect();
        let params = serde_json::json!({ "payloads": payloads });
        let _: serde_json::Value = self
            .rpc_call(&properties.node_url, "announce_transaction_bundle", params)
            .await
            .map_err(announce_error)?;
        Ok(())
    }
}

#[async_trait]
impl NetworkInfoApi for JsonRpcClient {
    async fn fetch_network_properties(&self, node_url: &str) -> WalletResult<NetworkProperties> {
        let mut properties: NetworkProperties = self
            .rpc_call(node_url, "network_properties", serde_json::Value::Null)
            .await?;
        properties.node_url = node_url.trim_end_matches('/').to_string();
        Ok(properties)
    }

    async fn ping_node(&self, node_url: &str) -> WalletResult<()> {
        let _: serde_json::Value = self
            .rpc_call(node_url, "node_health", serde_json::Value::Null)
            .await?;
        Ok(())
    }

    async fn fetch_node_list(&self, network_identifier: &str) -> WalletResult<Vec<String>> {
        let params = serde_json::json!({ "networkIdentifier": network_identifier });
        self.rpc_call(&self.statistics_url, "node_list", params)
            .await
    }
}

fn announce_error(error: WalletError) -> WalletError {
    match error {
        WalletError::Api { message, .. } => WalletError::api(ApiErrorCode::AnnounceFailed, message),
        other => other,
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires running RPC server at localhost:3000"]
    async fn test_real_ping_and_properties() {
        let client =
            JsonRpcClient::new("http://localhost:3000", Duration::from_secs(5)).unwrap();
        assert!(client.ping_node("http://localhost:3000").await.is_ok());
        let properties = client
            .fetch_network_properties("http://localhost:3000")
            .await
            .unwrap();
        assert_eq!(properties.node_url, "http://localhost:3000");
    }

    #[test]
    fn config_without_statistics_url_is_rejected() {
        let config = SecurityConfig::new(crate::security::Environment::Test);
        assert!(matches!(
            JsonRpcClient::from_config(&config),
            Err(WalletError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_node_reports_request_error() {
        let client = JsonRpcClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.ping_node("http://127.0.0.1:9").await.unwrap_err();
        assert_eq!(err.code(), "NETWORK_REQUEST_ERROR");
    }
}
