//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to the three endpoints the quest checkers
//! need: current height, log filtering and transaction lookup.
//! Timeouts belong to the HTTP client, not to the checkers.

use crate::types::{Log, LogFilter, Transaction};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Read-only view of a chain, injected into every checker.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// EIP-155 id of the chain the reader is connected to.
    async fn chain_id(&self) -> Result<u64>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64>;

    /// Logs matching `filter`, in the order the node returns them.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

    /// Transaction by hash. Errors if the node does not know it.
    async fn get_transaction(&self, hash: B256) -> Result<Transaction>;
}

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Create a client whose requests fail after `timeout`.
    pub fn with_timeout(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error from {}: {}", method, error);
        }

        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let result = self.call("eth_chainId", json!([])).await?;
        let id_str = result.as_str().context("Chain id response is not a string")?;
        parse_quantity(id_str).context("Failed to parse chain id")
    }

    async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let number_str = result
            .as_str()
            .context("Block number response is not a string")?;
        parse_quantity(number_str).context("Failed to parse block number")
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let result = self.call("eth_getLogs", json!([filter.to_params()])).await?;
        serde_json::from_value(result).context("Failed to deserialize logs")
    }

    async fn get_transaction(&self, hash: B256) -> Result<Transaction> {
        let hash_str = format!("0x{:x}", hash);
        let result = self
            .call("eth_getTransactionByHash", json!([hash_str]))
            .await?;
        if result.is_null() {
            anyhow::bail!("Transaction {} not found", hash_str);
        }
        serde_json::from_value(result).context("Failed to deserialize transaction")
    }
}

/// Parse a hex quantity ("0x1a") into a u64.
fn parse_quantity(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        anyhow::bail!("Quantity is empty");
    }
    u64::from_str_radix(s, 16).with_context(|| format!("Invalid hex quantity: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0xb2bc99").unwrap(), 11713689);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_client_keeps_url() {
        let client = RpcClient::new("http://127.0.0.1:8545".to_string());
        assert_eq!(client.url(), "http://127.0.0.1:8545");
    }
}
