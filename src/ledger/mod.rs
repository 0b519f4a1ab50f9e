//! Ledger RPC client
//!
//! Thin JSON-RPC 2.0 wrapper over the handful of node methods the agent needs:
//! - chain id, nonce, gas price and gas estimation for building a transfer
//! - `eth_call` for the pre-flight and balance reads
//! - raw transaction submission and receipt polling

pub mod erc20;
pub mod transaction;

use crate::{AgentError, Result};
use ethereum_types::{Address, H256, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long to wait for inclusion, and how often to ask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Call or gas-estimation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    /// `0x`-prefixed calldata
    pub data: String,
}

impl CallRequest {
    /// Request for `to` with raw calldata
    pub fn new(from: Option<Address>, to: Address, data: &[u8]) -> Self {
        Self {
            from,
            to,
            data: format!("0x{}", hex::encode(data)),
        }
    }
}

/// Receipt fields the agent reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_number: Option<U256>,
    /// `1` on success, `0` when the call reverted
    #[serde(default)]
    pub status: Option<U256>,
}

impl TransactionReceipt {
    /// Whether the transaction is in a block
    pub fn is_included(&self) -> bool {
        self.block_number.is_some()
    }

    /// Whether execution reverted
    pub fn is_reverted(&self) -> bool {
        self.status.map(|status| status.is_zero()).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for one ledger endpoint
#[derive(Debug)]
pub struct LedgerClient {
    /// RPC endpoint URL
    rpc_url: String,
    /// HTTP client for RPC calls
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl LedgerClient {
    /// Create a new ledger client
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this client talks to
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id
            }))
            .send()
            .await
            .map_err(AgentError::from_transport)?;

        if !response.status().is_success() {
            return Err(AgentError::transport_unreachable(format!(
                "RPC endpoint answered {} to {}",
                response.status(),
                method
            )));
        }

        let body = response.bytes().await.map_err(AgentError::from_transport)?;
        let envelope: RpcResponse = serde_json::from_slice(&body)?;

        if let Some(error) = envelope.error {
            return Err(AgentError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result).map_err(|e| AgentError::Rpc {
            code: 0,
            message: format!("unexpected result for {}: {}", method, e),
        })
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64> {
        let chain_id: U256 = self.request("eth_chainId", serde_json::json!([])).await?;
        to_u64(chain_id, "chain id")
    }

    /// Next nonce for `address` as of the latest block.
    ///
    /// Pending transactions are not counted: a transfer still waiting in the
    /// mempool keeps its nonce, so a later payment from the same account
    /// replaces it instead of landing alongside it.
    pub async fn nonce(&self, address: Address) -> Result<U256> {
        self.request(
            "eth_getTransactionCount",
            serde_json::json!([address, "latest"]),
        )
        .await
    }

    /// `eth_gasPrice`
    pub async fn gas_price(&self) -> Result<U256> {
        self.request("eth_gasPrice", serde_json::json!([])).await
    }

    /// `eth_estimateGas`
    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<U256> {
        self.request("eth_estimateGas", serde_json::json!([request])).await
    }

    /// `eth_call` against the latest block, returning the raw output
    pub async fn call(&self, request: &CallRequest) -> Result<Vec<u8>> {
        let output: String = self
            .request("eth_call", serde_json::json!([request, "latest"]))
            .await?;
        hex::decode(output.trim_start_matches("0x")).map_err(|_| AgentError::Rpc {
            code: 0,
            message: "eth_call returned invalid hex".to_string(),
        })
    }

    /// Submit signed bytes; returns the hash the node reports
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256> {
        self.request(
            "eth_sendRawTransaction",
            serde_json::json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    /// Receipt for `hash`, or `None` while it is still pending
    pub async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", serde_json::json!([hash]))
            .await
    }

    /// Poll until `hash` is included in a block.
    ///
    /// One confirmation is enough. Errors while polling are logged and
    /// retried until the policy's timeout runs out, since the transaction is
    /// already out of the agent's hands.
    pub async fn wait_for_confirmation(
        &self,
        hash: H256,
        policy: &ConfirmationPolicy,
    ) -> Result<TransactionReceipt> {
        let started = Instant::now();

        loop {
            match self.transaction_receipt(hash).await {
                Ok(Some(receipt)) if receipt.is_included() => return Ok(receipt),
                Ok(_) => debug!(hash = ?hash, "transaction pending"),
                Err(e) => warn!(hash = ?hash, error = %e, "receipt query failed"),
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                return Err(AgentError::TransferConfirmationTimeout {
                    hash: format!("{:?}", hash),
                    waited_secs: elapsed.as_secs(),
                });
            }
            tokio::time::sleep(policy.poll_interval.min(policy.timeout - elapsed)).await;
        }
    }

    /// Token balance of `owner` via `balanceOf`
    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let request = CallRequest::new(None, token, &erc20::encode_balance_of(&owner));
        let output = self.call(&request).await?;
        erc20::decode_uint(&output)
    }
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(AgentError::Rpc {
            code: 0,
            message: format!("{} {} does not fit 64 bits", what, value),
        });
    }
    Ok(value.low_u64())
}
