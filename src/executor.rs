//! Payment execution: one token transfer per instruction
//!
//! The executor pays exactly the instructed amount to the instructed
//! recipient. It does not retry; a failed attempt is reported in the
//! returned [`TransferResult`] and retry policy is left to the caller.

use crate::identity::SigningIdentity;
use crate::ledger::transaction::LegacyTransaction;
use crate::ledger::{erc20, CallRequest, ConfirmationPolicy, LedgerClient};
use crate::types::{PaymentInstruction, TransferResult};
use crate::{AgentError, Result};
use ethereum_types::{Address, H256, U256};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Builds, signs and submits token transfers, then waits for inclusion
#[derive(Debug)]
pub struct PaymentExecutor {
    ledger: LedgerClient,
    token_contract: Address,
    chain_id: OnceCell<u64>,
    confirmation: ConfirmationPolicy,
}

impl PaymentExecutor {
    /// Create an executor paying with the token at `token_contract`.
    ///
    /// When `chain_id` is `None` it is fetched from the node on first use.
    pub fn new(
        ledger: LedgerClient,
        token_contract: Address,
        chain_id: Option<u64>,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            ledger,
            token_contract,
            chain_id: OnceCell::new_with(chain_id),
            confirmation,
        }
    }

    /// Underlying ledger client
    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    /// Token contract transfers are sent to
    pub fn token_contract(&self) -> Address {
        self.token_contract
    }

    /// Pay `instruction` from `identity` and wait for one confirmation
    pub async fn execute(
        &self,
        instruction: &PaymentInstruction,
        identity: &SigningIdentity,
    ) -> TransferResult {
        let hash = match self.submit(instruction, identity).await {
            Ok(hash) => hash,
            Err(e) => return TransferResult::failed(None, &e),
        };

        info!(hash = ?hash, "transfer submitted, waiting for confirmation");

        match self.ledger.wait_for_confirmation(hash, &self.confirmation).await {
            Ok(receipt) if receipt.is_reverted() => TransferResult::failed(
                Some(hash),
                &AgentError::transfer_submission_failed("transaction reverted"),
            ),
            Ok(receipt) => {
                debug!(hash = ?hash, block = ?receipt.block_number, "transfer included");
                TransferResult::confirmed(hash)
            }
            Err(e) => TransferResult::failed(Some(hash), &e),
        }
    }

    async fn submit(&self, instruction: &PaymentInstruction, identity: &SigningIdentity) -> Result<H256> {
        let from = identity.address();
        let data = erc20::encode_transfer(&instruction.recipient, instruction.amount);
        let request = CallRequest::new(Some(from), self.token_contract, &data);

        let output = self.ledger.call(&request).await.map_err(submission_error)?;
        if !erc20::decode_bool(&output)? {
            return Err(AgentError::transfer_submission_failed(
                "token transfer returned false",
            ));
        }

        let chain_id = *self
            .chain_id
            .get_or_try_init(|| self.ledger.chain_id())
            .await
            .map_err(submission_error)?;
        let nonce = self.ledger.nonce(from).await.map_err(submission_error)?;
        let gas_price = self.ledger.gas_price().await.map_err(submission_error)?;
        let gas_limit = self
            .ledger
            .estimate_gas(&request)
            .await
            .map_err(submission_error)?;

        let signed = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.token_contract,
            value: U256::zero(),
            data,
            chain_id,
        }
        .sign(identity);

        let reported = match self.ledger.send_raw_transaction(&signed.raw).await {
            Ok(hash) => hash,
            Err(AgentError::Rpc { ref message, .. }) if is_already_known(message) => {
                warn!(hash = ?signed.hash, "transfer already in the mempool, waiting on it again");
                signed.hash
            }
            Err(e) => return Err(submission_error(e)),
        };
        if reported != signed.hash {
            warn!(local = ?signed.hash, reported = ?reported, "node reported a different transaction hash");
        }

        Ok(reported)
    }
}

/// Node refusal for a transaction it already holds
fn is_already_known(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already known") || message.contains("known transaction")
}

/// Unreachable endpoints keep their kind; anything else the node says is a rejection
fn submission_error(error: AgentError) -> AgentError {
    match error {
        AgentError::TransportUnreachable { .. } | AgentError::TransferSubmissionFailed { .. } => error,
        AgentError::Rpc { message, .. } => AgentError::transfer_submission_failed(message),
        other => AgentError::transfer_submission_failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    fn rpc(server: &mut ServerGuard, method: &str, result: serde_json::Value) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": method})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string())
    }

    fn instruction() -> PaymentInstruction {
        PaymentInstruction {
            amount: U256::from(1_000_000u64),
            token_symbol: "USDC".to_string(),
            recipient: Address::repeat_byte(0xcf),
            reason: "test".to_string(),
        }
    }

    fn executor(url: String) -> PaymentExecutor {
        PaymentExecutor::new(
            LedgerClient::new(url, Duration::from_secs(5)).unwrap(),
            Address::repeat_byte(0x03),
            Some(84532),
            ConfirmationPolicy {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_millis(200),
            },
        )
    }

    #[test]
    fn test_submission_error_mapping() {
        let mapped = submission_error(AgentError::Rpc {
            code: -32000,
            message: "insufficient funds".to_string(),
        });
        assert!(matches!(mapped, AgentError::TransferSubmissionFailed { ref reason } if reason == "insufficient funds"));

        let mapped = submission_error(AgentError::transport_unreachable("connection refused"));
        assert_eq!(mapped.kind(), ErrorKind::TransportUnreachable);
    }

    #[tokio::test]
    async fn test_transfer_returning_false() {
        let mut server = Server::new_async().await;
        let _call = rpc(&mut server, "eth_call", json!(format!("0x{:064x}", 0)))
            .create_async()
            .await;
        let send = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_sendRawTransaction"})))
            .expect(0)
            .create_async()
            .await;

        let result = executor(server.url())
            .execute(&instruction(), &SigningIdentity::random())
            .await;

        assert!(!result.confirmed);
        assert!(result.transaction_hash.is_none());
        assert_eq!(result.error.unwrap().kind, ErrorKind::TransferSubmissionFailed);
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_node_keeps_transport_kind() {
        let result = executor("http://127.0.0.1:1".to_string())
            .execute(&instruction(), &SigningIdentity::random())
            .await;

        assert!(!result.confirmed);
        assert!(result.transaction_hash.is_none());
        assert_eq!(result.error.unwrap().kind, ErrorKind::TransportUnreachable);
    }

    #[tokio::test]
    async fn test_already_known_transfer_is_awaited() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for (method, result) in [
            ("eth_call", json!(format!("0x{:064x}", 1))),
            ("eth_getTransactionCount", json!("0x5")),
            ("eth_gasPrice", json!("0x3b9aca00")),
            ("eth_estimateGas", json!("0xea60")),
            (
                "eth_getTransactionReceipt",
                json!({"transactionHash": H256::repeat_byte(0x44), "blockNumber": "0x2", "status": "0x1"}),
            ),
        ] {
            mocks.push(rpc(&mut server, method, result).create_async().await);
        }
        let _send = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_sendRawTransaction"})))
            .with_status(200)
            .with_body(
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "already known"}})
                    .to_string(),
            )
            .create_async()
            .await;

        let identity = SigningIdentity::random();
        let expected = LegacyTransaction {
            nonce: U256::from(5),
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: U256::from(60_000u64),
            to: Address::repeat_byte(0x03),
            value: U256::zero(),
            data: erc20::encode_transfer(&instruction().recipient, instruction().amount),
            chain_id: 84532,
        }
        .sign(&identity);

        let result = executor(server.url()).execute(&instruction(), &identity).await;

        assert!(result.confirmed);
        assert_eq!(result.transaction_hash, Some(expected.hash));
    }

    #[test]
    fn test_already_known_messages() {
        assert!(is_already_known("already known"));
        assert!(is_already_known("Known transaction: 0xabc"));
        assert!(!is_already_known("nonce too low"));
    }

    #[tokio::test]
    async fn test_chain_id_fetched_once() {
        let mut server = Server::new_async().await;
        let hash = H256::repeat_byte(0x44);
        let mut mocks = Vec::new();
        for (method, result) in [
            ("eth_call", json!(format!("0x{:064x}", 1))),
            ("eth_getTransactionCount", json!("0x0")),
            ("eth_gasPrice", json!("0x3b9aca00")),
            ("eth_estimateGas", json!("0xea60")),
            ("eth_sendRawTransaction", json!(hash)),
            (
                "eth_getTransactionReceipt",
                json!({"transactionHash": hash, "blockNumber": "0x2", "status": "0x1"}),
            ),
        ] {
            mocks.push(rpc(&mut server, method, result).create_async().await);
        }
        let chain = rpc(&mut server, "eth_chainId", json!("0x1"))
            .expect(1)
            .create_async()
            .await;

        let executor = PaymentExecutor::new(
            LedgerClient::new(server.url(), Duration::from_secs(5)).unwrap(),
            Address::repeat_byte(0x03),
            None,
            ConfirmationPolicy::default(),
        );
        let identity = SigningIdentity::random();

        assert!(executor.execute(&instruction(), &identity).await.confirmed);
        assert!(executor.execute(&instruction(), &identity).await.confirmed);
        chain.assert_async().await;
    }
}
