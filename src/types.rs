//! Core types for the payment agent

use crate::crypto::address;
use crate::error::{AgentError, ErrorKind};
use ethereum_types::{Address, H256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// HTTP status a resource uses to ask for payment
pub const PAYMENT_REQUIRED: u16 = 402;

/// Body of a 402 response as it arrives on the wire.
///
/// Every field is optional here so that a missing field surfaces as a
/// malformed challenge rather than a generic decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeBody {
    /// Amount in the token's smallest unit, as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// Token symbol, e.g. `USDC`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Address the payment goes to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Human-readable reason for the charge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `price` as sent by the resource: normally a string, tolerated as a JSON number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Text(String),
    Number(serde_json::Number),
}

impl ChallengeBody {
    /// Challenge body with a string price
    pub fn new(
        price: impl Into<String>,
        token: impl Into<String>,
        recipient: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            price: Some(Price::Text(price.into())),
            token: Some(token.into()),
            recipient: Some(recipient.into()),
            reason: Some(reason.into()),
        }
    }
}

/// Validated payment terms, consumed once by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstruction {
    /// Amount in the token's smallest unit, always greater than zero
    pub amount: U256,
    /// Symbol as configured in the accepted token list
    pub token_symbol: String,
    pub recipient: Address,
    pub reason: String,
}

impl PaymentInstruction {
    /// Recipient rendered with its EIP-55 checksum
    pub fn recipient_checksummed(&self) -> String {
        address::to_checksum(&self.recipient)
    }

    /// Amount in whole tokens, e.g. `1.000000` for 1000000 units at 6 decimals.
    ///
    /// Returns `None` when the amount does not fit a 96-bit decimal.
    pub fn display_amount(&self, decimals: u32) -> Option<Decimal> {
        if self.amount > U256::from(u128::MAX) {
            return None;
        }
        let units = i128::try_from(self.amount.as_u128()).ok()?;
        Decimal::try_from_i128_with_scale(units, decimals).ok()
    }
}

/// Outcome of parsing a resource response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Any status other than 402; carries the status code
    NoPaymentNeeded(u16),
    /// A valid 402 challenge
    PaymentRequired(PaymentInstruction),
}

/// Why a transfer did not confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub kind: ErrorKind,
    pub reason: String,
}

impl From<&AgentError> for TransferFailure {
    fn from(error: &AgentError) -> Self {
        Self {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Result of one payment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Hash of the submitted transaction, absent when nothing reached the ledger
    pub transaction_hash: Option<H256>,
    pub confirmed: bool,
    pub error: Option<TransferFailure>,
}

impl TransferResult {
    /// Included transfer
    pub fn confirmed(transaction_hash: H256) -> Self {
        Self {
            transaction_hash: Some(transaction_hash),
            confirmed: true,
            error: None,
        }
    }

    /// Failed transfer, with the hash if the transaction was broadcast
    pub fn failed(transaction_hash: Option<H256>, error: &AgentError) -> Self {
        Self {
            transaction_hash,
            confirmed: false,
            error: Some(TransferFailure::from(error)),
        }
    }

    /// `0x`-prefixed hash, or an empty string when there is none
    pub fn hash_hex(&self) -> String {
        self.transaction_hash
            .map(|hash| format!("{:?}", hash))
            .unwrap_or_default()
    }
}

/// Signed grant binding a signer to a delegate contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationAuthorization {
    pub delegate_contract: Address,
    /// 65-byte `r || s || v` signature
    pub signature: Vec<u8>,
    pub signer: Address,
}

impl DelegationAuthorization {
    /// `0x`-prefixed hex of the signature
    pub fn signature_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.signature))
    }
}

/// The two states of the agent loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Polling,
    Paying,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Polling => f.write_str("polling"),
            AgentState::Paying => f.write_str("paying"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_challenge_body_wire_names() {
        let body: ChallengeBody = serde_json::from_str(
            r#"{"price":"1000000","token":"USDC","recipient":"0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef","reason":"Payment required to access resource"}"#,
        )
        .unwrap();

        assert_eq!(body.price, Some(Price::Text("1000000".to_string())));
        assert_eq!(body.token.as_deref(), Some("USDC"));
        assert_eq!(body.reason.as_deref(), Some("Payment required to access resource"));
    }

    #[test]
    fn test_challenge_body_numeric_price() {
        let body: ChallengeBody = serde_json::from_str(r#"{"price":25}"#).unwrap();
        assert!(matches!(body.price, Some(Price::Number(_))));
        assert!(body.recipient.is_none());
    }

    #[test]
    fn test_display_amount() {
        let instruction = PaymentInstruction {
            amount: U256::from(1_000_000u64),
            token_symbol: "USDC".to_string(),
            recipient: Address::zero(),
            reason: String::new(),
        };
        assert_eq!(
            instruction.display_amount(6),
            Some(Decimal::from_str("1.000000").unwrap())
        );

        let huge = PaymentInstruction {
            amount: U256::MAX,
            ..instruction
        };
        assert_eq!(huge.display_amount(6), None);
    }

    #[test]
    fn test_transfer_result_constructors() {
        let hash = H256::repeat_byte(0xab);
        let ok = TransferResult::confirmed(hash);
        assert!(ok.confirmed);
        assert!(ok.error.is_none());
        assert_eq!(ok.hash_hex(), format!("0x{}", "ab".repeat(32)));

        let failed = TransferResult::failed(None, &AgentError::transfer_submission_failed("nonce too low"));
        assert!(!failed.confirmed);
        assert_eq!(failed.hash_hex(), "");
        let failure = failed.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::TransferSubmissionFailed);
        assert!(failure.reason.contains("nonce too low"));
    }
}
