//! # x402-agent - paying HTTP 402 challenges on-chain
//!
//! An autonomous client for pay-per-request resources. The agent polls a
//! resource; when it answers `402 Payment Required` with machine-readable
//! terms, the agent pays them with an ERC-20 transfer, waits for one
//! confirmation and goes back to polling.
//!
//! A separate [`delegation`] utility signs grants that let a contract act on
//! behalf of a signing identity.

pub mod agent;
pub mod challenge;
pub mod config;
pub mod crypto;
pub mod delegation;
pub mod error;
pub mod executor;
pub mod identity;
pub mod ledger;
pub mod types;

#[cfg(feature = "axum")]
pub mod stub;

// Re-exports for convenience
pub use agent::{Agent, AgentHandle, CycleOutcome};
pub use challenge::ChallengeParser;
pub use config::{AgentConfig, DelegationConfig};
pub use delegation::{DelegationSigner, DELEGATION_TAG};
pub use error::{AgentError, ErrorKind, Result};
pub use executor::PaymentExecutor;
pub use identity::SigningIdentity;
pub use ledger::{ConfirmationPolicy, LedgerClient};
pub use types::*;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_scenario_challenge_parses() {
        let parser = ChallengeParser::new(["USDC"]);
        let body = serde_json::to_vec(&ChallengeBody::new(
            "1000000",
            "USDC",
            "0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef",
            "test",
        ))
        .unwrap();

        match parser.parse(PAYMENT_REQUIRED, &body).unwrap() {
            Challenge::PaymentRequired(instruction) => {
                assert_eq!(instruction.amount, ethereum_types::U256::from(1_000_000u64));
                assert_eq!(instruction.token_symbol, "USDC");
                assert_eq!(
                    instruction.recipient_checksummed(),
                    "0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef"
                );
            }
            other => panic!("expected a payment instruction, got {:?}", other),
        }
    }
}
