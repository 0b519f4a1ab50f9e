//! Delegation authorization signing
//!
//! A delegation grants a contract the right to act for a signing identity.
//! The signed message is the tag bytes followed by the 20 contract address
//! bytes, tightly packed. Its Keccak-256 hash is signed as a personal
//! message, so wallets and contracts can check it with `ecrecover` over the
//! prefixed hash.

use crate::config::DelegationConfig;
use crate::crypto::{address, keccak256, signature};
use crate::identity::SigningIdentity;
use crate::types::DelegationAuthorization;
use crate::Result;
use ethereum_types::{Address, H256};
use tracing::info;

/// Domain tag prefixed to every delegation message
pub const DELEGATION_TAG: &str = "EIP7702_DELEGATION";

/// Packed `tag || address` message for `delegate_contract`
pub fn delegation_message(delegate_contract: &Address) -> Vec<u8> {
    let mut message = Vec::with_capacity(DELEGATION_TAG.len() + 20);
    message.extend_from_slice(DELEGATION_TAG.as_bytes());
    message.extend_from_slice(delegate_contract.as_bytes());
    message
}

/// Keccak-256 of [`delegation_message`]
pub fn delegation_hash(delegate_contract: &Address) -> H256 {
    H256::from(keccak256(&delegation_message(delegate_contract)))
}

/// Signs delegation grants for one delegate contract
#[derive(Debug, Clone)]
pub struct DelegationSigner {
    config: DelegationConfig,
}

impl DelegationSigner {
    pub fn new(config: DelegationConfig) -> Self {
        Self { config }
    }

    /// Contract the grant is for
    pub fn delegate_contract(&self) -> Address {
        self.config.delegate_contract
    }

    /// Sign a grant with `identity`
    pub fn sign(&self, identity: &SigningIdentity) -> DelegationAuthorization {
        let hash = delegation_hash(&self.config.delegate_contract);
        let signature = identity.sign_personal_message(hash.as_bytes());

        info!(
            delegate = %address::to_checksum(&self.config.delegate_contract),
            signer = %address::to_checksum(&identity.address()),
            "Delegation signed"
        );

        DelegationAuthorization {
            delegate_contract: self.config.delegate_contract,
            signature: signature.to_bytes().to_vec(),
            signer: identity.address(),
        }
    }

    /// Load the key from `private_key_env` and sign.
    ///
    /// Fails with [`crate::AgentError::SigningUnavailable`] when the key is
    /// missing or unusable.
    pub fn sign_from_env(&self, private_key_env: &str) -> Result<DelegationAuthorization> {
        let identity = SigningIdentity::from_env(private_key_env)?;
        Ok(self.sign(&identity))
    }
}

impl DelegationAuthorization {
    /// Whether the signature was produced by `expected` over this grant
    pub fn verify(&self, expected: Address) -> Result<bool> {
        let hash = signature::hash_personal_message(delegation_hash(&self.delegate_contract).as_bytes());
        signature::verify(hash, &self.signature, expected)
    }
}
