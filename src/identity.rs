//! Signing identity backed by a secp256k1 private key
//!
//! The key is loaded once at process start and only ever used through
//! [`SigningIdentity::sign_hash`] and [`SigningIdentity::sign_personal_message`].
//! It is never serialized, and the `Debug` output carries the address only.

use crate::crypto::{address, signature::hash_personal_message};
use crate::{AgentError, Result};
use ethereum_types::{Address, H256};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};

/// Private key plus its derived ledger address
pub struct SigningIdentity {
    secret: SecretKey,
    address: Address,
}

/// Recoverable ECDSA signature split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    /// Raw recovery id, 0 or 1
    pub recovery_id: u8,
}

impl Signature {
    /// 65-byte `r || s || v` encoding with `v = 27 + recovery_id`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(self.r.as_bytes());
        bytes[32..64].copy_from_slice(self.s.as_bytes());
        bytes[64] = 27 + self.recovery_id;
        bytes
    }

    /// `0x`-prefixed hex of [`Signature::to_bytes`]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

impl SigningIdentity {
    /// Load an identity from 32 bytes of hex, with or without a `0x` prefix
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let hex_key = private_key.trim();
        let hex_key = hex_key.strip_prefix("0x").unwrap_or(hex_key);

        if hex_key.len() != 64 {
            return Err(AgentError::signing_unavailable(
                "Invalid private key format. Must be 64 hex characters",
            ));
        }

        let bytes = hex::decode(hex_key)
            .map_err(|_| AgentError::signing_unavailable("Invalid hex in private key"))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| AgentError::signing_unavailable("Private key is not a valid secp256k1 scalar"))?;

        Ok(Self::from_secret(secret))
    }

    /// Load an identity from the named environment variable
    pub fn from_env(private_key_env: &str) -> Result<Self> {
        let private_key = std::env::var(private_key_env).map_err(|_| {
            AgentError::signing_unavailable(format!(
                "Environment variable {} not found",
                private_key_env
            ))
        })?;

        Self::from_private_key(&private_key)
    }

    /// Fresh identity with a random key
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        loop {
            rand::thread_rng().fill_bytes(&mut bytes);
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                return Self::from_secret(secret);
            }
        }
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret);
        let hash = crate::crypto::keccak256(&public_key.serialize_uncompressed()[1..]);
        Self {
            secret,
            address: Address::from_slice(&hash[12..]),
        }
    }

    /// Address derived from the key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest as is
    pub fn sign_hash(&self, hash: H256) -> Signature {
        let message = Message::from_digest(hash.0);
        let recoverable = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = recoverable.serialize_compact();

        Signature {
            r: H256::from_slice(&compact[0..32]),
            s: H256::from_slice(&compact[32..64]),
            recovery_id: recovery_id.to_i32() as u8,
        }
    }

    /// Sign `message` with the personal-message prefix applied
    pub fn sign_personal_message(&self, message: &[u8]) -> Signature {
        self.sign_hash(hash_personal_message(message))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &address::to_checksum(&self.address))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature::{recover_address, verify};

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_address_derivation() {
        let identity = SigningIdentity::from_private_key(TEST_KEY).unwrap();
        assert_eq!(
            address::to_checksum(&identity.address()),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );

        let unprefixed = SigningIdentity::from_private_key(&TEST_KEY[2..]).unwrap();
        assert_eq!(unprefixed.address(), identity.address());
    }

    #[test]
    fn test_invalid_keys() {
        for key in [
            "",
            "0x123",
            "0xgggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggg",
            "0x0000000000000000000000000000000000000000000000000000000000000000",
        ] {
            let error = SigningIdentity::from_private_key(key).unwrap_err();
            assert!(
                matches!(error, AgentError::SigningUnavailable { .. }),
                "expected SigningUnavailable for {:?}, got {:?}",
                key,
                error
            );
        }
    }

    #[test]
    fn test_missing_env_var() {
        let error = SigningIdentity::from_env("X402_AGENT_TEST_KEY_THAT_IS_NOT_SET").unwrap_err();
        assert!(error.to_string().contains("X402_AGENT_TEST_KEY_THAT_IS_NOT_SET"));
    }

    #[test]
    fn test_sign_and_recover() {
        let identity = SigningIdentity::random();
        let hash = H256::from(crate::crypto::keccak256(b"payment"));
        let signature = identity.sign_hash(hash);

        assert!(signature.recovery_id <= 1);
        assert_eq!(
            recover_address(hash, &signature.to_bytes()).unwrap(),
            identity.address()
        );
    }

    #[test]
    fn test_personal_message_signature() {
        let identity = SigningIdentity::from_private_key(TEST_KEY).unwrap();
        let signature = identity.sign_personal_message(b"hello");
        let hash = hash_personal_message(b"hello");

        assert!(verify(hash, &signature.to_bytes(), identity.address()).unwrap());
        assert!(!verify(hash, &signature.to_bytes(), Address::zero()).unwrap());
        assert_eq!(signature.to_hex().len(), 132);
    }

    #[test]
    fn test_debug_hides_key() {
        let identity = SigningIdentity::from_private_key(TEST_KEY).unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"));
        assert!(!debug.contains("4c0883a6"));
    }
}
