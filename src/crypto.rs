//! Cryptographic utilities: hashing, addresses and recoverable signatures

use crate::{AgentError, Result};
use ethereum_types::{Address, H256};

/// Keccak-256 hash function
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    Keccak256::digest(data).into()
}

/// Ledger address parsing and EIP-55 rendering
pub mod address {
    use super::*;
    use thiserror::Error;

    /// Why a string is not a usable address
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum AddressError {
        #[error("address must start with 0x")]
        MissingPrefix,
        #[error("address must be 20 bytes (40 hex characters), got {0} characters")]
        InvalidLength(usize),
        #[error("address contains non-hex characters")]
        InvalidHex,
        #[error("address checksum mismatch, expected {expected}")]
        BadChecksum { expected: String },
    }

    /// Parse a `0x`-prefixed address.
    ///
    /// All-lowercase and all-uppercase input is accepted as is. Mixed-case
    /// input is treated as EIP-55 and must carry a valid checksum.
    pub fn parse(input: &str) -> std::result::Result<Address, AddressError> {
        let hex_part = input
            .strip_prefix("0x")
            .ok_or(AddressError::MissingPrefix)?;

        if hex_part.len() != 40 {
            return Err(AddressError::InvalidLength(hex_part.len()));
        }

        let bytes = hex::decode(hex_part).map_err(|_| AddressError::InvalidHex)?;
        let address = Address::from_slice(&bytes);

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            let expected = to_checksum(&address);
            if expected != input {
                return Err(AddressError::BadChecksum { expected });
            }
        }

        Ok(address)
    }

    /// Render an address with its EIP-55 mixed-case checksum
    pub fn to_checksum(address: &Address) -> String {
        let lower = hex::encode(address.as_bytes());
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Derive the address of an uncompressed SEC1 public key (`0x04 || x || y`)
    pub fn from_public_key(uncompressed: &[u8]) -> Result<Address> {
        if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
            return Err(AgentError::invalid_signature(
                "public key must be 65 bytes uncompressed",
            ));
        }
        let hash = keccak256(&uncompressed[1..]);
        Ok(Address::from_slice(&hash[12..]))
    }
}

/// Recoverable ECDSA signature helpers
pub mod signature {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    /// Prefix applied by `personal_sign` style message signing (EIP-191 version 0x45)
    pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

    /// Hash a message the way wallets do before a personal signature
    pub fn hash_personal_message(message: &[u8]) -> H256 {
        let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
        data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
        data.extend_from_slice(message.len().to_string().as_bytes());
        data.extend_from_slice(message);
        H256::from(keccak256(&data))
    }

    /// Recover the signer address of a 65-byte `r || s || v` signature over `hash`.
    ///
    /// `v` may be given either raw (0/1) or with the legacy 27 offset.
    pub fn recover_address(hash: H256, signature: &[u8]) -> Result<Address> {
        if signature.len() != 65 {
            return Err(AgentError::invalid_signature("Signature must be 65 bytes"));
        }

        let v = match signature[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            other => {
                return Err(AgentError::invalid_signature(format!(
                    "Invalid recovery byte {}",
                    other
                )))
            }
        };

        let recovery_id = RecoveryId::try_from(v)
            .map_err(|_| AgentError::invalid_signature("Invalid recovery ID"))?;
        let k256_sig = K256Signature::try_from(&signature[..64])
            .map_err(|_| AgentError::invalid_signature("Invalid signature format"))?;

        let verifying_key =
            VerifyingKey::recover_from_prehash(hash.as_bytes(), &k256_sig, recovery_id)
                .map_err(|_| AgentError::invalid_signature("Failed to recover public key"))?;

        address::from_public_key(verifying_key.to_encoded_point(false).as_bytes())
    }

    /// Whether `signature` over `hash` was produced by `expected`
    pub fn verify(hash: H256, signature: &[u8], expected: Address) -> Result<bool> {
        Ok(recover_address(hash, signature)? == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::address::{parse, to_checksum, AddressError};
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_transfer_selector() {
        assert_eq!(hex::encode(&keccak256(b"transfer(address,uint256)")[..4]), "a9059cbb");
    }

    #[test]
    fn test_checksum_known_addresses() {
        for known in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address = parse(known).unwrap();
            assert_eq!(to_checksum(&address), known);
        }
    }

    #[test]
    fn test_parse_accepts_single_case() {
        let lower = parse("0xcf942c47bc33db4fabc1696666058b784f9fa9ef").unwrap();
        let upper = parse("0xCF942C47BC33DB4FABC1696666058B784F9FA9EF").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(
            to_checksum(&lower),
            "0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            parse("cf942c47bc33db4fabc1696666058b784f9fa9ef"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(parse("0xABC"), Err(AddressError::InvalidLength(3)));
        assert_eq!(
            parse("0xzz942c47bc33db4fabc1696666058b784f9fa9ef"),
            Err(AddressError::InvalidHex)
        );
        assert!(matches!(
            parse("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            Err(AddressError::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_recover_rejects_short_signature() {
        let result = signature::recover_address(H256::zero(), &[0u8; 64]);
        assert!(matches!(result, Err(AgentError::InvalidSignature { .. })));
    }
}
