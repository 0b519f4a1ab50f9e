//! Calldata for the two token methods the agent touches

use crate::{AgentError, Result};
use ethereum_types::{Address, U256};

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// ABI-encode `transfer(to, amount)`
pub fn encode_transfer(to: &Address, amount: U256) -> Vec<u8> {
    let mut amount_word = [0u8; 32];
    amount.to_big_endian(&mut amount_word);

    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&amount_word);
    data
}

/// ABI-encode `balanceOf(owner)`
pub fn encode_balance_of(owner: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&address_word(owner));
    data
}

/// Decode the boolean returned by `transfer`.
///
/// Tokens that return nothing are treated as successful.
pub fn decode_bool(output: &[u8]) -> Result<bool> {
    if output.is_empty() {
        return Ok(true);
    }
    if output.len() < 32 {
        return Err(AgentError::transfer_submission_failed(format!(
            "transfer returned {} bytes, expected a 32-byte bool",
            output.len()
        )));
    }
    Ok(output[..32].iter().any(|b| *b != 0))
}

/// Decode a single `uint256` return value
pub fn decode_uint(output: &[u8]) -> Result<U256> {
    if output.len() < 32 {
        return Err(AgentError::Rpc {
            code: 0,
            message: format!("expected a 32-byte word, got {} bytes", output.len()),
        });
    }
    Ok(U256::from_big_endian(&output[..32]))
}
