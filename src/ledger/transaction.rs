//! Legacy (EIP-155) transaction encoding and signing

use crate::crypto::keccak256;
use crate::identity::SigningIdentity;
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;

/// Unsigned legacy transaction with replay protection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// Raw signed bytes ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: H256,
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data);
    }

    /// Hash the signer commits to: `keccak(rlp([..fields, chain_id, 0, 0]))`
    pub fn signing_hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        H256::from(keccak256(&stream.out()))
    }

    /// Sign with `identity`; `v = recovery_id + chain_id * 2 + 35`
    pub fn sign(&self, identity: &SigningIdentity) -> SignedTransaction {
        let signature = identity.sign_hash(self.signing_hash());
        let v = u64::from(signature.recovery_id) + self.chain_id * 2 + 35;

        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&U256::from_big_endian(signature.r.as_bytes()));
        stream.append(&U256::from_big_endian(signature.s.as_bytes()));

        let raw = stream.out().to_vec();
        let hash = H256::from(keccak256(&raw));
        SignedTransaction { raw, hash }
    }
}
