//! # Domain Entities
//!
//! Records persisted by the chain store and the transaction envelope carried
//! in blocks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ModuleError;

/// Account address. Opaque, compared byte for byte.
pub type Address = String;

/// 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// SHA-256 over raw transaction bytes.
pub fn tx_hash(tx: &[u8]) -> Hash {
    Sha256::digest(tx).into()
}

/// Lowercase hex of [`tx_hash`], the key transactions are indexed under.
pub fn tx_hash_hex(tx: &[u8]) -> String {
    hex::encode(tx_hash(tx))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub name: String,
    /// Height of the block that created the account.
    pub created_at_height: u64,
}

impl Account {
    pub fn new(address: impl Into<Address>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            created_at_height: 0,
        }
    }
}

/// A change to voting power reported back to the consensus engine.
/// Power zero removes the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: String,
    pub power: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pub_key: String,
    pub power: i64,
    pub name: String,
}

impl From<&Validator> for ValidatorUpdate {
    fn from(v: &Validator) -> Self {
        Self {
            pub_key: v.pub_key.clone(),
            power: v.power,
        }
    }
}

/// Header-level facts about a finalized block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub height: u64,
    pub hash: Vec<u8>,
    pub time: i64,
    pub proposer: Vec<u8>,
    pub tx_hashes: Vec<String>,
    pub app_hash: Vec<u8>,
}

/// A transaction and where it was included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    pub tx: Vec<u8>,
}

/// Application transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub body: TxBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxBody {
    CreateAccount { account: Account },
    UpdateValidator { pub_key: String, power: i64 },
}

impl Transaction {
    pub fn new(nonce: u64, body: TxBody) -> Self {
        Self { nonce, body }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ModuleError> {
        bincode::serialize(self).map_err(|e| ModuleError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ModuleError> {
        bincode::deserialize(bytes).map_err(|e| ModuleError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_codec() {
        let tx = Transaction::new(
            7,
            TxBody::CreateAccount {
                account: Account::new("alice", "Alice"),
            },
        );
        let bytes = tx.encode().unwrap();
        assert_eq!(Transaction::decode(&bytes).unwrap(), tx);
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(matches!(
            Transaction::decode(&[0xff, 0xff, 0xff]),
            Err(ModuleError::Decode(_))
        ));
    }

    #[test]
    fn test_tx_hash_hex_is_64_chars() {
        assert_eq!(tx_hash_hex(b"abc").len(), 64);
        assert_ne!(tx_hash_hex(b"abc"), tx_hash_hex(b"abd"));
    }
}
