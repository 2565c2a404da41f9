//! # Chain Store
//!
//! Consensus state over a [`KeyValueStore`], written only through a batch.
//!
//! ## Batch discipline
//!
//! | Operation | No batch open | Batch open |
//! |-----------|---------------|------------|
//! | `start_batch` | opens one | `BatchInProgress` |
//! | `set` / `delete` | `BatchNotStarted` | buffered |
//! | `commit` | `BatchNotStarted` | atomic write, batch closed |
//! | `get` | base store | base store (pending writes invisible) |
//!
//! One batch exists at a time. Modules write into it during block
//! finalization; the router opens it before `FinalizeBlock` and commits it
//! before acknowledging `Commit`, so a block applies entirely or not at all.

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

use shared_types::{Account, BlockMeta, StoreError, TxRecord, Validator};

use crate::adapters::InMemoryKVStore;
use crate::keys::*;
use crate::ports::{BatchOperation, KeyValueStore};

/// Block-scoped write control, driven by the callback router.
pub trait BlockCommitter: Send + Sync {
    /// Open the write batch for the block being finalized.
    fn begin_block(&self) -> Result<(), StoreError>;

    /// Atomically persist the block's writes.
    fn commit_block(&self) -> Result<(), StoreError>;

    /// Drop the block's writes.
    fn abort_block(&self);
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

pub struct ChainStore {
    db: Arc<dyn KeyValueStore>,
    batch: Mutex<Option<Vec<BatchOperation>>>,
}

impl ChainStore {
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self {
            db,
            batch: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKVStore::new()))
    }

    // =========================================================================
    // BATCH
    // =========================================================================

    /// Open the write batch.
    pub fn start_batch(&self) -> Result<(), StoreError> {
        let mut batch = self.batch.lock();
        if batch.is_some() {
            return Err(StoreError::BatchInProgress);
        }
        *batch = Some(Vec::new());
        Ok(())
    }

    pub fn has_batch(&self) -> bool {
        self.batch.lock().is_some()
    }

    pub fn require_batch(&self) -> Result<(), StoreError> {
        if self.has_batch() {
            Ok(())
        } else {
            Err(StoreError::BatchNotStarted)
        }
    }

    fn push(&self, op: BatchOperation) -> Result<(), StoreError> {
        self.batch
            .lock()
            .as_mut()
            .ok_or(StoreError::BatchNotStarted)?
            .push(op);
        Ok(())
    }

    /// Buffer a write in the open batch.
    pub fn set(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        self.push(BatchOperation::put(key, value))
    }

    /// Buffer a delete in the open batch.
    pub fn delete(&self, key: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        self.push(BatchOperation::delete(key))
    }

    /// Write the open batch atomically and close it. Returns the number of
    /// operations written.
    pub fn commit(&self) -> Result<usize, StoreError> {
        let ops = self.batch.lock().take().ok_or(StoreError::BatchNotStarted)?;
        let count = ops.len();
        if count > 0 {
            self.db.atomic_batch_write(ops)?;
        }
        debug!(operations = count, "chain store batch committed");
        Ok(count)
    }

    /// Drop the open batch, if any. Returns whether one was open.
    pub fn discard(&self) -> bool {
        let dropped = self.batch.lock().take();
        if let Some(ops) = &dropped {
            debug!(operations = ops.len(), "chain store batch discarded");
        }
        dropped.is_some()
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read committed state.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.db
            .get(key)?
            .ok_or_else(|| StoreError::NotFound(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.db.prefix_scan(prefix)
    }

    fn get_record<T: DeserializeOwned>(&self, key: &[u8]) -> Result<T, StoreError> {
        decode(&self.get(key)?)
    }

    fn scan_records<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        self.scan(prefix)?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    pub fn store_account(&self, account: &Account) -> Result<(), StoreError> {
        self.require_batch()?;
        self.set(account_key(&account.address), encode(account)?)
    }

    pub fn get_account(&self, address: &str) -> Result<Account, StoreError> {
        self.get_record(&account_key(address))
    }

    pub fn has_account(&self, address: &str) -> Result<bool, StoreError> {
        self.db.exists(&account_key(address))
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.scan_records(ACCOUNT_PREFIX)
    }

    // =========================================================================
    // VALIDATORS
    // =========================================================================

    pub fn store_validator(&self, validator: &Validator) -> Result<(), StoreError> {
        self.set(validator_key(&validator.pub_key), encode(validator)?)
    }

    pub fn remove_validator(&self, pub_key: &str) -> Result<(), StoreError> {
        self.delete(validator_key(pub_key))
    }

    pub fn get_validator(&self, pub_key: &str) -> Result<Validator, StoreError> {
        self.get_record(&validator_key(pub_key))
    }

    pub fn list_validators(&self) -> Result<Vec<Validator>, StoreError> {
        self.scan_records(VALIDATOR_PREFIX)
    }

    // =========================================================================
    // BLOCKS AND TRANSACTIONS
    // =========================================================================

    pub fn store_block(&self, block: &BlockMeta) -> Result<(), StoreError> {
        self.set(block_key(block.height), encode(block)?)
    }

    pub fn get_block(&self, height: u64) -> Result<BlockMeta, StoreError> {
        self.get_record(&block_key(height))
    }

    pub fn store_tx(&self, record: &TxRecord) -> Result<(), StoreError> {
        self.set(tx_key(&record.hash), encode(record)?)
    }

    pub fn get_tx(&self, hash_hex: &str) -> Result<TxRecord, StoreError> {
        self.get_record(&tx_key(hash_hex))
    }

    // =========================================================================
    // METADATA
    // =========================================================================

    /// Record the last applied block. Goes into the open batch.
    pub fn set_last_block(&self, height: u64, app_hash: &[u8]) -> Result<(), StoreError> {
        self.set(meta_key(META_LAST_HEIGHT), height.to_be_bytes().to_vec())?;
        self.set(meta_key(META_APP_HASH), app_hash.to_vec())
    }

    /// Height of the last committed block, 0 before genesis.
    pub fn last_height(&self) -> Result<u64, StoreError> {
        match self.db.get(&meta_key(META_LAST_HEIGHT))? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Serialization("last_height is not 8 bytes".to_string())
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// App hash of the last committed block, empty before genesis.
    pub fn app_hash(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.db.get(&meta_key(META_APP_HASH))?.unwrap_or_default())
    }

    pub fn set_chain_id(&self, chain_id: &str) -> Result<(), StoreError> {
        self.set(meta_key(META_CHAIN_ID), chain_id.as_bytes().to_vec())
    }

    pub fn chain_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .db
            .get(&meta_key(META_CHAIN_ID))?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    // =========================================================================
    // STATE EXPORT / IMPORT
    // =========================================================================

    /// Every record that defines application state: accounts, validators
    /// and chain metadata. Block and transaction history is excluded.
    pub fn export_state(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut records = self.scan(ACCOUNT_PREFIX)?;
        records.extend(self.scan(VALIDATOR_PREFIX)?);
        records.extend(self.scan(META_PREFIX)?);
        Ok(records)
    }

    /// Write exported records in one batch.
    pub fn import_state(&self, records: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize, StoreError> {
        self.start_batch()?;
        for (key, value) in records {
            if let Err(e) = self.set(key, value) {
                self.discard();
                return Err(e);
            }
        }
        self.commit()
    }
}

impl BlockCommitter for ChainStore {
    fn begin_block(&self) -> Result<(), StoreError> {
        self.start_batch()
    }

    fn commit_block(&self) -> Result<(), StoreError> {
        self.commit().map(|_| ())
    }

    fn abort_block(&self) {
        self.discard();
    }
}
