//! # Local Store
//!
//! Node-local data that is not part of consensus state: state-sync snapshots
//! and uploaded files. Writes go straight to the backend, no batch.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use shared_types::{Snapshot, StoreError};

use crate::adapters::InMemoryKVStore;
use crate::chain_store::{decode, encode};
use crate::keys::*;
use crate::ports::{BatchOperation, KeyValueStore};

pub struct LocalStore {
    db: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKVStore::new()))
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Persist a snapshot descriptor and its chunks in one write.
    pub fn put_snapshot(&self, snapshot: &Snapshot, chunks: &[Vec<u8>]) -> Result<(), StoreError> {
        let mut ops = Vec::with_capacity(chunks.len() + 1);
        for (index, chunk) in chunks.iter().enumerate() {
            ops.push(BatchOperation::put(
                chunk_key(snapshot.height, index as u32),
                chunk.clone(),
            ));
        }
        ops.push(BatchOperation::put(
            snapshot_key(snapshot.height),
            encode(snapshot)?,
        ));
        self.db.atomic_batch_write(ops)
    }

    /// Snapshots in ascending height order.
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        self.db
            .prefix_scan(SNAPSHOT_PREFIX)?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    pub fn get_snapshot(&self, height: u64) -> Result<Snapshot, StoreError> {
        let bytes = self
            .db
            .get(&snapshot_key(height))?
            .ok_or_else(|| StoreError::NotFound(format!("snapshot {height}")))?;
        decode(&bytes)
    }

    /// One chunk, or `None` if the snapshot or index is unknown.
    pub fn get_chunk(&self, height: u64, index: u32) -> Result<Option<Vec<u8>>, StoreError> {
        self.db.get(&chunk_key(height, index))
    }

    pub fn delete_snapshot(&self, height: u64) -> Result<(), StoreError> {
        let mut ops: Vec<_> = self
            .db
            .prefix_scan(&chunk_prefix(height))?
            .into_iter()
            .map(|(k, _)| BatchOperation::delete(k))
            .collect();
        ops.push(BatchOperation::delete(snapshot_key(height)));
        self.db.atomic_batch_write(ops)
    }

    // =========================================================================
    // FILES
    // =========================================================================

    /// Store `data` under its content id (lowercase hex SHA-256).
    pub fn put_file(&self, data: &[u8]) -> Result<String, StoreError> {
        let cid = hex::encode(Sha256::digest(data));
        self.db.put(&file_key(&cid), data)?;
        Ok(cid)
    }

    pub fn get_file(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        self.db
            .get(&file_key(cid))?
            .ok_or_else(|| StoreError::NotFound(format!("file {cid}")))
    }
}
