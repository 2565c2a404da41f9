use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use chain_store::keys::{meta_key, META_APP_HASH};
use chain_store::{ChainStore, LocalStore};
use shared_types::{
    Application, ApplySnapshotChunkRequest, ApplySnapshotChunkResponse, ApplySnapshotChunkResult,
    CommitResponse, Lifecycle, ListSnapshotsResponse, LoadSnapshotChunkRequest,
    LoadSnapshotChunkResponse, Module, ModuleError, OfferSnapshotRequest, OfferSnapshotResponse,
    OfferSnapshotResult, Snapshot, StoreError,
};

use crate::domain::{
    decode_records, encode_records, heights_to_prune, payload_hash, split_chunks, Restore,
    SNAPSHOT_FORMAT,
};

pub const MODULE_NAME: &str = "statesync";

/// Snapshot production settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSyncConfig {
    /// Take a snapshot every this many heights; 0 disables snapshots.
    pub snapshot_interval: u64,
    /// Snapshots to keep; 0 keeps all.
    pub keep_recent: usize,
    /// Chunk size in bytes.
    pub chunk_size: usize,
}

impl Default for StateSyncConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            keep_recent: 2,
            chunk_size: 64 * 1024,
        }
    }
}

/// Produces snapshots of application state on Commit and restores state
/// from snapshots offered by peers.
pub struct StateSyncModule {
    lifecycle: Lifecycle,
    chain: Arc<ChainStore>,
    local: Arc<LocalStore>,
    config: StateSyncConfig,
    restore: Mutex<Option<Restore>>,
}

impl StateSyncModule {
    pub fn new(chain: Arc<ChainStore>, local: Arc<LocalStore>, config: StateSyncConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            chain,
            local,
            config,
            restore: Mutex::new(None),
        }
    }

    /// Snapshot the committed state at `height`.
    pub fn take_snapshot(&self, height: u64) -> Result<Snapshot, StoreError> {
        let records = self.chain.export_state()?;
        let payload = encode_records(&records)?;
        let chunks = split_chunks(&payload, self.config.chunk_size);
        let count = u32::try_from(chunks.len()).map_err(|_| {
            StoreError::Serialization(format!("snapshot has too many chunks: {}", chunks.len()))
        })?;
        let snapshot = Snapshot {
            height,
            format: SNAPSHOT_FORMAT,
            chunks: count,
            hash: payload_hash(&payload),
            metadata: self.chain.app_hash()?,
        };
        self.local.put_snapshot(&snapshot, &chunks)?;
        info!(
            height,
            records = records.len(),
            chunks = snapshot.chunks,
            "snapshot created"
        );
        Ok(snapshot)
    }

    /// Drop all but the newest `keep_recent` snapshots.
    fn prune(&self) -> Result<(), StoreError> {
        let heights: Vec<u64> = self
            .local
            .list_snapshots()?
            .iter()
            .map(|s| s.height)
            .collect();
        let doomed = heights_to_prune(&heights, self.config.keep_recent);
        for height in doomed {
            self.local.delete_snapshot(*height)?;
            debug!(height, "snapshot pruned");
        }
        Ok(())
    }

    fn finish_restore(&self, restore: &Restore) -> ApplySnapshotChunkResult {
        if payload_hash(&restore.buffer) != restore.snapshot.hash {
            warn!(height = restore.snapshot.height, "snapshot hash mismatch");
            return ApplySnapshotChunkResult::RejectSnapshot;
        }
        let records = match decode_records(&restore.buffer) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "snapshot payload undecodable");
                return ApplySnapshotChunkResult::RejectSnapshot;
            }
        };
        if !restore.app_hash.is_empty() {
            let app_hash_key = meta_key(META_APP_HASH);
            let restored = records
                .iter()
                .find(|(k, _)| *k == app_hash_key)
                .map(|(_, v)| v.as_slice());
            if restored != Some(restore.app_hash.as_slice()) {
                warn!(height = restore.snapshot.height, "snapshot app hash mismatch");
                return ApplySnapshotChunkResult::RejectSnapshot;
            }
        }
        match self.chain.import_state(records) {
            Ok(count) => {
                info!(height = restore.snapshot.height, records = count, "state restored");
                ApplySnapshotChunkResult::Accept
            }
            Err(e) => {
                warn!(error = %e, "snapshot import failed");
                ApplySnapshotChunkResult::Abort
            }
        }
    }
}

#[async_trait]
impl Application for StateSyncModule {
    async fn commit(&self) -> Result<CommitResponse, ModuleError> {
        let height = self.chain.last_height()?;
        let interval = self.config.snapshot_interval;
        if interval == 0 {
            return Ok(CommitResponse::default());
        }
        if height > 0 && height % interval == 0 {
            self.take_snapshot(height)?;
        }
        self.prune()?;
        // Block pruning is governed by the chain module's retain_blocks.
        Ok(CommitResponse::default())
    }

    async fn list_snapshots(&self) -> Result<ListSnapshotsResponse, ModuleError> {
        Ok(ListSnapshotsResponse {
            snapshots: self.local.list_snapshots()?,
        })
    }

    async fn load_snapshot_chunk(
        &self,
        req: &LoadSnapshotChunkRequest,
    ) -> Result<LoadSnapshotChunkResponse, ModuleError> {
        if req.format != SNAPSHOT_FORMAT {
            return Ok(LoadSnapshotChunkResponse::default());
        }
        Ok(LoadSnapshotChunkResponse {
            chunk: self
                .local
                .get_chunk(req.height, req.chunk)?
                .unwrap_or_default(),
        })
    }

    async fn offer_snapshot(
        &self,
        req: &OfferSnapshotRequest,
    ) -> Result<OfferSnapshotResponse, ModuleError> {
        let snapshot = &req.snapshot;
        let result = if snapshot.format != SNAPSHOT_FORMAT {
            OfferSnapshotResult::RejectFormat
        } else if snapshot.chunks == 0 || snapshot.hash.len() != 32 {
            OfferSnapshotResult::Reject
        } else {
            *self.restore.lock() = Some(Restore::new(snapshot.clone(), req.app_hash.clone()));
            info!(height = snapshot.height, chunks = snapshot.chunks, "snapshot offer accepted");
            OfferSnapshotResult::Accept
        };
        Ok(OfferSnapshotResponse { result })
    }

    async fn apply_snapshot_chunk(
        &self,
        req: &ApplySnapshotChunkRequest,
    ) -> Result<ApplySnapshotChunkResponse, ModuleError> {
        let mut guard = self.restore.lock();
        let Some(restore) = guard.as_mut() else {
            return Ok(ApplySnapshotChunkResponse {
                result: ApplySnapshotChunkResult::Abort,
                ..Default::default()
            });
        };

        if req.index != restore.next_chunk {
            return Ok(ApplySnapshotChunkResponse {
                result: ApplySnapshotChunkResult::Retry,
                refetch_chunks: vec![restore.next_chunk],
                ..Default::default()
            });
        }

        restore.buffer.extend_from_slice(&req.chunk);
        restore.next_chunk += 1;
        if !restore.is_last(req.index) {
            return Ok(ApplySnapshotChunkResponse {
                result: ApplySnapshotChunkResult::Accept,
                ..Default::default()
            });
        }

        let result = self.finish_restore(restore);
        *guard = None;
        let reject_senders = if result == ApplySnapshotChunkResult::RejectSnapshot
            && !req.sender.is_empty()
        {
            vec![req.sender.clone()]
        } else {
            Vec::new()
        };
        Ok(ApplySnapshotChunkResponse {
            result,
            refetch_chunks: Vec::new(),
            reject_senders,
        })
    }
}

impl Module for StateSyncModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Account;

    fn config(interval: u64, keep: usize) -> StateSyncConfig {
        StateSyncConfig {
            snapshot_interval: interval,
            keep_recent: keep,
            chunk_size: 16,
        }
    }

    fn module(cfg: StateSyncConfig) -> (Arc<ChainStore>, StateSyncModule) {
        let chain = Arc::new(ChainStore::in_memory());
        let m = StateSyncModule::new(chain.clone(), Arc::new(LocalStore::in_memory()), cfg);
        (chain, m)
    }

    fn commit_height(chain: &ChainStore, height: u64, accounts: &[&str]) {
        chain.start_batch().unwrap();
        for a in accounts {
            chain.store_account(&Account::new(*a, "")).unwrap();
        }
        chain.set_last_block(height, &[height as u8; 32]).unwrap();
        chain.commit().unwrap();
    }

    #[tokio::test]
    async fn test_commit_snapshots_on_interval_and_prunes() {
        let (chain, m) = module(config(2, 2));
        for h in 1..=6 {
            commit_height(&chain, h, &[]);
            m.commit().await.unwrap();
        }
        let heights: Vec<u64> = m
            .list_snapshots()
            .await
            .unwrap()
            .snapshots
            .iter()
            .map(|s| s.height)
            .collect();
        assert_eq!(heights, vec![4, 6]);
        // Keeping snapshots never forces block pruning.
        assert_eq!(m.commit().await.unwrap().retain_height, 0);
    }

    #[tokio::test]
    async fn test_disabled_interval_never_snapshots() {
        let (chain, m) = module(config(0, 2));
        commit_height(&chain, 10, &["alice"]);
        assert_eq!(m.commit().await.unwrap().retain_height, 0);
        assert!(m.list_snapshots().await.unwrap().snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_offer_validates_descriptor() {
        let (_chain, m) = module(config(1, 0));
        let good = Snapshot {
            height: 1,
            format: SNAPSHOT_FORMAT,
            chunks: 1,
            hash: vec![0; 32],
            metadata: Vec::new(),
        };
        let offer = |snapshot| OfferSnapshotRequest {
            snapshot,
            app_hash: Vec::new(),
        };
        assert_eq!(
            m.offer_snapshot(&offer(Snapshot { format: 2, ..good.clone() }))
                .await
                .unwrap()
                .result,
            OfferSnapshotResult::RejectFormat
        );
        assert_eq!(
            m.offer_snapshot(&offer(Snapshot { chunks: 0, ..good.clone() }))
                .await
                .unwrap()
                .result,
            OfferSnapshotResult::Reject
        );
        assert_eq!(
            m.offer_snapshot(&offer(good)).await.unwrap().result,
            OfferSnapshotResult::Accept
        );
    }

    #[tokio::test]
    async fn test_apply_without_offer_aborts() {
        let (_chain, m) = module(config(1, 0));
        let resp = m
            .apply_snapshot_chunk(&ApplySnapshotChunkRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.result, ApplySnapshotChunkResult::Abort);
    }

    #[tokio::test]
    async fn test_snapshot_restores_on_fresh_node() {
        let (source_chain, source) = module(config(1, 0));
        commit_height(&source_chain, 1, &["alice", "bob", "carol"]);
        source.commit().await.unwrap();
        let snapshot = source.list_snapshots().await.unwrap().snapshots.remove(0);
        assert!(snapshot.chunks > 1);

        let (target_chain, target) = module(config(1, 0));
        let offered = target
            .offer_snapshot(&OfferSnapshotRequest {
                snapshot: snapshot.clone(),
                app_hash: snapshot.metadata.clone(),
            })
            .await
            .unwrap();
        assert_eq!(offered.result, OfferSnapshotResult::Accept);

        // Out of order first.
        let retry = target
            .apply_snapshot_chunk(&ApplySnapshotChunkRequest {
                index: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(retry.result, ApplySnapshotChunkResult::Retry);
        assert_eq!(retry.refetch_chunks, vec![0]);

        let mut last = ApplySnapshotChunkResult::Unknown;
        for index in 0..snapshot.chunks {
            let chunk = source
                .load_snapshot_chunk(&LoadSnapshotChunkRequest {
                    height: snapshot.height,
                    format: SNAPSHOT_FORMAT,
                    chunk: index,
                })
                .await
                .unwrap()
                .chunk;
            last = target
                .apply_snapshot_chunk(&ApplySnapshotChunkRequest {
                    index,
                    chunk,
                    sender: "peer".into(),
                })
                .await
                .unwrap()
                .result;
        }
        assert_eq!(last, ApplySnapshotChunkResult::Accept);
        assert_eq!(target_chain.list_accounts().unwrap().len(), 3);
        assert_eq!(target_chain.last_height().unwrap(), 1);
        assert_eq!(target_chain.app_hash().unwrap(), snapshot.metadata);
    }

    #[tokio::test]
    async fn test_corrupted_chunk_rejects_snapshot() {
        let (source_chain, source) = module(config(1, 0));
        commit_height(&source_chain, 1, &["alice"]);
        let snapshot = source.take_snapshot(1).unwrap();

        let (target_chain, target) = module(config(1, 0));
        target
            .offer_snapshot(&OfferSnapshotRequest {
                snapshot: Snapshot {
                    chunks: 1,
                    ..snapshot
                },
                app_hash: Vec::new(),
            })
            .await
            .unwrap();
        let resp = target
            .apply_snapshot_chunk(&ApplySnapshotChunkRequest {
                index: 0,
                chunk: b"garbage".to_vec(),
                sender: "bad-peer".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.result, ApplySnapshotChunkResult::RejectSnapshot);
        assert_eq!(resp.reject_senders, vec!["bad-peer".to_string()]);
        assert!(target_chain.list_accounts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_chunk_unknown_format_is_empty() {
        let (chain, m) = module(config(1, 0));
        commit_height(&chain, 1, &["alice"]);
        m.commit().await.unwrap();
        let resp = m
            .load_snapshot_chunk(&LoadSnapshotChunkRequest {
                height: 1,
                format: 9,
                chunk: 0,
            })
            .await
            .unwrap();
        assert!(resp.chunk.is_empty());
    }
}
