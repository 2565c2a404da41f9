use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use chain_store::ChainStore;
use shared_types::{
    tx_hash, Application, BlockMeta, CheckTxRequest, CheckTxResponse, CommitResponse, Event, ExtendVoteRequest,
    ExtendVoteResponse, FinalizeBlockRequest, FinalizeBlockResponse, InfoRequest, InfoResponse,
    InitChainRequest, InitChainResponse, Lifecycle, Module, ModuleError,
    PrepareProposalRequest, PrepareProposalResponse, ProcessProposalRequest,
    ProcessProposalResponse, ProposalStatus, QueryRequest, QueryResponse, StoreError, TxRecord,
    VerifyVoteExtensionRequest, VerifyVoteExtensionResponse,
};

use crate::domain::{
    codes, fit_txs, genesis_app_hash, next_app_hash, over_limit, retain_height, total_bytes,
    vote_extension,
};

pub const MODULE_NAME: &str = "chain";

/// Chain module settings.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Blocks of history to keep; 0 keeps everything.
    pub retain_blocks: u64,
    /// Reported through Info.
    pub app_version: u64,
    /// Largest block payload accepted, in bytes; 0 disables the cap.
    pub max_tx_bytes: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            retain_blocks: 0,
            app_version: 1,
            max_tx_bytes: 0,
        }
    }
}

/// Block and transaction index, app hash chaining and chain info.
pub struct ChainModule {
    lifecycle: Lifecycle,
    store: Arc<ChainStore>,
    config: ChainConfig,
}

impl ChainModule {
    pub fn new(store: Arc<ChainStore>, config: ChainConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            store,
            config,
        }
    }

    pub fn latest_height(&self) -> Result<u64, StoreError> {
        self.store.last_height()
    }

    /// Block at `height`; 0 means latest.
    pub fn get_block(&self, height: u64) -> Result<BlockMeta, StoreError> {
        let height = if height == 0 {
            self.store.last_height()?
        } else {
            height
        };
        self.store.get_block(height)
    }

    pub fn get_transaction(&self, hash_hex: &str) -> Result<TxRecord, StoreError> {
        self.store.get_tx(&hash_hex.to_lowercase())
    }

    fn json<T: Serialize>(value: &T) -> Result<Vec<u8>, ModuleError> {
        serde_json::to_vec(value).map_err(|e| ModuleError::handler(MODULE_NAME, e.to_string()))
    }
}

#[async_trait]
impl Application for ChainModule {
    async fn info(&self, _req: &InfoRequest) -> Result<InfoResponse, ModuleError> {
        Ok(InfoResponse {
            data: "cadence".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: self.config.app_version,
            last_block_height: self.store.last_height()?,
            last_block_app_hash: self.store.app_hash()?,
        })
    }

    async fn query(&self, req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        let found = if let Some(height) = req.path.strip_prefix("/block/") {
            let Ok(height) = height.parse::<u64>() else {
                return Ok(QueryResponse::default());
            };
            self.get_block(height).map(|b| Self::json(&b))
        } else if let Some(hash) = req.path.strip_prefix("/tx/") {
            self.get_transaction(hash).map(|t| Self::json(&t))
        } else {
            return Ok(QueryResponse::default());
        };

        match found {
            Ok(value) => Ok(QueryResponse {
                key: req.path.as_bytes().to_vec(),
                value: value?,
                height: self.store.last_height()?,
                ..Default::default()
            }),
            Err(e) if e.is_not_found() => Ok(QueryResponse::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn init_chain(&self, req: &InitChainRequest) -> Result<InitChainResponse, ModuleError> {
        let app_hash = genesis_app_hash(&req.chain_id);
        self.store.set_chain_id(&req.chain_id)?;
        self.store
            .set_last_block(req.initial_height.saturating_sub(1), &app_hash)?;
        info!(chain_id = %req.chain_id, initial_height = req.initial_height, "chain initialized");
        Ok(InitChainResponse {
            validators: Vec::new(),
            app_hash,
        })
    }

    /// A tx that alone exceeds the block cap can never be proposed.
    async fn check_tx(&self, req: &CheckTxRequest) -> Result<CheckTxResponse, ModuleError> {
        if over_limit(req.tx.len() as i64, self.config.max_tx_bytes) {
            return Ok(CheckTxResponse::reject(
                codes::TX_TOO_LARGE,
                format!(
                    "tx of {} bytes exceeds max_tx_bytes {}",
                    req.tx.len(),
                    self.config.max_tx_bytes
                ),
            ));
        }
        Ok(CheckTxResponse::default())
    }

    async fn prepare_proposal(
        &self,
        req: &PrepareProposalRequest,
    ) -> Result<PrepareProposalResponse, ModuleError> {
        let txs = fit_txs(&req.txs, req.max_tx_bytes);
        if txs.len() < req.txs.len() {
            debug!(
                kept = txs.len(),
                dropped = req.txs.len() - txs.len(),
                "proposal trimmed to max_tx_bytes"
            );
        }
        Ok(PrepareProposalResponse { txs })
    }

    async fn process_proposal(
        &self,
        req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        let expected = self.store.last_height()? + 1;
        if req.height != expected {
            warn!(height = req.height, expected, "proposal out of sequence");
            return Ok(ProcessProposalResponse::reject());
        }
        if req.hash.is_empty() {
            return Ok(ProcessProposalResponse::reject());
        }
        let bytes = total_bytes(&req.txs);
        if over_limit(bytes, self.config.max_tx_bytes) {
            warn!(
                height = req.height,
                bytes,
                max_tx_bytes = self.config.max_tx_bytes,
                "proposal over max_tx_bytes"
            );
            return Ok(ProcessProposalResponse::reject());
        }
        Ok(ProcessProposalResponse::accept())
    }

    /// Indexes the block and its transactions and chains the app hash. All
    /// writes go into the open block batch.
    async fn finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        let prev = self.store.app_hash()?;
        let hashes: Vec<[u8; 32]> = req.txs.iter().map(|tx| tx_hash(tx)).collect();
        let app_hash = next_app_hash(&prev, req.height, &hashes);

        let mut tx_hashes = Vec::with_capacity(hashes.len());
        for (index, (raw, hash)) in req.txs.iter().zip(&hashes).enumerate() {
            let hash = hex::encode(hash);
            let index = u32::try_from(index).map_err(|_| {
                ModuleError::handler(MODULE_NAME, format!("tx index {index} out of range"))
            })?;
            self.store.store_tx(&TxRecord {
                hash: hash.clone(),
                height: req.height,
                index,
                tx: raw.clone(),
            })?;
            tx_hashes.push(hash);
        }

        self.store.store_block(&BlockMeta {
            height: req.height,
            hash: req.hash.clone(),
            time: req.time,
            proposer: req.proposer.clone(),
            tx_hashes,
            app_hash: app_hash.clone(),
        })?;
        self.store.set_last_block(req.height, &app_hash)?;

        let event = Event::new("block")
            .with_attribute("height", req.height.to_string())
            .with_attribute("num_txs", req.txs.len().to_string());
        Ok(FinalizeBlockResponse {
            events: vec![event],
            app_hash,
            ..Default::default()
        })
    }

    async fn extend_vote(&self, req: &ExtendVoteRequest) -> Result<ExtendVoteResponse, ModuleError> {
        Ok(ExtendVoteResponse {
            vote_extension: vote_extension(req.height),
        })
    }

    async fn verify_vote_extension(
        &self,
        req: &VerifyVoteExtensionRequest,
    ) -> Result<VerifyVoteExtensionResponse, ModuleError> {
        let status = if req.vote_extension.is_empty()
            || req.vote_extension == vote_extension(req.height)
        {
            ProposalStatus::Accept
        } else {
            ProposalStatus::Reject
        };
        Ok(VerifyVoteExtensionResponse { status })
    }

    async fn commit(&self) -> Result<CommitResponse, ModuleError> {
        let height = self.store.last_height()?;
        Ok(CommitResponse {
            retain_height: retain_height(height, self.config.retain_blocks),
        })
    }
}

impl Module for ChainModule {
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

    fn module(retain_blocks: u64) -> (Arc<ChainStore>, ChainModule) {
        let store = Arc::new(ChainStore::in_memory());
        let m = ChainModule::new(
            store.clone(),
            ChainConfig {
                retain_blocks,
                ..Default::default()
            },
        );
        (store, m)
    }

    async fn finalize(store: &ChainStore, m: &ChainModule, height: u64, txs: Vec<Vec<u8>>) -> Vec<u8> {
        store.start_batch().unwrap();
        let resp = m
            .finalize_block(&FinalizeBlockRequest {
                txs,
                height,
                hash: vec![height as u8; 32],
                ..Default::default()
            })
            .await
            .unwrap();
        store.commit().unwrap();
        resp.app_hash
    }

    #[tokio::test]
    async fn test_init_then_blocks_chain_app_hash() {
        let (store, m) = module(0);
        store.start_batch().unwrap();
        let genesis = m
            .init_chain(&InitChainRequest {
                chain_id: "test".into(),
                initial_height: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        store.commit().unwrap();
        assert_eq!(genesis.app_hash, genesis_app_hash("test"));

        let h1 = finalize(&store, &m, 1, vec![b"tx1".to_vec()]).await;
        assert_eq!(h1, next_app_hash(&genesis.app_hash, 1, &[tx_hash(b"tx1")]));

        let info = m.info(&InfoRequest::default()).await.unwrap();
        assert_eq!(info.last_block_height, 1);
        assert_eq!(info.last_block_app_hash, h1);

        let block = m.get_block(0).unwrap();
        assert_eq!(block.height, 1);
        let tx = m.get_transaction(&block.tx_hashes[0]).unwrap();
        assert_eq!(tx.tx, b"tx1".to_vec());
        assert_eq!(store.chain_id().unwrap().as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_process_proposal_checks_sequence() {
        let (_store, m) = module(0);
        let good = ProcessProposalRequest {
            height: 1,
            hash: vec![1],
            ..Default::default()
        };
        assert_eq!(
            m.process_proposal(&good).await.unwrap(),
            ProcessProposalResponse::accept()
        );
        let skipped = ProcessProposalRequest {
            height: 3,
            ..good.clone()
        };
        assert_eq!(
            m.process_proposal(&skipped).await.unwrap(),
            ProcessProposalResponse::reject()
        );
    }

    #[tokio::test]
    async fn test_byte_cap_enforced_on_admission_and_proposal() {
        let store = Arc::new(ChainStore::in_memory());
        let m = ChainModule::new(
            store,
            ChainConfig {
                max_tx_bytes: 10,
                ..Default::default()
            },
        );

        let big = m
            .check_tx(&CheckTxRequest {
                tx: vec![0u8; 11],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(big.code, codes::TX_TOO_LARGE);
        let small = m
            .check_tx(&CheckTxRequest {
                tx: vec![0u8; 10],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(small.is_ok());

        let over = ProcessProposalRequest {
            txs: vec![vec![0u8; 100], vec![0u8; 5]],
            height: 1,
            hash: vec![1],
            ..Default::default()
        };
        assert_eq!(
            m.process_proposal(&over).await.unwrap(),
            ProcessProposalResponse::reject()
        );
        let within = ProcessProposalRequest {
            txs: vec![vec![0u8; 5], vec![0u8; 5]],
            ..over
        };
        assert_eq!(
            m.process_proposal(&within).await.unwrap(),
            ProcessProposalResponse::accept()
        );
    }

    #[tokio::test]
    async fn test_commit_reports_retain_height() {
        let (store, m) = module(2);
        for h in 1..=5 {
            finalize(&store, &m, h, Vec::new()).await;
        }
        assert_eq!(m.commit().await.unwrap().retain_height, 3);
    }

    #[tokio::test]
    async fn test_vote_extension_round_trip() {
        let (_store, m) = module(0);
        let ext = m
            .extend_vote(&ExtendVoteRequest {
                height: 9,
                ..Default::default()
            })
            .await
            .unwrap();
        let verify = |bytes: Vec<u8>| VerifyVoteExtensionRequest {
            height: 9,
            vote_extension: bytes,
            ..Default::default()
        };
        assert_eq!(
            m.verify_vote_extension(&verify(ext.vote_extension))
                .await
                .unwrap()
                .status,
            ProposalStatus::Accept
        );
        assert_eq!(
            m.verify_vote_extension(&verify(vec![1, 2, 3]))
                .await
                .unwrap()
                .status,
            ProposalStatus::Reject
        );
    }

    #[tokio::test]
    async fn test_query_block_and_unknown_paths() {
        let (store, m) = module(0);
        finalize(&store, &m, 1, Vec::new()).await;

        let hit = m
            .query(&QueryRequest {
                path: "/block/1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let block: BlockMeta = serde_json::from_slice(&hit.value).unwrap();
        assert_eq!(block.height, 1);

        for path in ["/block/99", "/block/x", "/account/a"] {
            let miss = m
                .query(&QueryRequest {
                    path: path.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert!(miss.value.is_empty(), "{path}");
        }
    }
}
