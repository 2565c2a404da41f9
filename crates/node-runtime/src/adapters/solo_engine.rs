//! # Solo Engine
//!
//! Single-validator block producer for development nodes and tests. It
//! drives the full callback sequence for every block:
//!
//! ```text
//! mempool ──→ PrepareProposal ──→ ProcessProposal ──→ ExtendVote
//!                                                        │
//!      Commit ←── FinalizeBlock ←── VerifyVoteExtension ←┘
//!        │
//!        └──→ CheckTx(Recheck) over what is left in the mempool
//! ```
//!
//! Transactions enter through [`TxBroadcaster::broadcast_tx`], which runs
//! CheckTx and queues accepted ones. A tx holds its mempool slot from the
//! moment it is admitted for CheckTx until it is rejected, evicted, dropped
//! with a rejected proposal or committed, so `mempool_capacity` and the
//! duplicate check also cover txs that are mid-check or in the block under
//! construction.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cadence_telemetry::{MEMPOOL_SIZE, TXS_REJECTED};
use shared_types::{
    tx_hash, Application, CheckTxKind, CheckTxRequest, CheckTxResponse, ExtendVoteRequest,
    FinalizeBlockRequest, InfoRequest, InitChainRequest, ModuleError, PrepareProposalRequest,
    Hash, ProcessProposalRequest, ProposalStatus, TxBroadcaster, ValidatorUpdate,
    VerifyVoteExtensionRequest,
};

use super::consensus::ConsensusEngine;
use crate::container::{EngineConfig, GenesisConfig};

pub const ENGINE_NAME: &str = "solo";

/// CheckTx codes produced by the mempool itself.
pub mod codes {
    pub const MEMPOOL_FULL: u32 = 100;
    pub const TX_IN_MEMPOOL: u32 = 101;
}

/// Deterministic block hash: SHA-256 over the height and the block's txs.
pub fn block_hash(height: u64, txs: &[Vec<u8>]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    for tx in txs {
        hasher.update(tx);
    }
    hasher.finalize().to_vec()
}

/// Queue of txs awaiting a block, plus the hash of every tx holding a slot.
#[derive(Default)]
struct Mempool {
    queue: VecDeque<Vec<u8>>,
    slots: HashSet<Hash>,
}

impl Mempool {
    fn publish(&self) {
        MEMPOOL_SIZE.set(self.queue.len() as f64);
    }

    fn release<'a>(&mut self, txs: impl IntoIterator<Item = &'a Vec<u8>>) {
        for tx in txs {
            self.slots.remove(&tx_hash(tx));
        }
    }
}

pub struct SoloEngine {
    config: EngineConfig,
    genesis: GenesisConfig,
    proposer: Vec<u8>,
    app: RwLock<Option<Arc<dyn Application>>>,
    mempool: Mutex<Mempool>,
    last_height: AtomicU64,
    stop: CancellationToken,
}

impl SoloEngine {
    pub fn new(config: EngineConfig, genesis: GenesisConfig) -> Self {
        let proposer = genesis
            .validators
            .first()
            .map(|v| v.pub_key.as_bytes().to_vec())
            .unwrap_or_default();
        Self {
            config,
            genesis,
            proposer,
            app: RwLock::new(None),
            mempool: Mutex::new(Mempool::default()),
            last_height: AtomicU64::new(0),
            stop: CancellationToken::new(),
        }
    }

    /// Height of the last committed block.
    pub fn last_height(&self) -> u64 {
        self.last_height.load(Ordering::SeqCst)
    }

    pub fn pending_txs(&self) -> usize {
        self.mempool.lock().queue.len()
    }

    fn app(&self) -> Result<Arc<dyn Application>, ModuleError> {
        self.app
            .read()
            .clone()
            .ok_or_else(|| ModuleError::Engine("engine not started".into()))
    }

    /// Dequeue up to `max` txs. They keep their slots.
    fn take_pending(&self, max: usize) -> Vec<Vec<u8>> {
        let mut pool = self.mempool.lock();
        let n = max.min(pool.queue.len());
        let txs = pool.queue.drain(..n).collect();
        pool.publish();
        txs
    }

    /// Put `txs` back at the head of the queue, keeping their order.
    fn requeue(&self, txs: Vec<Vec<u8>>) {
        let mut pool = self.mempool.lock();
        for tx in txs.into_iter().rev() {
            pool.queue.push_front(tx);
        }
        pool.publish();
    }

    /// Free the slots of txs that left the mempool for good.
    fn release(&self, txs: &[Vec<u8>]) {
        self.mempool.lock().release(txs);
    }

    async fn init_chain(&self, app: &dyn Application) -> Result<u64, ModuleError> {
        let validators = self
            .genesis
            .validators
            .iter()
            .map(|v| ValidatorUpdate {
                pub_key: v.pub_key.clone(),
                power: v.power,
            })
            .collect();
        let resp = app
            .init_chain(&InitChainRequest {
                chain_id: self.genesis.chain_id.clone(),
                time: self.genesis.genesis_time,
                validators,
                app_state_bytes: Vec::new(),
                initial_height: self.genesis.initial_height,
            })
            .await?;
        info!(
            chain_id = %self.genesis.chain_id,
            validators = resp.validators.len(),
            app_hash = %hex::encode(&resp.app_hash),
            "chain initialized"
        );
        Ok(self.genesis.initial_height.saturating_sub(1))
    }

    /// Run one block through the full callback sequence.
    async fn produce_block(&self, app: &dyn Application) -> Result<(), ModuleError> {
        let height = self.last_height() + 1;
        let candidates = self.take_pending(self.config.max_block_txs);
        let time = chrono::Utc::now().timestamp_millis();

        let prepared = app
            .prepare_proposal(&PrepareProposalRequest {
                txs: candidates.clone(),
                max_tx_bytes: self.config.max_tx_bytes,
                height,
                time,
                proposer: self.proposer.clone(),
            })
            .await?;
        let txs = prepared.txs;

        let included: HashSet<&[u8]> = txs.iter().map(Vec::as_slice).collect();
        let leftover: Vec<Vec<u8>> = candidates
            .iter()
            .filter(|tx| !included.contains(tx.as_slice()))
            .cloned()
            .collect();
        self.requeue(leftover);

        let hash = block_hash(height, &txs);
        let processed = app
            .process_proposal(&ProcessProposalRequest {
                txs: txs.clone(),
                height,
                hash: hash.clone(),
                time,
                proposer: self.proposer.clone(),
            })
            .await?;
        if processed.status == ProposalStatus::Reject {
            warn!(height, txs = txs.len(), "proposal rejected, dropping its transactions");
            self.release(&txs);
            return Ok(());
        }

        let extension = app
            .extend_vote(&ExtendVoteRequest {
                height,
                hash: hash.clone(),
            })
            .await?;
        let verified = app
            .verify_vote_extension(&VerifyVoteExtensionRequest {
                height,
                hash: hash.clone(),
                validator: self.proposer.clone(),
                vote_extension: extension.vote_extension,
            })
            .await?;
        if verified.status == ProposalStatus::Reject {
            warn!(height, "vote extension rejected, dropping block");
            self.release(&txs);
            return Ok(());
        }

        let finalized = app
            .finalize_block(&FinalizeBlockRequest {
                txs: txs.clone(),
                height,
                hash,
                time,
                proposer: self.proposer.clone(),
            })
            .await?;
        let committed = app.commit().await?;
        self.last_height.store(height, Ordering::SeqCst);
        self.release(&txs);

        let failed = finalized.tx_results.iter().filter(|r| r.code != 0).count();
        debug!(
            height,
            txs = txs.len(),
            failed,
            events = finalized.events.len(),
            validator_updates = finalized.validator_updates.len(),
            app_hash = %hex::encode(&finalized.app_hash),
            retain_height = committed.retain_height,
            "block committed"
        );

        self.recheck(app).await
    }

    /// Re-run CheckTx over the queued txs against the new state. The queue
    /// stays in place while checking; evicted txs are removed afterwards.
    async fn recheck(&self, app: &dyn Application) -> Result<(), ModuleError> {
        let pending: Vec<Vec<u8>> = self.mempool.lock().queue.iter().cloned().collect();
        let mut evicted = HashSet::new();
        for tx in pending {
            let resp = app
                .check_tx(&CheckTxRequest {
                    tx: tx.clone(),
                    kind: CheckTxKind::Recheck,
                })
                .await?;
            if !resp.is_ok() {
                debug!(code = resp.code, log = %resp.log, "tx evicted on recheck");
                evicted.insert(tx_hash(&tx));
            }
        }
        if evicted.is_empty() {
            return Ok(());
        }

        let mut pool = self.mempool.lock();
        pool.queue.retain(|tx| !evicted.contains(&tx_hash(tx)));
        for hash in &evicted {
            pool.slots.remove(hash);
        }
        pool.publish();
        Ok(())
    }
}

#[async_trait]
impl ConsensusEngine for SoloEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    /// Handshake: Info, then InitChain when the application has no state.
    async fn start(&self, app: Arc<dyn Application>) -> Result<(), ModuleError> {
        let info = app
            .info(&InfoRequest {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            })
            .await?;

        let height = if info.last_block_height == 0 && info.last_block_app_hash.is_empty() {
            self.init_chain(app.as_ref()).await?
        } else {
            info!(
                height = info.last_block_height,
                app_hash = %hex::encode(&info.last_block_app_hash),
                "resuming chain"
            );
            info.last_block_height
        };
        self.last_height.store(height, Ordering::SeqCst);
        *self.app.write() = Some(app);
        Ok(())
    }

    /// Produce blocks every `block_interval` until stopped. A callback
    /// error ends the loop and is returned.
    async fn wait(&self) -> Result<(), ModuleError> {
        let app = self.app()?;
        let mut ticker = tokio::time::interval(self.config.block_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!(height = self.last_height(), "block production stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.produce_block(app.as_ref()).await {
                self.stop.cancel();
                return Err(e);
            }
        }
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.stop.cancel();
        Ok(())
    }
}

#[async_trait]
impl TxBroadcaster for SoloEngine {
    async fn broadcast_tx(&self, tx: Vec<u8>) -> Result<CheckTxResponse, ModuleError> {
        let app = self.app()?;
        let hash = tx_hash(&tx);
        {
            let mut pool = self.mempool.lock();
            if pool.slots.contains(&hash) {
                TXS_REJECTED.inc();
                return Ok(CheckTxResponse::reject(
                    codes::TX_IN_MEMPOOL,
                    "tx already in mempool",
                ));
            }
            if pool.slots.len() >= self.config.mempool_capacity {
                TXS_REJECTED.inc();
                return Ok(CheckTxResponse::reject(codes::MEMPOOL_FULL, "mempool is full"));
            }
            pool.slots.insert(hash);
        }

        let checked = app
            .check_tx(&CheckTxRequest {
                tx: tx.clone(),
                kind: CheckTxKind::New,
            })
            .await;

        let mut pool = self.mempool.lock();
        match &checked {
            Ok(resp) if resp.is_ok() => {
                pool.queue.push_back(tx);
                pool.publish();
            }
            _ => {
                pool.slots.remove(&hash);
            }
        }
        checked
    }
}
