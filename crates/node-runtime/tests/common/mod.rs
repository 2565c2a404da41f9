//! Scripted modules for router and supervisor tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chain_store::ChainStore;
use shared_types::{
    Application, ApplySnapshotChunkRequest, ApplySnapshotChunkResponse, ApplySnapshotChunkResult,
    CheckTxRequest, CheckTxResponse, CommitResponse, Event, ExecTxResult, ExtendVoteRequest,
    ExtendVoteResponse, FinalizeBlockRequest, FinalizeBlockResponse, InfoRequest, InfoResponse,
    InitChainRequest, InitChainResponse, Lifecycle, ListSnapshotsResponse,
    LoadSnapshotChunkRequest, LoadSnapshotChunkResponse, Module, ModuleError,
    OfferSnapshotRequest, OfferSnapshotResponse, OfferSnapshotResult, PrepareProposalRequest,
    PrepareProposalResponse, ProcessProposalRequest, ProcessProposalResponse, ProposalStatus,
    QueryRequest, QueryResponse, Snapshot, ValidatorUpdate, VerifyVoteExtensionRequest,
    VerifyVoteExtensionResponse,
};

/// A module whose answers are fixed up front. Counts every callback.
pub struct Scripted {
    lifecycle: Lifecycle,
    calls: AtomicUsize,
    fail: Option<&'static str>,
    check_code: u32,
    events: Vec<&'static str>,
    extension: Vec<u8>,
    retain: u64,
    snapshots: Vec<u64>,
    txs: Vec<Vec<u8>>,
    value: Vec<u8>,
    offer: OfferSnapshotResult,
    chunk: Vec<u8>,
    app_hash: Vec<u8>,
    info_height: u64,
    verdict: ProposalStatus,
    apply: ApplySnapshotChunkResult,
    validators: Vec<&'static str>,
    tx_codes: Vec<u32>,
    writes: Option<(Arc<ChainStore>, &'static str)>,
}

impl Scripted {
    pub fn new(name: &str) -> Self {
        Self {
            lifecycle: Lifecycle::new(name),
            calls: AtomicUsize::new(0),
            fail: None,
            check_code: 0,
            events: Vec::new(),
            extension: Vec::new(),
            retain: 0,
            snapshots: Vec::new(),
            txs: Vec::new(),
            value: Vec::new(),
            offer: OfferSnapshotResult::Accept,
            chunk: Vec::new(),
            app_hash: Vec::new(),
            info_height: 0,
            verdict: ProposalStatus::Accept,
            apply: ApplySnapshotChunkResult::Accept,
            validators: Vec::new(),
            tx_codes: Vec::new(),
            writes: None,
        }
    }

    pub fn failing(mut self, message: &'static str) -> Self {
        self.fail = Some(message);
        self
    }

    pub fn check_code(mut self, code: u32) -> Self {
        self.check_code = code;
        self
    }

    pub fn events(mut self, kinds: &[&'static str]) -> Self {
        self.events = kinds.to_vec();
        self
    }

    pub fn extension(mut self, bytes: &[u8]) -> Self {
        self.extension = bytes.to_vec();
        self
    }

    pub fn retain(mut self, height: u64) -> Self {
        self.retain = height;
        self
    }

    pub fn snapshots(mut self, heights: &[u64]) -> Self {
        self.snapshots = heights.to_vec();
        self
    }

    pub fn txs(mut self, txs: Vec<Vec<u8>>) -> Self {
        self.txs = txs;
        self
    }

    pub fn value(mut self, value: &[u8]) -> Self {
        self.value = value.to_vec();
        self
    }

    pub fn offer(mut self, result: OfferSnapshotResult) -> Self {
        self.offer = result;
        self
    }

    pub fn chunk(mut self, chunk: &[u8]) -> Self {
        self.chunk = chunk.to_vec();
        self
    }

    pub fn app_hash(mut self, hash: &[u8]) -> Self {
        self.app_hash = hash.to_vec();
        self
    }

    pub fn info_height(mut self, height: u64) -> Self {
        self.info_height = height;
        self
    }

    /// Answer for ProcessProposal and VerifyVoteExtension.
    pub fn verdict(mut self, status: ProposalStatus) -> Self {
        self.verdict = status;
        self
    }

    pub fn apply(mut self, result: ApplySnapshotChunkResult) -> Self {
        self.apply = result;
        self
    }

    /// Validator keys returned from InitChain and as FinalizeBlock updates.
    pub fn validators(mut self, keys: &[&'static str]) -> Self {
        self.validators = keys.to_vec();
        self
    }

    /// One FinalizeBlock tx result per code.
    pub fn tx_codes(mut self, codes: &[u32]) -> Self {
        self.tx_codes = codes.to_vec();
        self
    }

    fn validator_updates(&self) -> Vec<ValidatorUpdate> {
        self.validators
            .iter()
            .map(|key| ValidatorUpdate {
                pub_key: key.to_string(),
                power: 1,
            })
            .collect()
    }

    /// Write `key` into the store's open batch during FinalizeBlock.
    pub fn writes(mut self, store: Arc<ChainStore>, key: &'static str) -> Self {
        self.writes = Some((store, key));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), ModuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            Some(message) => Err(ModuleError::handler(self.lifecycle.name(), message)),
            None => Ok(()),
        }
    }
}

/// Erase concrete types for registration.
pub fn modules(list: &[&Arc<Scripted>]) -> Vec<Arc<dyn Module>> {
    list.iter()
        .map(|m| {
            let m: Arc<dyn Module> = (*m).clone();
            m
        })
        .collect()
}

#[async_trait]
impl Application for Scripted {
    async fn info(&self, _req: &InfoRequest) -> Result<InfoResponse, ModuleError> {
        self.enter()?;
        Ok(InfoResponse {
            data: self.lifecycle.name().to_string(),
            last_block_height: self.info_height,
            ..Default::default()
        })
    }

    async fn query(&self, _req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        self.enter()?;
        Ok(QueryResponse {
            value: self.value.clone(),
            ..Default::default()
        })
    }

    async fn check_tx(&self, _req: &CheckTxRequest) -> Result<CheckTxResponse, ModuleError> {
        self.enter()?;
        if self.check_code == 0 {
            return Ok(CheckTxResponse::default());
        }
        Ok(CheckTxResponse::reject(
            self.check_code,
            self.lifecycle.name().to_string(),
        ))
    }

    async fn init_chain(&self, _req: &InitChainRequest) -> Result<InitChainResponse, ModuleError> {
        self.enter()?;
        Ok(InitChainResponse {
            validators: self.validator_updates(),
            app_hash: self.app_hash.clone(),
        })
    }

    async fn prepare_proposal(
        &self,
        _req: &PrepareProposalRequest,
    ) -> Result<PrepareProposalResponse, ModuleError> {
        self.enter()?;
        Ok(PrepareProposalResponse {
            txs: self.txs.clone(),
        })
    }

    async fn process_proposal(
        &self,
        _req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        self.enter()?;
        Ok(ProcessProposalResponse {
            status: self.verdict,
        })
    }

    async fn finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        if let Some((store, key)) = &self.writes {
            store.set(key.as_bytes().to_vec(), req.height.to_be_bytes().to_vec())?;
        }
        self.enter()?;
        Ok(FinalizeBlockResponse {
            tx_results: self
                .tx_codes
                .iter()
                .map(|&code| ExecTxResult {
                    code,
                    ..Default::default()
                })
                .collect(),
            validator_updates: self.validator_updates(),
            events: self.events.iter().map(|k| Event::new(*k)).collect(),
            app_hash: self.app_hash.clone(),
        })
    }

    async fn extend_vote(&self, _req: &ExtendVoteRequest) -> Result<ExtendVoteResponse, ModuleError> {
        self.enter()?;
        Ok(ExtendVoteResponse {
            vote_extension: self.extension.clone(),
        })
    }

    async fn verify_vote_extension(
        &self,
        _req: &VerifyVoteExtensionRequest,
    ) -> Result<VerifyVoteExtensionResponse, ModuleError> {
        self.enter()?;
        Ok(VerifyVoteExtensionResponse {
            status: self.verdict,
        })
    }

    async fn commit(&self) -> Result<CommitResponse, ModuleError> {
        self.enter()?;
        Ok(CommitResponse {
            retain_height: self.retain,
        })
    }

    async fn list_snapshots(&self) -> Result<ListSnapshotsResponse, ModuleError> {
        self.enter()?;
        Ok(ListSnapshotsResponse {
            snapshots: self
                .snapshots
                .iter()
                .map(|&height| Snapshot {
                    height,
                    format: 1,
                    chunks: 1,
                    hash: vec![0; 32],
                    metadata: Vec::new(),
                })
                .collect(),
        })
    }

    async fn offer_snapshot(
        &self,
        _req: &OfferSnapshotRequest,
    ) -> Result<OfferSnapshotResponse, ModuleError> {
        self.enter()?;
        Ok(OfferSnapshotResponse { result: self.offer })
    }

    async fn load_snapshot_chunk(
        &self,
        _req: &LoadSnapshotChunkRequest,
    ) -> Result<LoadSnapshotChunkResponse, ModuleError> {
        self.enter()?;
        Ok(LoadSnapshotChunkResponse {
            chunk: self.chunk.clone(),
        })
    }

    async fn apply_snapshot_chunk(
        &self,
        _req: &ApplySnapshotChunkRequest,
    ) -> Result<ApplySnapshotChunkResponse, ModuleError> {
        self.enter()?;
        Ok(ApplySnapshotChunkResponse {
            result: self.apply,
            ..Default::default()
        })
    }
}

impl Module for Scripted {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}
