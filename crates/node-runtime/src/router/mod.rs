//! # Callback Router
//!
//! The router is the single [`Application`] the consensus engine talks to.
//! Each callback is fanned out to the modules registered for its kind, in
//! registration order, and their answers are folded into one response:
//!
//! | Kind | Reduction |
//! |------|-----------|
//! | Info | last response |
//! | Query | first response with a non-empty value |
//! | CheckTx | first non-zero code short-circuits |
//! | InitChain | validators and app hash: last non-empty |
//! | PrepareProposal | request txs, replaced by the last non-empty list |
//! | ProcessProposal, VerifyVoteExtension | first Reject short-circuits |
//! | FinalizeBlock | events appended; results, updates, app hash: last non-empty |
//! | ExtendVote | extensions concatenated |
//! | Commit | highest retain height |
//! | ListSnapshots | snapshots concatenated |
//! | OfferSnapshot, ApplySnapshotChunk | first non-Accept short-circuits |
//! | LoadSnapshotChunk | first non-empty chunk |
//!
//! The first module error aborts the dispatch and is returned unchanged.
//!
//! When built with a [`BlockCommitter`], FinalizeBlock opens the block batch
//! before any module runs (and discards it on error) and Commit writes it
//! before the Commit handlers run. InitChain runs inside its own batch.

mod registration;

pub use registration::Registration;

use async_trait::async_trait;
use prometheus::HistogramTimer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use cadence_telemetry::{
    BLOCKS_FINALIZED, CALLBACKS_DISPATCHED, CALLBACK_DURATION, CHAIN_HEIGHT, MODULE_ERRORS,
    TXS_REJECTED,
};
use chain_store::BlockCommitter;
use shared_types::{
    Application, ApplySnapshotChunkRequest, ApplySnapshotChunkResponse, ApplySnapshotChunkResult,
    CallbackKind, CheckTxRequest, CheckTxResponse, CommitResponse, ExtendVoteRequest,
    ExtendVoteResponse, FinalizeBlockRequest, FinalizeBlockResponse, InfoRequest, InfoResponse,
    InitChainRequest, InitChainResponse, ListSnapshotsResponse, LoadSnapshotChunkRequest,
    LoadSnapshotChunkResponse, Module, ModuleError, OfferSnapshotRequest, OfferSnapshotResponse,
    OfferSnapshotResult, PrepareProposalRequest, PrepareProposalResponse, ProcessProposalRequest,
    ProcessProposalResponse, ProposalStatus, QueryRequest, QueryResponse,
    VerifyVoteExtensionRequest, VerifyVoteExtensionResponse,
};

/// Immutable dispatch table plus the optional block-batch hook.
pub struct Router {
    handlers: HashMap<CallbackKind, Vec<Arc<dyn Module>>>,
    committer: Option<Arc<dyn BlockCommitter>>,
}

impl Router {
    fn new(
        handlers: HashMap<CallbackKind, Vec<Arc<dyn Module>>>,
        committer: Option<Arc<dyn BlockCommitter>>,
    ) -> Self {
        Self {
            handlers,
            committer,
        }
    }

    fn modules(&self, kind: CallbackKind) -> &[Arc<dyn Module>] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Count the dispatch and time it until the returned timer drops.
    fn observe(kind: CallbackKind) -> HistogramTimer {
        CALLBACKS_DISPATCHED.with_label_values(&[kind.name()]).inc();
        CALLBACK_DURATION
            .with_label_values(&[kind.name()])
            .start_timer()
    }

    fn invoking(module: &dyn Module, kind: CallbackKind) {
        debug!(module = module.name(), kind = kind.name(), "invoking module");
    }

    fn failed(module: &dyn Module, kind: CallbackKind, err: ModuleError) -> ModuleError {
        MODULE_ERRORS
            .with_label_values(&[module.name(), kind.name()])
            .inc();
        warn!(module = module.name(), kind = kind.name(), error = %err, "module handler failed");
        err
    }

    fn begin_batch(&self) -> Result<(), ModuleError> {
        match &self.committer {
            Some(c) => Ok(c.begin_block()?),
            None => Ok(()),
        }
    }

    fn commit_batch(&self) -> Result<(), ModuleError> {
        match &self.committer {
            Some(c) => Ok(c.commit_block()?),
            None => Ok(()),
        }
    }

    fn abort_batch(&self) {
        if let Some(c) = &self.committer {
            c.abort_block();
        }
    }

    async fn run_init_chain(&self, req: &InitChainRequest) -> Result<InitChainResponse, ModuleError> {
        let kind = CallbackKind::InitChain;
        let mut merged = InitChainResponse::default();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .init_chain(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if !resp.validators.is_empty() {
                merged.validators = resp.validators;
            }
            if !resp.app_hash.is_empty() {
                merged.app_hash = resp.app_hash;
            }
        }
        Ok(merged)
    }

    async fn run_finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        let kind = CallbackKind::FinalizeBlock;
        let mut merged = FinalizeBlockResponse::default();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .finalize_block(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            merged.events.extend(resp.events);
            if !resp.tx_results.is_empty() {
                merged.tx_results = resp.tx_results;
            }
            if !resp.validator_updates.is_empty() {
                merged.validator_updates = resp.validator_updates;
            }
            if !resp.app_hash.is_empty() {
                merged.app_hash = resp.app_hash;
            }
        }
        Ok(merged)
    }
}

#[async_trait]
impl Application for Router {
    #[instrument(level = "debug", skip_all)]
    async fn info(&self, req: &InfoRequest) -> Result<InfoResponse, ModuleError> {
        let kind = CallbackKind::Info;
        let _timer = Self::observe(kind);
        let mut merged = InfoResponse::default();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            merged = m
                .info(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
        }
        Ok(merged)
    }

    #[instrument(level = "debug", skip_all)]
    async fn query(&self, req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        let kind = CallbackKind::Query;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .query(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if !resp.value.is_empty() {
                return Ok(resp);
            }
        }
        Ok(QueryResponse::default())
    }

    #[instrument(level = "debug", skip_all)]
    async fn check_tx(&self, req: &CheckTxRequest) -> Result<CheckTxResponse, ModuleError> {
        let kind = CallbackKind::CheckTx;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .check_tx(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if !resp.is_ok() {
                TXS_REJECTED.inc();
                debug!(module = m.name(), code = resp.code, log = %resp.log, "tx rejected");
                return Ok(resp);
            }
        }
        Ok(CheckTxResponse::default())
    }

    #[instrument(level = "debug", skip_all)]
    async fn init_chain(&self, req: &InitChainRequest) -> Result<InitChainResponse, ModuleError> {
        let kind = CallbackKind::InitChain;
        let _timer = Self::observe(kind);
        self.begin_batch()?;
        match self.run_init_chain(req).await {
            Ok(resp) => {
                self.commit_batch()?;
                Ok(resp)
            }
            Err(e) => {
                self.abort_batch();
                Err(e)
            }
        }
    }

    #[instrument(level = "debug", skip_all)]
    async fn prepare_proposal(
        &self,
        req: &PrepareProposalRequest,
    ) -> Result<PrepareProposalResponse, ModuleError> {
        let kind = CallbackKind::PrepareProposal;
        let _timer = Self::observe(kind);
        let mut txs = req.txs.clone();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .prepare_proposal(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if !resp.txs.is_empty() {
                txs = resp.txs;
            }
        }
        Ok(PrepareProposalResponse { txs })
    }

    #[instrument(level = "debug", skip_all)]
    async fn process_proposal(
        &self,
        req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        let kind = CallbackKind::ProcessProposal;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .process_proposal(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if resp.status == ProposalStatus::Reject {
                debug!(module = m.name(), height = req.height, "proposal rejected");
                return Ok(resp);
            }
        }
        Ok(ProcessProposalResponse::accept())
    }

    #[instrument(level = "debug", skip_all, fields(height = req.height))]
    async fn finalize_block(
        &self,
        req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        let kind = CallbackKind::FinalizeBlock;
        let _timer = Self::observe(kind);
        self.begin_batch()?;
        match self.run_finalize_block(req).await {
            Ok(resp) => {
                CHAIN_HEIGHT.set(req.height as f64);
                Ok(resp)
            }
            Err(e) => {
                self.abort_batch();
                Err(e)
            }
        }
    }

    #[instrument(level = "debug", skip_all)]
    async fn extend_vote(&self, req: &ExtendVoteRequest) -> Result<ExtendVoteResponse, ModuleError> {
        let kind = CallbackKind::ExtendVote;
        let _timer = Self::observe(kind);
        let mut merged = ExtendVoteResponse::default();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .extend_vote(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            merged.vote_extension.extend(resp.vote_extension);
        }
        Ok(merged)
    }

    #[instrument(level = "debug", skip_all)]
    async fn verify_vote_extension(
        &self,
        req: &VerifyVoteExtensionRequest,
    ) -> Result<VerifyVoteExtensionResponse, ModuleError> {
        let kind = CallbackKind::VerifyVoteExtension;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .verify_vote_extension(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if resp.status == ProposalStatus::Reject {
                return Ok(resp);
            }
        }
        Ok(VerifyVoteExtensionResponse {
            status: ProposalStatus::Accept,
        })
    }

    #[instrument(level = "debug", skip_all)]
    async fn commit(&self) -> Result<CommitResponse, ModuleError> {
        let kind = CallbackKind::Commit;
        let _timer = Self::observe(kind);
        if self.committer.is_some() {
            self.commit_batch()?;
            BLOCKS_FINALIZED.inc();
        }
        let mut retain_height = 0;
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .commit()
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            retain_height = retain_height.max(resp.retain_height);
        }
        Ok(CommitResponse { retain_height })
    }

    #[instrument(level = "debug", skip_all)]
    async fn list_snapshots(&self) -> Result<ListSnapshotsResponse, ModuleError> {
        let kind = CallbackKind::ListSnapshots;
        let _timer = Self::observe(kind);
        let mut merged = ListSnapshotsResponse::default();
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .list_snapshots()
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            merged.snapshots.extend(resp.snapshots);
        }
        Ok(merged)
    }

    #[instrument(level = "debug", skip_all)]
    async fn offer_snapshot(
        &self,
        req: &OfferSnapshotRequest,
    ) -> Result<OfferSnapshotResponse, ModuleError> {
        let kind = CallbackKind::OfferSnapshot;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .offer_snapshot(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if resp.result != OfferSnapshotResult::Accept {
                return Ok(resp);
            }
        }
        Ok(OfferSnapshotResponse {
            result: OfferSnapshotResult::Accept,
        })
    }

    #[instrument(level = "debug", skip_all)]
    async fn load_snapshot_chunk(
        &self,
        req: &LoadSnapshotChunkRequest,
    ) -> Result<LoadSnapshotChunkResponse, ModuleError> {
        let kind = CallbackKind::LoadSnapshotChunk;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .load_snapshot_chunk(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if !resp.chunk.is_empty() {
                return Ok(resp);
            }
        }
        Ok(LoadSnapshotChunkResponse::default())
    }

    #[instrument(level = "debug", skip_all)]
    async fn apply_snapshot_chunk(
        &self,
        req: &ApplySnapshotChunkRequest,
    ) -> Result<ApplySnapshotChunkResponse, ModuleError> {
        let kind = CallbackKind::ApplySnapshotChunk;
        let _timer = Self::observe(kind);
        for m in self.modules(kind) {
            Self::invoking(m.as_ref(), kind);
            let resp = m
                .apply_snapshot_chunk(req)
                .await
                .map_err(|e| Self::failed(m.as_ref(), kind, e))?;
            if resp.result != ApplySnapshotChunkResult::Accept {
                return Ok(resp);
            }
        }
        Ok(ApplySnapshotChunkResponse {
            result: ApplySnapshotChunkResult::Accept,
            ..Default::default()
        })
    }
}
