//! # Callback Protocol
//!
//! Request and response shapes for every point at which the consensus engine
//! calls into the application. Every response type implements `Default`; the
//! default value is the zero response a module returns for a callback it does
//! not handle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::ValidatorUpdate;

/// The closed set of callbacks the consensus engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CallbackKind {
    Info,
    Query,
    CheckTx,
    InitChain,
    PrepareProposal,
    ProcessProposal,
    FinalizeBlock,
    ExtendVote,
    VerifyVoteExtension,
    Commit,
    ListSnapshots,
    OfferSnapshot,
    LoadSnapshotChunk,
    ApplySnapshotChunk,
}

impl CallbackKind {
    /// Wire name, used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Query => "query",
            Self::CheckTx => "check_tx",
            Self::InitChain => "init_chain",
            Self::PrepareProposal => "prepare_proposal",
            Self::ProcessProposal => "process_proposal",
            Self::FinalizeBlock => "finalize_block",
            Self::ExtendVote => "extend_vote",
            Self::VerifyVoteExtension => "verify_vote_extension",
            Self::Commit => "commit",
            Self::ListSnapshots => "list_snapshots",
            Self::OfferSnapshot => "offer_snapshot",
            Self::LoadSnapshotChunk => "load_snapshot_chunk",
            Self::ApplySnapshotChunk => "apply_snapshot_chunk",
        }
    }

    /// All callback kinds in protocol order.
    pub fn all() -> [CallbackKind; 14] {
        [
            Self::Info,
            Self::Query,
            Self::CheckTx,
            Self::InitChain,
            Self::PrepareProposal,
            Self::ProcessProposal,
            Self::FinalizeBlock,
            Self::ExtendVote,
            Self::VerifyVoteExtension,
            Self::Commit,
            Self::ListSnapshots,
            Self::OfferSnapshot,
            Self::LoadSnapshotChunk,
            Self::ApplySnapshotChunk,
        ]
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Response code meaning "accepted".
pub const CODE_OK: u32 = 0;

// =============================================================================
// INFO / QUERY
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    pub version: String,
    pub block_version: u64,
    pub p2p_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub data: String,
    pub version: String,
    pub app_version: u64,
    pub last_block_height: u64,
    pub last_block_app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub code: u32,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub height: u64,
}

// =============================================================================
// MEMPOOL
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckTxKind {
    #[default]
    New,
    Recheck,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTxRequest {
    pub tx: Vec<u8>,
    pub kind: CheckTxKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTxResponse {
    pub code: u32,
    pub log: String,
    pub gas_wanted: i64,
}

impl CheckTxResponse {
    /// Rejection with the given non-zero code.
    pub fn reject(code: u32, log: impl Into<String>) -> Self {
        Self {
            code,
            log: log.into(),
            gas_wanted: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

// =============================================================================
// CONSENSUS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChainRequest {
    pub chain_id: String,
    /// Genesis time, unix milliseconds.
    pub time: i64,
    pub validators: Vec<ValidatorUpdate>,
    pub app_state_bytes: Vec<u8>,
    pub initial_height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChainResponse {
    pub validators: Vec<ValidatorUpdate>,
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareProposalRequest {
    pub txs: Vec<Vec<u8>>,
    pub max_tx_bytes: i64,
    pub height: u64,
    pub time: i64,
    pub proposer: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareProposalResponse {
    pub txs: Vec<Vec<u8>>,
}

/// Verdict on a proposal or a vote extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[default]
    Unknown,
    Accept,
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessProposalRequest {
    pub txs: Vec<Vec<u8>>,
    pub height: u64,
    pub hash: Vec<u8>,
    pub time: i64,
    pub proposer: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessProposalResponse {
    pub status: ProposalStatus,
}

impl ProcessProposalResponse {
    pub fn accept() -> Self {
        Self {
            status: ProposalStatus::Accept,
        }
    }

    pub fn reject() -> Self {
        Self {
            status: ProposalStatus::Reject,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeBlockRequest {
    pub txs: Vec<Vec<u8>>,
    pub height: u64,
    pub hash: Vec<u8>,
    pub time: i64,
    pub proposer: Vec<u8>,
}

/// A typed occurrence emitted while executing a block or a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Outcome of executing one transaction inside a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTxResult {
    pub code: u32,
    pub data: Vec<u8>,
    pub log: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeBlockResponse {
    pub events: Vec<Event>,
    pub tx_results: Vec<ExecTxResult>,
    pub validator_updates: Vec<ValidatorUpdate>,
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendVoteRequest {
    pub height: u64,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendVoteResponse {
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyVoteExtensionRequest {
    pub height: u64,
    pub hash: Vec<u8>,
    pub validator: Vec<u8>,
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyVoteExtensionResponse {
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub retain_height: u64,
}

// =============================================================================
// STATE SYNC
// =============================================================================

/// Descriptor of a state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub height: u64,
    pub format: u32,
    pub chunks: u32,
    pub hash: Vec<u8>,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSnapshotsResponse {
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferSnapshotResult {
    #[default]
    Unknown,
    Accept,
    Abort,
    Reject,
    RejectFormat,
    RejectSender,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSnapshotRequest {
    pub snapshot: Snapshot,
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSnapshotResponse {
    pub result: OfferSnapshotResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSnapshotChunkRequest {
    pub height: u64,
    pub format: u32,
    pub chunk: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSnapshotChunkResponse {
    pub chunk: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplySnapshotChunkResult {
    #[default]
    Unknown,
    Accept,
    Abort,
    Retry,
    RetrySnapshot,
    RejectSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySnapshotChunkRequest {
    pub index: u32,
    pub chunk: Vec<u8>,
    pub sender: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySnapshotChunkResponse {
    pub result: ApplySnapshotChunkResult,
    pub refetch_chunks: Vec<u32>,
    pub reject_senders: Vec<String>,
}
