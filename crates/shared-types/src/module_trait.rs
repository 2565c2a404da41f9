//! # Module Trait
//!
//! Contract every feature unit implements to take part in callback dispatch
//! and in the gated lifecycle.
//!
//! - [`Application`] is the capability set: one handler per callback kind,
//!   each defaulting to the zero response.
//! - [`Module`] adds identity and start/stop hooks.
//! - [`Lifecycle`] is the default implementation object a module delegates
//!   to for its gates and dependency bookkeeping.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use shared_types::{Application, Lifecycle, Module};
//! use async_trait::async_trait;
//!
//! pub struct MyModule { lifecycle: Lifecycle }
//!
//! #[async_trait]
//! impl Application for MyModule {}
//!
//! impl Module for MyModule {
//!     fn name(&self) -> &str { "my-module" }
//!     fn lifecycle(&self) -> &Lifecycle { &self.lifecycle }
//! }
//! ```

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::abci::*;
use crate::errors::ModuleError;
use crate::gate::{await_all, DependencyGate};

/// Callback handlers. Every method returns the zero response by default, so
/// a module only overrides the callbacks it cares about.
#[async_trait]
pub trait Application: Send + Sync {
    async fn info(&self, _req: &InfoRequest) -> Result<InfoResponse, ModuleError> {
        Ok(InfoResponse::default())
    }

    async fn query(&self, _req: &QueryRequest) -> Result<QueryResponse, ModuleError> {
        Ok(QueryResponse::default())
    }

    async fn check_tx(&self, _req: &CheckTxRequest) -> Result<CheckTxResponse, ModuleError> {
        Ok(CheckTxResponse::default())
    }

    async fn init_chain(
        &self,
        _req: &InitChainRequest,
    ) -> Result<InitChainResponse, ModuleError> {
        Ok(InitChainResponse::default())
    }

    async fn prepare_proposal(
        &self,
        _req: &PrepareProposalRequest,
    ) -> Result<PrepareProposalResponse, ModuleError> {
        Ok(PrepareProposalResponse::default())
    }

    async fn process_proposal(
        &self,
        _req: &ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, ModuleError> {
        Ok(ProcessProposalResponse::default())
    }

    async fn finalize_block(
        &self,
        _req: &FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, ModuleError> {
        Ok(FinalizeBlockResponse::default())
    }

    async fn extend_vote(
        &self,
        _req: &ExtendVoteRequest,
    ) -> Result<ExtendVoteResponse, ModuleError> {
        Ok(ExtendVoteResponse::default())
    }

    async fn verify_vote_extension(
        &self,
        _req: &VerifyVoteExtensionRequest,
    ) -> Result<VerifyVoteExtensionResponse, ModuleError> {
        Ok(VerifyVoteExtensionResponse::default())
    }

    async fn commit(&self) -> Result<CommitResponse, ModuleError> {
        Ok(CommitResponse::default())
    }

    async fn list_snapshots(&self) -> Result<ListSnapshotsResponse, ModuleError> {
        Ok(ListSnapshotsResponse::default())
    }

    async fn offer_snapshot(
        &self,
        _req: &OfferSnapshotRequest,
    ) -> Result<OfferSnapshotResponse, ModuleError> {
        Ok(OfferSnapshotResponse::default())
    }

    async fn load_snapshot_chunk(
        &self,
        _req: &LoadSnapshotChunkRequest,
    ) -> Result<LoadSnapshotChunkResponse, ModuleError> {
        Ok(LoadSnapshotChunkResponse::default())
    }

    async fn apply_snapshot_chunk(
        &self,
        _req: &ApplySnapshotChunkRequest,
    ) -> Result<ApplySnapshotChunkResponse, ModuleError> {
        Ok(ApplySnapshotChunkResponse::default())
    }
}

/// Entry point for externally submitted transactions. Implemented by the
/// consensus-engine side, consumed by the RPC gateway.
#[async_trait]
pub trait TxBroadcaster: Send + Sync {
    /// Run CheckTx and, if accepted, hand the transaction to the engine.
    async fn broadcast_tx(&self, tx: Vec<u8>) -> Result<CheckTxResponse, ModuleError>;
}

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    /// Assembled, start not yet called.
    Registered,
    /// Waiting on startup dependencies or initializing.
    Starting,
    /// Readiness gate open.
    Running,
    /// Waiting on shutdown dependencies or tearing down.
    Stopping,
    /// Stopped gate open.
    Stopped,
    /// Start failed before readiness.
    Failed,
}

impl ModuleStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A named feature unit with a gated start/stop lifecycle.
///
/// `start` may run for the life of the node (a server loop) or return once
/// the module is ready; both are fine under the supervisor. The provided
/// implementations delegate to [`Lifecycle`].
#[async_trait]
pub trait Module: Application {
    fn name(&self) -> &str;

    fn lifecycle(&self) -> &Lifecycle;

    async fn start(&self, cancel: CancellationToken) -> Result<(), ModuleError> {
        self.lifecycle().start(&cancel).await
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.lifecycle().stop().await;
        Ok(())
    }

    fn ready(&self) -> DependencyGate {
        self.lifecycle().ready()
    }

    fn stopped(&self) -> DependencyGate {
        self.lifecycle().stopped()
    }

    fn status(&self) -> ModuleStatus {
        self.lifecycle().status()
    }
}

/// Gates and dependency lists shared by every module.
pub struct Lifecycle {
    name: String,
    ready: DependencyGate,
    stopped: DependencyGate,
    startup_deps: Mutex<Vec<DependencyGate>>,
    shutdown_deps: Mutex<Vec<DependencyGate>>,
    status: RwLock<ModuleStatus>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ready: DependencyGate::new(format!("{name}.ready")),
            stopped: DependencyGate::new(format!("{name}.stopped")),
            name,
            startup_deps: Mutex::new(Vec::new()),
            shutdown_deps: Mutex::new(Vec::new()),
            status: RwLock::new(ModuleStatus::Registered),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ready(&self) -> DependencyGate {
        self.ready.clone()
    }

    pub fn stopped(&self) -> DependencyGate {
        self.stopped.clone()
    }

    pub fn status(&self) -> ModuleStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: ModuleStatus) {
        *self.status.write() = status;
    }

    /// Gates that must be open before this module starts.
    pub fn register_startup_deps(&self, gates: impl IntoIterator<Item = DependencyGate>) {
        self.startup_deps.lock().extend(gates);
    }

    /// Gates that must be open before this module stops.
    pub fn register_shutdown_deps(&self, gates: impl IntoIterator<Item = DependencyGate>) {
        self.shutdown_deps.lock().extend(gates);
    }

    pub async fn await_startup_deps(&self, cancel: &CancellationToken) -> Result<(), ModuleError> {
        let deps = self.startup_deps.lock().clone();
        if !deps.is_empty() {
            debug!(module = %self.name, deps = deps.len(), "awaiting startup dependencies");
        }
        await_all(&deps, cancel).await
    }

    pub async fn await_shutdown_deps(&self) {
        let deps = self.shutdown_deps.lock().clone();
        if !deps.is_empty() {
            debug!(module = %self.name, deps = deps.len(), "awaiting shutdown dependencies");
        }
        // Shutdown is bounded by the supervisor's grace deadline, not here.
        let _ = await_all(&deps, &CancellationToken::new()).await;
    }

    pub fn mark_ready(&self) {
        self.set_status(ModuleStatus::Running);
        self.ready.open();
    }

    pub fn mark_stopped(&self) {
        self.set_status(ModuleStatus::Stopped);
        self.stopped.open();
    }

    /// Await startup dependencies, then open the readiness gate.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), ModuleError> {
        self.begin_start(cancel).await?;
        self.mark_ready();
        Ok(())
    }

    /// Await startup dependencies without opening the readiness gate, for
    /// modules with their own initialization step.
    pub async fn begin_start(&self, cancel: &CancellationToken) -> Result<(), ModuleError> {
        self.set_status(ModuleStatus::Starting);
        if let Err(e) = self.await_startup_deps(cancel).await {
            self.set_status(ModuleStatus::Failed);
            return Err(e);
        }
        info!(module = %self.name, "starting");
        Ok(())
    }

    /// Await shutdown dependencies, then open the stopped gate.
    pub async fn stop(&self) {
        self.begin_stop().await;
        self.mark_stopped();
    }

    pub async fn begin_stop(&self) {
        self.set_status(ModuleStatus::Stopping);
        self.await_shutdown_deps().await;
        info!(module = %self.name, "stopping");
    }
}
