//! # Module Container
//!
//! Builds every module once, registers them with the router and wires the
//! dependency gates. Launch order does not matter; the gates encode who
//! waits for whom:
//!
//! ```text
//! startup:   account ─┐
//!            chain ───┼──→ consensus ─┐
//!            validator┤               ├──→ gateway
//!            statesync┘   storage ────┤
//!                         system ─────┘
//!
//! shutdown:  gateway ──→ consensus ──→ account, chain, validator,
//!                                      statesync, storage, system
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use cc_01_account::AccountModule;
use cc_02_chain::{ChainConfig, ChainModule};
use cc_03_validator::ValidatorModule;
use cc_04_statesync::StateSyncModule;
use cc_05_storage::StorageModule;
use cc_06_system::SystemModule;
use cc_07_api_gateway::{AppState, GatewayError, GatewayModule};
use chain_store::{open_store, BlockCommitter, ChainStore, LocalStore, StoreBackend};
use shared_types::{CallbackKind, Module, StoreError, TxBroadcaster};

use crate::adapters::{ConsensusAdapter, ConsensusEngine, SoloEngine};
use crate::container::config::{GenesisConfig, NodeConfig};
use crate::router::{Registration, Router};

pub const CHAIN_DB: &str = "chain.db";
pub const LOCAL_DB: &str = "local.db";

/// Errors raised while assembling the node.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to open {name}: {source}")]
    Store { name: &'static str, source: StoreError },

    #[error("failed to create data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error("genesis chain id {genesis} does not match configured chain id {config}")]
    ChainIdMismatch { genesis: String, config: String },

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
}

/// Every module of a node, assembled and wired.
pub struct NodeModules {
    pub chain_store: Arc<ChainStore>,
    pub local_store: Arc<LocalStore>,
    pub account: Arc<AccountModule>,
    pub chain: Arc<ChainModule>,
    pub validator: Arc<ValidatorModule>,
    pub statesync: Arc<StateSyncModule>,
    pub storage: Arc<StorageModule>,
    pub system: Arc<SystemModule>,
    pub engine: Arc<SoloEngine>,
    pub consensus: Arc<ConsensusAdapter>,
    pub gateway: Arc<GatewayModule>,
}

impl NodeModules {
    /// Open the stores under `<home>/data` and assemble.
    pub fn open(config: &NodeConfig, genesis: GenesisConfig) -> Result<Self, AssemblyError> {
        let backend = config.storage.backend;
        if backend != StoreBackend::Memory {
            std::fs::create_dir_all(config.data_dir())?;
        }
        let chain_db = open_store(backend, config.data_dir().join(CHAIN_DB)).map_err(|source| {
            AssemblyError::Store {
                name: CHAIN_DB,
                source,
            }
        })?;
        let local_db = open_store(backend, config.data_dir().join(LOCAL_DB)).map_err(|source| {
            AssemblyError::Store {
                name: LOCAL_DB,
                source,
            }
        })?;
        Self::with_stores(
            config,
            genesis,
            Arc::new(ChainStore::new(chain_db)),
            Arc::new(LocalStore::new(local_db)),
        )
    }

    /// Assemble over existing stores.
    pub fn with_stores(
        config: &NodeConfig,
        genesis: GenesisConfig,
        chain_store: Arc<ChainStore>,
        local_store: Arc<LocalStore>,
    ) -> Result<Self, AssemblyError> {
        if genesis.chain_id != config.chain_id {
            return Err(AssemblyError::ChainIdMismatch {
                genesis: genesis.chain_id,
                config: config.chain_id.clone(),
            });
        }

        let account = Arc::new(AccountModule::new(chain_store.clone()));
        let chain = Arc::new(ChainModule::new(
            chain_store.clone(),
            ChainConfig {
                retain_blocks: config.storage.retain_blocks,
                max_tx_bytes: config.engine.max_tx_bytes,
                ..Default::default()
            },
        ));
        let validator = Arc::new(ValidatorModule::new(chain_store.clone()));
        let statesync = Arc::new(StateSyncModule::new(
            chain_store.clone(),
            local_store.clone(),
            config.statesync.clone(),
        ));
        let storage = Arc::new(StorageModule::new(
            local_store.clone(),
            config.storage.max_file_size,
        ));
        let system = Arc::new(SystemModule::new(chain_store.clone()));

        let committer: Arc<dyn BlockCommitter> = chain_store.clone();
        let router = Arc::new(
            register(&account, &chain, &validator, &statesync)
                .with_committer(committer)
                .build(),
        );

        let engine = Arc::new(SoloEngine::new(config.engine.clone(), genesis));
        let consensus_engine: Arc<dyn ConsensusEngine> = engine.clone();
        let consensus = Arc::new(ConsensusAdapter::new(router, consensus_engine));

        let broadcaster: Arc<dyn TxBroadcaster> = engine.clone();
        let gateway = Arc::new(GatewayModule::new(
            config.http.clone(),
            AppState {
                account: account.clone(),
                chain: chain.clone(),
                validator: validator.clone(),
                storage: storage.clone(),
                system: system.clone(),
                broadcaster,
            },
        )?);

        let modules = Self {
            chain_store,
            local_store,
            account,
            chain,
            validator,
            statesync,
            storage,
            system,
            engine,
            consensus,
            gateway,
        };
        modules.wire();
        Ok(modules)
    }

    /// Register dependency gates and health tracking.
    fn wire(&self) {
        self.consensus.lifecycle().register_startup_deps([
            self.account.ready(),
            self.chain.ready(),
            self.validator.ready(),
            self.statesync.ready(),
        ]);
        self.gateway.lifecycle().register_startup_deps([
            self.consensus.ready(),
            self.storage.ready(),
            self.system.ready(),
        ]);

        self.consensus
            .lifecycle()
            .register_shutdown_deps([self.gateway.stopped()]);
        for store_owner in self.store_owners() {
            store_owner
                .lifecycle()
                .register_shutdown_deps([self.consensus.stopped()]);
        }

        for module in self.all() {
            if module.name() != self.system.name() {
                self.system.track(&module);
            }
        }
        info!(modules = self.all().len(), "modules assembled");
    }

    fn store_owners(&self) -> Vec<Arc<dyn Module>> {
        vec![
            self.account.clone(),
            self.chain.clone(),
            self.validator.clone(),
            self.statesync.clone(),
            self.storage.clone(),
            self.system.clone(),
        ]
    }

    /// Every module the supervisor runs.
    pub fn all(&self) -> Vec<Arc<dyn Module>> {
        let mut all = self.store_owners();
        all.push(self.consensus.clone());
        all.push(self.gateway.clone());
        all
    }

    pub fn router(&self) -> Arc<Router> {
        self.consensus.router()
    }
}

/// Dispatch order per callback kind.
fn register(
    account: &Arc<AccountModule>,
    chain: &Arc<ChainModule>,
    validator: &Arc<ValidatorModule>,
    statesync: &Arc<StateSyncModule>,
) -> Registration {
    let account: Arc<dyn Module> = account.clone();
    let chain: Arc<dyn Module> = chain.clone();
    let validator: Arc<dyn Module> = validator.clone();
    let statesync: Arc<dyn Module> = statesync.clone();

    Registration::new()
        .register(CallbackKind::Info, vec![chain.clone()])
        .register(
            CallbackKind::Query,
            vec![account.clone(), validator.clone(), chain.clone()],
        )
        .register(
            CallbackKind::CheckTx,
            vec![account.clone(), validator.clone(), chain.clone()],
        )
        .register(CallbackKind::InitChain, vec![validator.clone(), chain.clone()])
        .register(CallbackKind::PrepareProposal, vec![chain.clone()])
        .register(
            CallbackKind::ProcessProposal,
            vec![account.clone(), validator.clone(), chain.clone()],
        )
        .register(
            CallbackKind::FinalizeBlock,
            vec![account, validator, chain.clone()],
        )
        .register(CallbackKind::ExtendVote, vec![chain.clone()])
        .register(CallbackKind::VerifyVoteExtension, vec![chain.clone()])
        .register(CallbackKind::Commit, vec![chain, statesync.clone()])
        .register(CallbackKind::ListSnapshots, vec![statesync.clone()])
        .register(CallbackKind::OfferSnapshot, vec![statesync.clone()])
        .register(CallbackKind::LoadSnapshotChunk, vec![statesync.clone()])
        .register(CallbackKind::ApplySnapshotChunk, vec![statesync])
}
