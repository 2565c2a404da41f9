//! The assembled node: configuration, modules and their supervisor.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use chain_store::{ChainStore, LocalStore};
use shared_types::ModuleError;

use crate::container::{AssemblyError, GenesisConfig, NodeConfig, NodeModules};
use crate::supervisor::Supervisor;

pub struct App {
    config: NodeConfig,
    modules: NodeModules,
}

impl App {
    /// Open the stores under the configured home and assemble the node.
    pub fn new(config: NodeConfig, genesis: GenesisConfig) -> Result<Self, AssemblyError> {
        let modules = NodeModules::open(&config, genesis)?;
        Ok(Self { config, modules })
    }

    /// Assemble over caller-provided stores.
    pub fn with_stores(
        config: NodeConfig,
        genesis: GenesisConfig,
        chain_store: Arc<ChainStore>,
        local_store: Arc<LocalStore>,
    ) -> Result<Self, AssemblyError> {
        let modules = NodeModules::with_stores(&config, genesis, chain_store, local_store)?;
        Ok(Self { config, modules })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn modules(&self) -> &NodeModules {
        &self.modules
    }

    /// Address the JSON-RPC gateway is listening on, once it is serving.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.modules.gateway.local_addr()
    }

    /// Run every module until `shutdown` fires or one of them fails.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ModuleError> {
        info!(
            chain_id = %self.config.chain_id,
            home = %self.config.home.display(),
            backend = ?self.config.storage.backend,
            "starting cadence node"
        );
        Supervisor::new(self.modules.all(), self.config.shutdown_grace())
            .run(shutdown)
            .await
    }
}
