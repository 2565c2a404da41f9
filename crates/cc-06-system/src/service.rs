use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::debug;

use chain_store::ChainStore;
use shared_types::{Application, Lifecycle, Module, ModuleStatus, StoreError};

pub const MODULE_NAME: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHealth {
    pub name: String,
    pub status: ModuleStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// True when every tracked module is running.
    pub healthy: bool,
    pub modules: Vec<ModuleHealth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub chain_id: Option<String>,
    pub latest_height: u64,
    pub app_hash: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

/// Reports on the node itself. Other modules are tracked after assembly.
pub struct SystemModule {
    lifecycle: Lifecycle,
    store: Arc<ChainStore>,
    modules: RwLock<Vec<Weak<dyn Module>>>,
    started_at: DateTime<Utc>,
}

impl SystemModule {
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            store,
            modules: RwLock::new(Vec::new()),
            started_at: Utc::now(),
        }
    }

    /// Include `module` in health reports. Modules that have been dropped
    /// drop out of the report.
    pub fn track(&self, module: &Arc<dyn Module>) {
        debug!(module = module.name(), "tracking module health");
        self.modules.write().push(Arc::downgrade(module));
    }

    pub fn health(&self) -> HealthReport {
        let mut modules: Vec<ModuleHealth> = self
            .modules
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|m| ModuleHealth {
                name: m.name().to_string(),
                status: m.status(),
            })
            .collect();
        modules.push(ModuleHealth {
            name: MODULE_NAME.to_string(),
            status: self.lifecycle.status(),
        });
        HealthReport {
            healthy: modules.iter().all(|m| m.status.is_running()),
            modules,
        }
    }

    pub fn node_status(&self) -> Result<NodeStatus, StoreError> {
        let now = Utc::now();
        Ok(NodeStatus {
            chain_id: self.store.chain_id()?,
            latest_height: self.store.last_height()?,
            app_hash: hex::encode(self.store.app_hash()?),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds(),
        })
    }
}

#[async_trait]
impl Application for SystemModule {}

impl Module for SystemModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}
