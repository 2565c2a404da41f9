//! # Consensus Adapter
//!
//! Bridges the callback router to a consensus engine. The adapter is itself
//! a module: it starts the engine only once every consensus-relevant module
//! is ready, so the engine's first callback never reaches a module that is
//! still initializing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shared_types::{Application, Lifecycle, Module, ModuleError, ModuleStatus};

use crate::router::Router;

pub const MODULE_NAME: &str = "consensus";

/// Engine port. The engine drives the application through its callbacks.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Connect to `app` and begin accepting work. Returns once the engine
    /// is running.
    async fn start(&self, app: Arc<dyn Application>) -> Result<(), ModuleError>;

    /// Resolve when the engine exits, with the error that stopped it.
    async fn wait(&self) -> Result<(), ModuleError>;

    /// Ask the engine to exit. `wait` resolves afterwards.
    async fn stop(&self) -> Result<(), ModuleError>;
}

/// Module owning the router and the engine connected to it.
pub struct ConsensusAdapter {
    lifecycle: Lifecycle,
    router: Arc<Router>,
    engine: Arc<dyn ConsensusEngine>,
}

impl ConsensusAdapter {
    pub fn new(router: Arc<Router>, engine: Arc<dyn ConsensusEngine>) -> Self {
        Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            router,
            engine,
        }
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }
}

#[async_trait]
impl Application for ConsensusAdapter {}

#[async_trait]
impl Module for ConsensusAdapter {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Waits for the consensus modules, starts the engine, then runs until
    /// the engine exits. After cancellation the engine keeps finishing its
    /// current work until [`stop`](Module::stop) stops it.
    async fn start(&self, cancel: CancellationToken) -> Result<(), ModuleError> {
        self.lifecycle.begin_start(&cancel).await?;

        let app: Arc<dyn Application> = self.router.clone();
        if let Err(e) = self.engine.start(app).await {
            self.lifecycle.set_status(ModuleStatus::Failed);
            error!(engine = self.engine.name(), error = %e, "engine failed to start");
            return Err(ModuleError::startup(MODULE_NAME, e.to_string()));
        }
        self.lifecycle.mark_ready();
        info!(engine = self.engine.name(), "consensus engine running");

        let result = self.engine.wait().await;
        if let Err(e) = &result {
            error!(engine = self.engine.name(), error = %e, "consensus engine stopped");
        }
        result
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.lifecycle.begin_stop().await;
        let result = self.engine.stop().await;
        self.lifecycle.mark_stopped();
        result
    }
}
