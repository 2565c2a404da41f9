//! # Supervisor
//!
//! Runs every module as its own task and owns shutdown:
//!
//! 1. Spawn `start` for each module plus a watcher on the external
//!    shutdown token.
//! 2. The first task error (the watcher reports an external shutdown as
//!    [`ModuleError::Cancelled`]) cancels the group token.
//! 3. Cancellation triggers `stop` on every module concurrently. The
//!    shutdown gates order the actual teardown.
//! 4. Wait for every start and stop to finish, bounded by the grace period.

mod task_group;

pub use task_group::TaskGroup;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use shared_types::{Module, ModuleError};

pub struct Supervisor {
    modules: Vec<Arc<dyn Module>>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(modules: Vec<Arc<dyn Module>>, grace: Duration) -> Self {
        Self { modules, grace }
    }

    /// Run until `shutdown` fires or a module fails.
    ///
    /// Returns `Ok` for a requested shutdown, the failing module's error
    /// otherwise.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ModuleError> {
        let cancel = CancellationToken::new();
        let mut group = TaskGroup::new(cancel.clone(), self.grace);

        for module in &self.modules {
            let module = module.clone();
            let token = cancel.clone();
            group.spawn(module.name().to_string(), async move { module.start(token).await });
        }

        let watched = shutdown.clone();
        let token = cancel.clone();
        group.spawn("shutdown-watcher", async move {
            tokio::select! {
                _ = watched.cancelled() => {
                    info!("shutdown requested");
                    Err(ModuleError::Cancelled)
                }
                _ = token.cancelled() => Ok(()),
            }
        });
        info!(modules = self.modules.len(), "supervisor started");

        let tasks = async {
            let result = group.wait().await;
            cancel.cancel();
            result
        };
        let stops = async {
            cancel.cancelled().await;
            self.stop_all().await;
        };
        let (result, ()) = tokio::join!(tasks, stops);

        match result {
            Err(e) if e.is_cancelled() && shutdown.is_cancelled() => {
                info!("all modules stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "node stopped on module failure");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Call `stop` on every module concurrently, bounded by the grace
    /// period.
    async fn stop_all(&self) {
        info!(grace_secs = self.grace.as_secs(), "stopping modules");
        let stops = join_all(self.modules.iter().map(|m| async move {
            if let Err(e) = m.stop().await {
                warn!(module = m.name(), error = %e, "module stop failed");
            }
        }));
        if tokio::time::timeout(self.grace, stops).await.is_err() {
            let pending: Vec<&str> = self
                .modules
                .iter()
                .filter(|m| !m.stopped().is_open())
                .map(|m| m.name())
                .collect();
            warn!(?pending, "shutdown grace period elapsed");
        }
    }
}
