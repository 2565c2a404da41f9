//! Structured task group: spawn N tasks, cancel all on the first failure,
//! block until every task has exited.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use shared_types::ModuleError;

type TaskOutput = (String, Result<(), ModuleError>);

pub struct TaskGroup {
    tasks: JoinSet<TaskOutput>,
    cancel: CancellationToken,
    grace: Duration,
}

impl TaskGroup {
    /// `grace` bounds how long `wait` keeps draining once the group has
    /// been cancelled.
    pub fn new(cancel: CancellationToken, grace: Duration) -> Self {
        Self {
            tasks: JoinSet::new(),
            cancel,
            grace,
        }
    }

    /// Token cancelled on the first task error.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn a named task. A panic inside `fut` is reported as a handler
    /// error for `name`.
    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        let name = name.into();
        self.tasks.spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(ModuleError::handler(name.clone(), "task panicked")),
            };
            (name, result)
        });
    }

    /// Join every task and return the first error.
    ///
    /// The first error cancels the group token. From then on the remaining
    /// tasks get `grace` to exit before they are aborted.
    pub async fn wait(self) -> Result<(), ModuleError> {
        let TaskGroup {
            mut tasks,
            cancel,
            grace,
        } = self;
        let mut first_error: Option<ModuleError> = None;

        while !cancel.is_cancelled() {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => Self::record(joined, &mut first_error, &cancel),
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                Self::record(joined, &mut first_error, &cancel);
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                pending = tasks.len(),
                grace_secs = grace.as_secs(),
                "tasks did not exit within the grace period, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn record(
        joined: Result<TaskOutput, tokio::task::JoinError>,
        first_error: &mut Option<ModuleError>,
        cancel: &CancellationToken,
    ) {
        let (name, result) = match joined {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "task join failed");
                (
                    "unknown".to_string(),
                    Err(ModuleError::handler("supervisor", e.to_string())),
                )
            }
        };
        match result {
            Ok(()) => debug!(task = %name, "task finished"),
            Err(e) => {
                if e.is_cancelled() {
                    debug!(task = %name, "task cancelled");
                } else {
                    error!(task = %name, error = %e, "task failed");
                }
                if first_error.is_none() {
                    *first_error = Some(e);
                }
                cancel.cancel();
            }
        }
    }
}
