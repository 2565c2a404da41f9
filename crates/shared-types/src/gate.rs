//! # Dependency Gate
//!
//! A one-shot broadcast signal. The owner opens it exactly once; any number of
//! dependents may wait on it concurrently, before or after it opens. An open
//! gate never closes again.
//!
//! Gates encode the lifecycle graph: a module registers the gates of the
//! modules it depends on and waits for all of them before starting (or
//! stopping). Cycles deadlock and are the assembler's responsibility.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::errors::ModuleError;

/// Single-assignment readiness or completion signal.
#[derive(Clone)]
pub struct DependencyGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    name: String,
    tx: watch::Sender<bool>,
}

impl DependencyGate {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                name: name.into(),
                tx,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Open the gate, waking every waiter.
    ///
    /// Returns `false` when the gate was already open.
    pub fn open(&self) -> bool {
        self.inner.tx.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    pub fn is_open(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Wait until the gate is open. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.inner.tx.subscribe();
        if rx.wait_for(|open| *open).await.is_err() {
            // The sender lives as long as any handle, so this is unreachable
            // while `self` is borrowed. Stay pending rather than report open.
            std::future::pending::<()>().await;
        }
    }
}

impl fmt::Debug for DependencyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGate")
            .field("name", &self.inner.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Wait on every gate concurrently.
///
/// Completes once all gates are open, so N gates cost the slowest one rather
/// than their sum. Fails with [`ModuleError::Cancelled`] if `cancel` fires
/// first.
pub async fn await_all(
    gates: &[DependencyGate],
    cancel: &CancellationToken,
) -> Result<(), ModuleError> {
    if gates.is_empty() {
        return Ok(());
    }

    let all = join_all(gates.iter().map(DependencyGate::wait));
    tokio::select! {
        biased;
        _ = all => Ok(()),
        _ = cancel.cancelled() => Err(ModuleError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{timeout, Instant};

    #[test]
    fn test_open_is_idempotent() {
        let gate = DependencyGate::new("a.ready");
        assert!(!gate.is_open());
        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_wait_after_open_returns_immediately() {
        let gate = DependencyGate::new("a.ready");
        gate.open();
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("open gate must not block");
        // Re-waiting is also immediate.
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("open gate must not block");
    }

    #[tokio::test]
    async fn test_many_waiters_wake_on_open() {
        let gate = DependencyGate::new("a.ready");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = gate.clone();
            handles.push(tokio::spawn(async move { g.wait().await }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        gate.open();
        for h in handles {
            timeout(Duration::from_secs(1), h)
                .await
                .expect("waiter should wake")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_pending_gate_never_completes() {
        let gate = DependencyGate::new("never");
        let result = timeout(Duration::from_millis(50), gate.wait()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_await_all_costs_slowest_not_sum() {
        let gates: Vec<_> = (0..4)
            .map(|i| DependencyGate::new(format!("g{i}")))
            .collect();
        for g in gates.clone() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                g.open();
            });
        }
        let started = Instant::now();
        await_all(&gates, &CancellationToken::new()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_await_all_observes_cancellation() {
        let gate = DependencyGate::new("never");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = await_all(&[gate], &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_await_all_empty_is_ready() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(await_all(&[], &cancel).await.is_ok());
    }
}
