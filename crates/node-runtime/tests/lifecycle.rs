//! Dependency-gated startup under the supervisor.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use node_runtime::Supervisor;
use shared_types::{Application, DependencyGate, Lifecycle, Module, ModuleError, ModuleStatus};

/// Becomes ready `delay` after its dependencies are satisfied.
struct Delayed {
    lifecycle: Lifecycle,
    delay: Duration,
}

impl Delayed {
    fn new(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(name),
            delay,
        })
    }
}

#[async_trait]
impl Application for Delayed {}

#[async_trait]
impl Module for Delayed {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), ModuleError> {
        self.lifecycle.begin_start(&cancel).await?;
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => return Err(ModuleError::Cancelled),
        }
        self.lifecycle.mark_ready();
        Ok(())
    }
}

#[tokio::test]
async fn test_module_behind_closed_gate_never_becomes_ready() {
    let module = Delayed::new("gated", Duration::ZERO);
    module
        .lifecycle()
        .register_startup_deps([DependencyGate::new("never.ready")]);

    let cancel = CancellationToken::new();
    let task = {
        let module = module.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { module.start(cancel).await })
    };

    assert!(timeout(Duration::from_millis(100), module.ready().wait())
        .await
        .is_err());
    assert_eq!(module.status(), ModuleStatus::Starting);

    cancel.cancel();
    let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(result, Err(ModuleError::Cancelled));
    assert_eq!(module.status(), ModuleStatus::Failed);
}

#[tokio::test]
async fn test_dependent_starts_shortly_after_dependency() {
    let a = Delayed::new("a", Duration::from_millis(200));
    let b = Delayed::new("b", Duration::ZERO);
    b.lifecycle().register_startup_deps([a.ready()]);

    // B is launched first; the gate, not launch order, decides.
    let modules: Vec<Arc<dyn Module>> = vec![b.clone(), a.clone()];
    let supervisor = Supervisor::new(modules, Duration::from_secs(2));
    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    let started = Instant::now();
    timeout(Duration::from_secs(5), a.ready().wait()).await.unwrap();
    let a_ready = started.elapsed();
    timeout(Duration::from_secs(5), b.ready().wait()).await.unwrap();
    let b_ready = started.elapsed();

    assert!(a_ready >= Duration::from_millis(150), "a ready after {a_ready:?}");
    assert!(b_ready >= a_ready);
    assert!(
        b_ready - a_ready < Duration::from_millis(100),
        "b lagged a by {:?}",
        b_ready - a_ready
    );

    shutdown.cancel();
    let result = timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(a.stopped().is_open());
    assert!(b.stopped().is_open());
}

#[tokio::test]
async fn test_many_dependencies_cost_the_slowest() {
    let deps: Vec<Arc<Delayed>> = (0..5)
        .map(|i| Delayed::new(&format!("dep{i}"), Duration::from_millis(100)))
        .collect();
    let sink = Delayed::new("sink", Duration::ZERO);
    sink.lifecycle()
        .register_startup_deps(deps.iter().map(|d| d.ready()));

    let mut modules: Vec<Arc<dyn Module>> = deps
        .iter()
        .map(|d| {
            let m: Arc<dyn Module> = d.clone();
            m
        })
        .collect();
    modules.push(sink.clone());
    let supervisor = Supervisor::new(modules, Duration::from_secs(2));
    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    let started = Instant::now();
    timeout(Duration::from_secs(5), sink.ready().wait())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));

    shutdown.cancel();
    assert!(timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .is_ok());
}
