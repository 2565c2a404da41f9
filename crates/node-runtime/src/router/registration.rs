//! Which modules answer which callback, in what order.

use std::collections::HashMap;
use std::sync::Arc;

use chain_store::BlockCommitter;
use shared_types::{CallbackKind, Module};

use super::Router;

/// Per-kind ordered module lists, built once at assembly time.
///
/// Registering a kind again replaces its list. Once [`build`](Self::build)
/// turns it into a [`Router`] the lists can no longer change.
#[derive(Default)]
pub struct Registration {
    handlers: HashMap<CallbackKind, Vec<Arc<dyn Module>>>,
    committer: Option<Arc<dyn BlockCommitter>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ordered module list for `kind`.
    pub fn register(mut self, kind: CallbackKind, modules: Vec<Arc<dyn Module>>) -> Self {
        self.handlers.insert(kind, modules);
        self
    }

    /// Store whose block batch the router opens on FinalizeBlock and
    /// commits on Commit.
    pub fn with_committer(mut self, committer: Arc<dyn BlockCommitter>) -> Self {
        self.committer = Some(committer);
        self
    }

    /// Module names registered for `kind`, in dispatch order.
    pub fn names(&self, kind: CallbackKind) -> Vec<String> {
        self.handlers
            .get(&kind)
            .map(|ms| ms.iter().map(|m| m.name().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn build(self) -> Router {
        Router::new(self.handlers, self.committer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared_types::{Application, Lifecycle};

    struct Named(Lifecycle);

    #[async_trait]
    impl Application for Named {}

    impl Module for Named {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn lifecycle(&self) -> &Lifecycle {
            &self.0
        }
    }

    fn named(name: &str) -> Arc<dyn Module> {
        Arc::new(Named(Lifecycle::new(name)))
    }

    #[test]
    fn test_register_replaces_list() {
        let reg = Registration::new()
            .register(CallbackKind::Query, vec![named("a"), named("b")])
            .register(CallbackKind::Query, vec![named("c")]);
        assert_eq!(reg.names(CallbackKind::Query), vec!["c".to_string()]);
        assert!(reg.names(CallbackKind::Info).is_empty());
    }
}
