//! Process-wide adapter registry.
//!
//! One adapter per kind, constructed on first use and shared for the life of
//! the process. The registry is passed explicitly to the gateway; tests swap
//! in a factory that produces stubs.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::adapter::{Agent, AgentKind, CliAdapter};

/// Builds the adapter for a kind. Called at most once per kind.
pub type AgentFactory = dyn Fn(AgentKind) -> Arc<dyn Agent> + Send + Sync;

pub struct AdapterRegistry {
    factory: Box<AgentFactory>,
    slots: [OnceLock<Arc<dyn Agent>>; AgentKind::COUNT],
}

impl AdapterRegistry {
    /// Registry backed by the built-in command-line adapters.
    pub fn new() -> Self {
        Self::with_factory(|kind| Arc::new(CliAdapter::for_kind(kind)) as Arc<dyn Agent>)
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(AgentKind) -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    /// The adapter for `kind`, constructing it on first access.
    pub fn get(&self, kind: AgentKind) -> Arc<dyn Agent> {
        Arc::clone(self.slots[kind.index()].get_or_init(|| {
            debug!(agent = %kind, "constructing adapter");
            (self.factory)(kind)
        }))
    }

    /// Whether `kind` has been constructed yet.
    pub fn is_constructed(&self, kind: AgentKind) -> bool {
        self.slots[kind.index()].get().is_some()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let constructed: Vec<AgentKind> = AgentKind::ALL
            .into_iter()
            .filter(|k| self.is_constructed(*k))
            .collect();
        f.debug_struct("AdapterRegistry")
            .field("constructed", &constructed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_one_instance_per_kind() {
        let registry = AdapterRegistry::new();
        assert!(!registry.is_constructed(AgentKind::Codex));

        let a = registry.get(AgentKind::Codex);
        let b = registry.get(AgentKind::Codex);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind(), AgentKind::Codex);
        assert!(registry.is_constructed(AgentKind::Codex));
        assert!(!registry.is_constructed(AgentKind::Gemini));
    }

    #[test]
    fn test_factory_called_once_per_kind() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = AdapterRegistry::with_factory(move |kind| {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(CliAdapter::for_kind(kind)) as Arc<dyn Agent>
        });

        for _ in 0..3 {
            registry.get(AgentKind::Qwen);
        }
        registry.get(AgentKind::Rovo);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
