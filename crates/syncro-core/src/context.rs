//! Process-wide engine context
//!
//! Built once at startup and shared by every engine. Holds the store and
//! coordinator handles and the session token heartbeats identify
//! themselves with.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::config::SyncroConfig;
use crate::coordinator::Coordinator;
use crate::registry::EntityRegistry;
use crate::store::RealtimeStore;

/// Shared collaborators for all engines in a process
pub struct SyncroContext {
    config: SyncroConfig,
    store: Arc<dyn RealtimeStore>,
    coordinator: Arc<dyn Coordinator>,
    registry: Option<Arc<EntityRegistry>>,
    session: OnceLock<String>,
}

impl SyncroContext {
    pub fn new(
        config: SyncroConfig,
        store: Arc<dyn RealtimeStore>,
        coordinator: Arc<dyn Coordinator>,
    ) -> Self {
        Self {
            config,
            store,
            coordinator,
            registry: None,
            session: OnceLock::new(),
        }
    }

    /// Restrict mountable entities to the registry's names
    pub fn with_registry(mut self, registry: Arc<EntityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Wrap for sharing between engines
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &SyncroConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RealtimeStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<dyn Coordinator> {
        &self.coordinator
    }

    pub fn registry(&self) -> Option<&EntityRegistry> {
        self.registry.as_deref()
    }

    /// Session token, created on first use
    pub fn session(&self) -> &str {
        self.session
            .get_or_init(|| format!("syncro-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Debug for SyncroContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncroContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("session", &self.session.get())
            .finish()
    }
}
