//! Entity registry
//!
//! Maps entity names to the hooks that seed a floating document from the
//! durable store and write it back. Most deployments let the coordination
//! service own these hooks; the registry is then only consulted for its
//! key set when validating paths.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::path::SyncroPath;
use crate::value::SyncroValue;

/// Context handed to entity hooks
#[derive(Debug, Clone)]
pub struct EntityContext {
    pub path: SyncroPath,
}

/// Durable-store callbacks for one entity
#[async_trait]
pub trait EntityHooks: Send + Sync {
    /// Load the initial state from durable storage
    async fn init_state(&self, ctx: &EntityContext) -> anyhow::Result<SyncroValue>;

    /// Persist state back to durable storage
    async fn flush_state(&self, ctx: &EntityContext, state: &SyncroValue) -> anyhow::Result<()>;
}

/// Registry entry for an entity
#[derive(Clone)]
pub struct EntityDescriptor {
    /// Singular display name ("project" for "projects")
    pub singular: String,
    /// Durable-store hooks, absent when only used for validation
    pub hooks: Option<Arc<dyn EntityHooks>>,
}

impl EntityDescriptor {
    pub fn new(singular: impl Into<String>, hooks: Arc<dyn EntityHooks>) -> Self {
        Self {
            singular: singular.into(),
            hooks: Some(hooks),
        }
    }

    /// Descriptor without hooks
    pub fn named(singular: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            hooks: None,
        }
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("singular", &self.singular)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

/// Lookup table from entity name to descriptor
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDescriptor>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity
    pub fn register(&mut self, name: impl Into<String>, descriptor: EntityDescriptor) {
        self.entities.insert(name.into(), descriptor);
    }

    /// Add an entity known only by name
    pub fn register_name(&mut self, name: impl Into<String>, singular: impl Into<String>) {
        self.register(name, EntityDescriptor::named(singular));
    }

    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Registered entity names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
