//! In-process coordinator
//!
//! Performs the coordination service's job locally: seeds documents with
//! the registry's `init_state` hooks, records presence heartbeats, and
//! flushes through `flush_state`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::codec::{decode_document, encode_document};
use crate::coordinator::{Coordinator, HeartbeatSignal};
use crate::error::{SyncroError, SyncroResult};
use crate::path::SyncroPath;
use crate::registry::{EntityContext, EntityHooks, EntityRegistry};
use crate::store::RealtimeStore;

/// Last heartbeat seen from one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub last_seen: DateTime<Utc>,
    /// Unflushed changes reported since the last flush
    pub dirty: bool,
}

/// [`Coordinator`] backed by an [`EntityRegistry`] and a realtime store
pub struct LocalCoordinator {
    registry: Arc<EntityRegistry>,
    store: Arc<dyn RealtimeStore>,
    presence: Mutex<HashMap<String, HashMap<String, PresenceEntry>>>,
}

impl LocalCoordinator {
    pub fn new(registry: Arc<EntityRegistry>, store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            registry,
            store,
            presence: Mutex::new(HashMap::new()),
        }
    }

    /// Sessions that have sent heartbeats for a path
    pub fn presence(&self, path: &SyncroPath) -> HashMap<String, PresenceEntry> {
        self.presence
            .lock()
            .get(&path.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any session reported unflushed changes for a path
    pub fn is_dirty(&self, path: &SyncroPath) -> bool {
        self.presence(path).values().any(|entry| entry.dirty)
    }

    fn hooks(&self, path: &SyncroPath) -> SyncroResult<Arc<dyn EntityHooks>> {
        let descriptor =
            self.registry
                .get(&path.entity)
                .ok_or_else(|| SyncroError::UnsupportedEntity {
                    entity: path.entity.clone(),
                })?;

        descriptor.hooks.clone().ok_or_else(|| SyncroError::Entity {
            entity: path.entity.clone(),
            source: anyhow!("no durable-store hooks registered"),
        })
    }

    fn entity_error(path: &SyncroPath, source: anyhow::Error) -> SyncroError {
        SyncroError::Entity {
            entity: path.entity.clone(),
            source,
        }
    }
}

#[async_trait]
impl Coordinator for LocalCoordinator {
    async fn ensure_populated(&self, path: &SyncroPath, force: bool) -> SyncroResult<()> {
        let collection = path.collection();
        let doc_id = path.doc_id();

        if !force && self.store.get(collection, &doc_id).await?.is_some() {
            return Ok(());
        }

        let hooks = self.hooks(path)?;
        let ctx = EntityContext { path: path.clone() };
        let state = hooks
            .init_state(&ctx)
            .await
            .map_err(|e| Self::entity_error(path, e))?;

        let doc = encode_document(&state)?;
        self.store.set(collection, &doc_id, doc).await?;
        info!("Populated {} from durable state", path);
        Ok(())
    }

    async fn heartbeat(&self, path: &SyncroPath, signal: &HeartbeatSignal) -> SyncroResult<()> {
        let mut presence = self.presence.lock();
        let sessions = presence.entry(path.to_string()).or_default();
        let entry = sessions
            .entry(signal.session.clone())
            .or_insert_with(|| PresenceEntry {
                last_seen: Utc::now(),
                dirty: false,
            });
        entry.last_seen = Utc::now();
        entry.dirty |= signal.is_dirty();
        debug!("Heartbeat from {} on {} (dirty={})", signal.session, path, entry.dirty);
        Ok(())
    }

    async fn flush(&self, path: &SyncroPath, destroy: bool) -> SyncroResult<()> {
        let collection = path.collection();
        let doc_id = path.doc_id();

        let doc = self
            .store
            .get(collection, &doc_id)
            .await?
            .ok_or_else(|| SyncroError::NotFound {
                collection: collection.to_string(),
                id: doc_id.clone(),
            })?;

        let hooks = self.hooks(path)?;
        let ctx = EntityContext { path: path.clone() };
        hooks
            .flush_state(&ctx, &decode_document(&doc))
            .await
            .map_err(|e| Self::entity_error(path, e))?;

        let key = path.to_string();
        if destroy {
            self.store.delete(collection, &doc_id).await?;
            self.presence.lock().remove(&key);
            info!("Flushed and removed {}", path);
        } else {
            if let Some(sessions) = self.presence.lock().get_mut(&key) {
                sessions.values_mut().for_each(|entry| entry.dirty = false);
            }
            info!("Flushed {}", path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::registry::EntityDescriptor;
    use crate::value::SyncroValue;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Durable store stand-in holding one value per path
    #[derive(Default)]
    struct TableHooks {
        rows: Mutex<HashMap<String, SyncroValue>>,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl EntityHooks for TableHooks {
        async fn init_state(&self, ctx: &EntityContext) -> anyhow::Result<SyncroValue> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .lock()
                .get(&ctx.path.id)
                .cloned()
                .unwrap_or_else(SyncroValue::empty_map))
        }

        async fn flush_state(&self, ctx: &EntityContext, state: &SyncroValue) -> anyhow::Result<()> {
            self.rows.lock().insert(ctx.path.id.clone(), state.clone());
            Ok(())
        }
    }

    const PATH: &str = "projects::11111111-1111-1111-1111-111111111111";

    fn setup() -> (Arc<TableHooks>, MemoryStore, LocalCoordinator, SyncroPath) {
        let hooks = Arc::new(TableHooks::default());
        hooks.rows.lock().insert(
            "11111111-1111-1111-1111-111111111111".to_string(),
            SyncroValue::from(json!({"title": "Roadmap", "items": [1, 2]})),
        );

        let mut registry = EntityRegistry::new();
        registry.register("projects", EntityDescriptor::new("project", hooks.clone()));
        registry.register_name("widgets", "widget");

        let store = MemoryStore::new();
        let coordinator = LocalCoordinator::new(Arc::new(registry), Arc::new(store.clone()));
        (hooks, store, coordinator, PATH.parse().unwrap())
    }

    #[tokio::test]
    async fn test_populate_is_idempotent() {
        let (hooks, store, coordinator, path) = setup();

        coordinator.ensure_populated(&path, false).await.unwrap();
        coordinator.ensure_populated(&path, false).await.unwrap();
        assert_eq!(hooks.loads.load(Ordering::SeqCst), 1);

        let doc = store.get("projects", &path.doc_id()).await.unwrap().unwrap();
        assert_eq!(
            decode_document(&doc),
            SyncroValue::from(json!({"title": "Roadmap", "items": [1, 2]}))
        );

        coordinator.ensure_populated(&path, true).await.unwrap();
        assert_eq!(hooks.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flush_writes_back_and_destroys() {
        let (hooks, store, coordinator, path) = setup();
        coordinator.ensure_populated(&path, false).await.unwrap();

        let patch = encode_document(&SyncroValue::from(json!({"title": "Renamed"}))).unwrap();
        store.merge("projects", &path.doc_id(), patch).await.unwrap();

        coordinator.flush(&path, false).await.unwrap();
        assert_eq!(
            hooks.rows.lock().get(&path.id).unwrap().get("title"),
            Some(&SyncroValue::from("Renamed"))
        );
        assert_eq!(store.len(), 1);

        coordinator.flush(&path, true).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_flush_missing_document() {
        let (_hooks, _store, coordinator, path) = setup();
        let err = coordinator.flush(&path, false).await.unwrap_err();
        assert!(matches!(err, SyncroError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_heartbeat_tracks_sessions_and_dirty() {
        let (_hooks, _store, coordinator, path) = setup();
        coordinator.ensure_populated(&path, false).await.unwrap();

        coordinator
            .heartbeat(&path, &HeartbeatSignal::new("a", true))
            .await
            .unwrap();
        coordinator
            .heartbeat(&path, &HeartbeatSignal::new("b", false))
            .await
            .unwrap();

        // A later clean beat does not erase the unflushed report
        coordinator
            .heartbeat(&path, &HeartbeatSignal::new("a", false))
            .await
            .unwrap();

        let presence = coordinator.presence(&path);
        assert_eq!(presence.len(), 2);
        assert!(coordinator.is_dirty(&path));

        coordinator.flush(&path, false).await.unwrap();
        assert!(!coordinator.is_dirty(&path));

        coordinator.flush(&path, true).await.unwrap();
        assert!(coordinator.presence(&path).is_empty());
    }

    #[tokio::test]
    async fn test_entity_without_hooks() {
        let (_hooks, _store, coordinator, _path) = setup();
        let widget: SyncroPath = "widgets::11111111-1111-1111-1111-111111111111"
            .parse()
            .unwrap();

        let err = coordinator.ensure_populated(&widget, false).await.unwrap_err();
        assert!(matches!(err, SyncroError::Entity { .. }));

        let gadget: SyncroPath = "gadgets::11111111-1111-1111-1111-111111111111"
            .parse()
            .unwrap();
        let err = coordinator.ensure_populated(&gadget, false).await.unwrap_err();
        assert!(matches!(err, SyncroError::UnsupportedEntity { .. }));
    }
}
