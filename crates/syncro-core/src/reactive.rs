//! Reactive adapter
//!
//! The engine never touches the live value directly. It goes through a
//! [`ReactiveAdapter`], which exposes a live handle, whole-state reads,
//! top-level patching and a change counter to watch.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::error::{SyncroError, SyncroResult};
use crate::value::{SyncroValue, ValueMap};

/// Shared handle to the live value
///
/// Reads are plain lock reads. Every [`write`](LiveHandle::write) guard
/// ticks the change counter when it is released, so edits made through
/// the handle reach the engine the same way `set_state` edits do.
#[derive(Clone)]
pub struct LiveHandle {
    value: Arc<RwLock<SyncroValue>>,
    version: Arc<watch::Sender<u64>>,
}

impl LiveHandle {
    pub fn new(initial: SyncroValue) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            value: Arc::new(RwLock::new(initial)),
            version: Arc::new(version),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SyncroValue> {
        self.value.read()
    }

    /// Exclusive access; the change counter ticks on drop
    pub fn write(&self) -> LiveWriteGuard<'_> {
        LiveWriteGuard {
            guard: self.value.write(),
            version: &self.version,
        }
    }

    /// Receiver that ticks on every change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of changes so far
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveHandle")
            .field("value", &*self.value.read())
            .field("version", &self.version())
            .finish()
    }
}

/// Write access to the live value
pub struct LiveWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, SyncroValue>,
    version: &'a watch::Sender<u64>,
}

impl Deref for LiveWriteGuard<'_> {
    type Target = SyncroValue;

    fn deref(&self) -> &SyncroValue {
        &self.guard
    }
}

impl DerefMut for LiveWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut SyncroValue {
        &mut self.guard
    }
}

impl Drop for LiveWriteGuard<'_> {
    fn drop(&mut self) {
        self.version.send_modify(|v| *v += 1);
    }
}

/// How a patch combines with existing top-level fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Each patched top-level field is replaced wholesale
    #[default]
    Shallow,
    /// Mappings are merged recursively
    Deep,
}

/// Capability set the engine requires of a live value
pub trait ReactiveAdapter: Send + Sync {
    /// Handle to the live value
    fn live(&self) -> LiveHandle;

    /// Snapshot of the current state
    fn get_state(&self) -> SyncroValue;

    /// Apply a top-level patch
    fn set_state(&self, patch: ValueMap, mode: MergeMode);

    /// Receiver that ticks on every effective change
    fn watch(&self) -> watch::Receiver<u64>;
}

/// Builds an adapter around the seeded state at mount
pub trait AdapterFactory: Send + Sync {
    fn create(&self, initial: SyncroValue) -> Arc<dyn ReactiveAdapter>;
}

impl<F> AdapterFactory for F
where
    F: Fn(SyncroValue) -> Arc<dyn ReactiveAdapter> + Send + Sync,
{
    fn create(&self, initial: SyncroValue) -> Arc<dyn ReactiveAdapter> {
        self(initial)
    }
}

/// Verify an adapter before the engine wires it up
pub fn check_contract(adapter: &dyn ReactiveAdapter) -> SyncroResult<()> {
    let state = adapter.get_state();
    if state.as_map().is_none() {
        return Err(SyncroError::AdapterContract(
            "state root must be a mapping".to_string(),
        ));
    }

    if *adapter.live().read() != state {
        return Err(SyncroError::AdapterContract(
            "live handle does not reflect get_state".to_string(),
        ));
    }

    if adapter.watch().has_changed().is_err() {
        return Err(SyncroError::AdapterContract(
            "watch channel is closed".to_string(),
        ));
    }

    Ok(())
}

/// Default adapter: a [`LiveHandle`] with change detection on patches
pub struct LiveState {
    handle: LiveHandle,
}

impl LiveState {
    pub fn new(initial: SyncroValue) -> Self {
        let initial = match initial {
            SyncroValue::Null => SyncroValue::empty_map(),
            other => other,
        };
        Self {
            handle: LiveHandle::new(initial),
        }
    }

    /// Factory producing [`LiveState`] adapters
    pub fn factory() -> Arc<dyn AdapterFactory> {
        Arc::new(|initial: SyncroValue| -> Arc<dyn ReactiveAdapter> {
            Arc::new(LiveState::new(initial))
        })
    }

    /// Number of changes so far
    pub fn version(&self) -> u64 {
        self.handle.version()
    }
}

impl ReactiveAdapter for LiveState {
    fn live(&self) -> LiveHandle {
        self.handle.clone()
    }

    fn get_state(&self) -> SyncroValue {
        self.handle.read().clone()
    }

    fn set_state(&self, patch: ValueMap, mode: MergeMode) {
        let changed = {
            let mut value = self.handle.value.write();
            if value.as_map().is_none() {
                *value = SyncroValue::empty_map();
            }
            let before = value.clone();
            if let Some(map) = value.as_map_mut() {
                for (key, incoming) in patch {
                    if mode == MergeMode::Deep {
                        if let Some(existing) = map.get_mut(&key) {
                            existing.deep_merge(incoming);
                            continue;
                        }
                    }
                    map.insert(key, incoming);
                }
            }
            *value != before
        };

        if changed {
            self.handle.bump();
        }
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.handle.subscribe()
    }
}

impl fmt::Debug for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveState")
            .field("handle", &self.handle)
            .finish()
    }
}
