//! Floating entity engine
//!
//! A [`SyncroEngine`] binds one path to a live value and keeps it in step
//! with the realtime store:
//!
//! ```text
//! local write  -> reactive adapter -> debounce -> encode -> store.merge -> dirty
//! store update -> decode -> reactive adapter
//! ```
//!
//! ## Lifecycle
//!
//! `Unmounted -> Mounting -> Live -> Destroyed`. A failed mount attempt is
//! torn down and retried with backoff; exhausting the budget (or hitting a
//! configuration error) ends in `Destroyed`.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncroEngine::new(ctx, "projects::11111111-1111-1111-1111-111111111111");
//! engine.mount(engine.default_mount_options()).await?;
//! engine.set(("title", "Roadmap"), SetOptions::default()).await?;
//! engine.destroy().await;
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{decode_document, encode_document, WireDocument};
use crate::config::SyncroConfig;
use crate::context::SyncroContext;
use crate::error::{SyncroError, SyncroResult};
use crate::heartbeat::PresenceHeartbeat;
use crate::path::{parse as parse_path, ParseOptions, SyncroPath};
use crate::reactive::{check_contract, AdapterFactory, LiveState, MergeMode, ReactiveAdapter};
use crate::retry::{self, RetryError, RetryPolicy};
use crate::store::{Subscription, SubscriptionHandle};
use crate::synthetic;
use crate::value::{SyncroValue, ValueMap};

/// Re-seed attempts when a merge hits a vanished document
pub const MAX_RESEEDS: u32 = 3;

/// Mount backoff growth factor
const BACKOFF_FACTOR: f64 = 3.0;

/// Engine lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Constructed, never mounted
    Unmounted,
    /// Mount in progress (including retries)
    Mounting,
    /// Subscribed and heartbeating
    Live,
    /// Torn down
    Destroyed,
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncroEvent {
    /// Lifecycle status changed
    StatusChanged(EngineStatus),
    /// A remote snapshot was merged into the live value
    RemoteApplied,
    /// Local state was written to the realtime store
    LocalPushed,
    /// Durable flush completed
    Flushed { destroy: bool },
    /// Background error (local push failed)
    Error(String),
}

/// How a realtime write treats fields it does not mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Update only the given top-level fields
    Merge,
    /// Replace the whole document
    Set,
}

/// Options for [`SyncroEngine::mount`]
#[derive(Clone)]
pub struct MountOptions {
    /// State to seed an empty document with instead of asking the coordinator
    pub initial_state: Option<SyncroValue>,
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Base delay for the backoff
    pub retry_min_time: Duration,
    /// Debounce for local changes
    pub throttle: Duration,
    /// How remote snapshots are applied
    pub remote_merge: MergeMode,
    /// Builds the reactive adapter
    pub adapter: Arc<dyn AdapterFactory>,
}

impl MountOptions {
    pub fn from_config(config: &SyncroConfig) -> Self {
        Self {
            initial_state: None,
            retries: config.retries,
            retry_min_time: config.retry_min_time(),
            throttle: config.throttle(),
            remote_merge: MergeMode::Shallow,
            adapter: LiveState::factory(),
        }
    }

    pub fn with_initial_state(mut self, state: SyncroValue) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn AdapterFactory>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Opt into recursive merging of remote snapshots
    pub fn with_deep_merge(mut self) -> Self {
        self.remote_merge = MergeMode::Deep;
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            factor: BACKOFF_FACTOR,
            ..RetryPolicy::new(self.retries, self.retry_min_time)
        }
    }
}

impl Default for MountOptions {
    fn default() -> Self {
        Self::from_config(&SyncroConfig::default())
    }
}

/// Options for [`SyncroEngine::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Apply only fields that differ from the live value
    pub delta: bool,
    /// Flush to durable storage after a change
    pub flush: bool,
    /// Flush even if nothing changed
    pub force_flush: bool,
    /// Ask the coordinator to tear the document down after flushing
    pub flush_destroy: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            delta: true,
            flush: true,
            force_flush: false,
            flush_destroy: false,
        }
    }
}

impl SetOptions {
    /// Apply without flushing
    pub fn no_flush() -> Self {
        Self {
            flush: false,
            ..Self::default()
        }
    }
}

/// What a [`SyncroEngine::set`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOutcome {
    pub changed: bool,
    pub flushed: bool,
}

/// Top-level fields to apply to the live value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch(ValueMap);

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh one-field patch
    pub fn single(key: impl Into<String>, value: impl Into<SyncroValue>) -> Self {
        let mut map = ValueMap::new();
        map.insert(key.into(), value.into());
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<SyncroValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> ValueMap {
        self.0
    }
}

impl From<ValueMap> for StatePatch {
    fn from(map: ValueMap) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<SyncroValue>> From<(K, V)> for StatePatch {
    fn from((key, value): (K, V)) -> Self {
        Self::single(key, value)
    }
}

type TeardownAction = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct EngineInner {
    ctx: Arc<SyncroContext>,
    raw_path: String,
    path: OnceLock<SyncroPath>,
    heartbeat: OnceLock<Arc<PresenceHeartbeat>>,
    adapter: RwLock<Option<Arc<dyn ReactiveAdapter>>>,
    /// Last state known to match the realtime document
    last_synced: Mutex<Option<SyncroValue>>,
    teardown: Mutex<Vec<TeardownAction>>,
    status: watch::Sender<EngineStatus>,
    event_tx: mpsc::UnboundedSender<SyncroEvent>,
}

/// Sync engine for one floating entity
pub struct SyncroEngine {
    inner: Arc<EngineInner>,
    event_rx: Option<mpsc::UnboundedReceiver<SyncroEvent>>,
}

impl SyncroEngine {
    /// Create an unmounted engine for `path`
    ///
    /// The path is validated on [`mount`](Self::mount).
    pub fn new(ctx: Arc<SyncroContext>, path: impl Into<String>) -> Self {
        let (status, _) = watch::channel(EngineStatus::Unmounted);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(EngineInner {
                ctx,
                raw_path: path.into(),
                path: OnceLock::new(),
                heartbeat: OnceLock::new(),
                adapter: RwLock::new(None),
                last_synced: Mutex::new(None),
                teardown: Mutex::new(Vec::new()),
                status,
                event_tx,
            }),
            event_rx: Some(event_rx),
        }
    }

    /// Mount options derived from the context's configuration
    pub fn default_mount_options(&self) -> MountOptions {
        MountOptions::from_config(self.inner.ctx.config())
    }

    /// Path string the engine was created with
    pub fn path(&self) -> &str {
        &self.inner.raw_path
    }

    /// Parsed path, once mounted
    pub fn resolved_path(&self) -> Option<&SyncroPath> {
        self.inner.path.get()
    }

    pub fn status(&self) -> EngineStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.inner.status.subscribe()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncroEvent>> {
        self.event_rx.take()
    }

    /// The presence heartbeat, once mounted
    pub fn heartbeat(&self) -> Option<&Arc<PresenceHeartbeat>> {
        self.inner.heartbeat.get()
    }

    /// Whether unflushed changes await the next heartbeat
    pub fn is_dirty(&self) -> bool {
        self.heartbeat().is_some_and(|hb| hb.is_dirty())
    }

    /// The reactive adapter, once mounted
    pub fn adapter(&self) -> Option<Arc<dyn ReactiveAdapter>> {
        self.inner.adapter.read().clone()
    }

    /// Current live value
    pub fn get(&self) -> SyncroResult<SyncroValue> {
        Ok(self.inner.live_adapter()?.get_state())
    }

    /// Fixture helper: a random nested state tree
    pub fn build_synthetic_tree(depth: u32) -> SyncroValue {
        synthetic::build_synthetic_tree(depth)
    }

    /// Register extra cleanup to run on [`destroy`](Self::destroy)
    pub fn on_teardown<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .add_teardown(Box::new(move || -> BoxFuture<'static, ()> { Box::pin(action()) }));
    }

    /// Resolve the path, subscribe, seed if empty, and go live
    pub async fn mount(&self, options: MountOptions) -> SyncroResult<()> {
        let inner = &self.inner;

        if let Some(heartbeat) = inner.heartbeat.get() {
            heartbeat.disable();
        }

        match self.status() {
            EngineStatus::Destroyed => return Err(SyncroError::Destroyed),
            EngineStatus::Live => inner.run_teardown().await,
            _ => {}
        }

        let path = match inner.resolve_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot mount '{}': {}", inner.raw_path, e);
                inner.set_status(EngineStatus::Destroyed);
                return Err(e);
            }
        };
        inner.set_status(EngineStatus::Mounting);
        info!("Mounting {}", path);

        let policy = options.retry_policy();
        let result = retry::with_backoff(
            &policy,
            |e: &SyncroError| e.is_retryable(),
            |attempt| {
                let path = &path;
                let options = &options;
                async move {
                    if attempt > 1 {
                        info!("Mount attempt {} for {}", attempt, path);
                    }
                    match inner.try_mount(path, options).await {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            warn!("Mount of {} failed: {}", path, e);
                            inner.run_teardown().await;
                            Err(e)
                        }
                    }
                }
            },
        )
        .await;

        match result {
            Ok(()) => {
                inner.set_status(EngineStatus::Live);
                info!("Mounted {}", path);
                Ok(())
            }
            Err(err) => {
                inner.set_status(EngineStatus::Destroyed);
                if let Some(heartbeat) = inner.heartbeat.get() {
                    heartbeat.disable();
                }
                Err(match err {
                    RetryError::Fatal(e) => e,
                    RetryError::Exhausted { attempts, last } => SyncroError::MountRetryExhausted {
                        attempts,
                        source: Box::new(last),
                    },
                })
            }
        }
    }

    /// Apply a patch to the live value, optionally flushing
    pub async fn set(
        &self,
        patch: impl Into<StatePatch>,
        options: SetOptions,
    ) -> SyncroResult<SetOutcome> {
        let adapter = self.inner.live_adapter()?;
        let patch = patch.into().into_inner();

        let changes: ValueMap = if options.delta {
            let current = adapter.get_state();
            patch
                .into_iter()
                .filter(|(key, value)| current.get(key) != Some(value))
                .collect()
        } else {
            patch
        };

        let changed = !changes.is_empty();
        if changed {
            adapter.set_state(changes, MergeMode::Shallow);
        }

        let flushed = options.force_flush || (options.flush && changed);
        if flushed {
            self.flush(options.flush_destroy).await?;
        } else if !changed {
            debug!("No changes for {}, skipping flush", self.inner.raw_path);
        }

        Ok(SetOutcome { changed, flushed })
    }

    /// Push the live value and have the coordinator persist it
    pub async fn flush(&self, destroy: bool) -> SyncroResult<()> {
        let inner = &self.inner;
        let path = inner.resolve_path()?;

        inner.push_local(true).await?;
        inner.ctx.coordinator().flush(&path, destroy).await?;

        debug!("Flushed {} (destroy={})", path, destroy);
        inner.emit(SyncroEvent::Flushed { destroy });
        Ok(())
    }

    /// Write a value to the realtime document
    pub async fn set_remote_state(&self, value: &SyncroValue, mode: WriteMode) -> SyncroResult<()> {
        self.inner.write_remote(value, mode).await
    }

    /// Read the realtime document, bypassing the live value
    pub async fn get_remote_state(&self) -> SyncroResult<Option<SyncroValue>> {
        let path = self.inner.resolve_path()?;
        let doc = self
            .inner
            .ctx
            .store()
            .get(path.collection(), &path.doc_id())
            .await?;
        Ok(doc.as_ref().map(decode_document))
    }

    /// Unsubscribe, stop the heartbeat and run all teardown actions
    ///
    /// Dropping a mounted engine runs the same teardown on the current
    /// runtime, but without awaiting it.
    pub async fn destroy(&self) {
        let inner = &self.inner;
        if self.status() == EngineStatus::Destroyed && inner.teardown.lock().is_empty() {
            return;
        }

        inner.set_status(EngineStatus::Destroyed);
        if let Some(heartbeat) = inner.heartbeat.get() {
            heartbeat.disable();
        }
        inner.run_teardown().await;
        info!("Destroyed engine for {}", inner.raw_path);
    }
}

impl Drop for SyncroEngine {
    fn drop(&mut self) {
        let inner = &self.inner;
        if let Some(heartbeat) = inner.heartbeat.get() {
            heartbeat.disable();
        }

        let actions: Vec<TeardownAction> = std::mem::take(&mut *inner.teardown.lock());
        if actions.is_empty() {
            return;
        }
        debug!(
            "Engine for {} dropped while mounted, running {} teardown actions",
            inner.raw_path,
            actions.len()
        );
        let cleanup = join_all(actions.into_iter().map(|action| action()));
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    cleanup.await;
                });
            }
            // Outside a runtime only the actions that finish immediately run
            Err(_) => {
                let _ = cleanup.now_or_never();
            }
        }
    }
}

impl EngineInner {
    fn resolve_path(&self) -> SyncroResult<SyncroPath> {
        if let Some(path) = self.path.get() {
            return Ok(path.clone());
        }
        let options = ParseOptions {
            allow_wildcard: false,
            registry: self.ctx.registry(),
        };
        let parsed = parse_path(&self.raw_path, options)?;
        Ok(self.path.get_or_init(|| parsed).clone())
    }

    fn live_adapter(&self) -> SyncroResult<Arc<dyn ReactiveAdapter>> {
        if *self.status.borrow() == EngineStatus::Destroyed {
            return Err(SyncroError::Destroyed);
        }
        self.adapter.read().clone().ok_or(SyncroError::NotMounted)
    }

    fn heartbeat_for(&self, path: &SyncroPath) -> &Arc<PresenceHeartbeat> {
        self.heartbeat.get_or_init(|| {
            PresenceHeartbeat::new(
                Arc::clone(self.ctx.coordinator()),
                path.clone(),
                self.ctx.session(),
                self.ctx.config().heartbeat_interval(),
            )
        })
    }

    fn set_status(&self, status: EngineStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            self.emit(SyncroEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: SyncroEvent) {
        let _ = self.event_tx.send(event);
    }

    fn add_teardown(&self, action: TeardownAction) {
        self.teardown.lock().push(action);
    }

    fn add_task_teardown(&self, task: JoinHandle<()>) {
        self.add_teardown(Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move { task.abort() })
        }));
    }

    fn add_unsubscribe_teardown(&self, handle: SubscriptionHandle) {
        self.add_teardown(Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move { handle.unsubscribe() })
        }));
    }

    /// Run and clear every registered teardown action concurrently
    async fn run_teardown(&self) {
        let actions: Vec<TeardownAction> = std::mem::take(&mut *self.teardown.lock());
        if actions.is_empty() {
            return;
        }
        debug!("Running {} teardown actions for {}", actions.len(), self.raw_path);
        join_all(actions.into_iter().map(|action| action())).await;
    }

    async fn try_mount(self: &Arc<Self>, path: &SyncroPath, options: &MountOptions) -> SyncroResult<()> {
        let store = self.ctx.store();
        let collection = path.collection();
        let doc_id = path.doc_id();

        let Subscription {
            snapshot,
            updates,
            handle,
        } = store.subscribe(collection, &doc_id).await?;
        self.add_unsubscribe_teardown(handle);

        let mut current = snapshot
            .as_ref()
            .map(decode_document)
            .unwrap_or_else(SyncroValue::empty_map);

        if current.is_empty() {
            match &options.initial_state {
                Some(initial) => {
                    debug!("Seeding {} from caller state", path);
                    store.set(collection, &doc_id, encode_document(initial)?).await?;
                    current = initial.clone();
                }
                None => {
                    debug!("Document {} is empty, requesting population", path);
                    self.ctx.coordinator().ensure_populated(path, false).await?;
                    if let Some(doc) = store.get(collection, &doc_id).await? {
                        current = decode_document(&doc);
                    }
                }
            }
        }
        if current == SyncroValue::Null {
            current = SyncroValue::empty_map();
        }

        let adapter = options.adapter.create(current.clone());
        check_contract(adapter.as_ref())?;
        let changes = adapter.watch();

        *self.last_synced.lock() = Some(current);
        *self.adapter.write() = Some(Arc::clone(&adapter));

        let weak = Arc::downgrade(self);
        let remote = tokio::spawn(remote_loop(weak.clone(), updates, options.remote_merge));
        self.add_task_teardown(remote);

        let local = tokio::spawn(local_loop(weak, changes, options.throttle));
        self.add_task_teardown(local);

        self.heartbeat_for(path).enable(true);
        Ok(())
    }

    fn apply_remote(&self, value: SyncroValue, mode: MergeMode) {
        let Some(adapter) = self.adapter.read().clone() else {
            return;
        };
        let SyncroValue::Map(fields) = value.clone() else {
            return;
        };

        *self.last_synced.lock() = Some(value);
        adapter.set_state(fields, mode);
        self.emit(SyncroEvent::RemoteApplied);
    }

    /// Write the live value if it differs from the last synced state
    async fn push_local(&self, force: bool) -> SyncroResult<bool> {
        let adapter = self.live_adapter()?;
        let value = adapter.get_state();
        if !force && self.last_synced.lock().as_ref() == Some(&value) {
            return Ok(false);
        }
        self.write_remote(&value, WriteMode::Merge).await?;
        *self.last_synced.lock() = Some(value);
        Ok(true)
    }

    async fn write_remote(&self, value: &SyncroValue, mode: WriteMode) -> SyncroResult<()> {
        let path = self.resolve_path()?;
        if let Some(heartbeat) = self.heartbeat.get() {
            heartbeat.mark_dirty();
        }

        let doc = encode_document(value)?;
        match mode {
            WriteMode::Set => {
                self.ctx
                    .store()
                    .set(path.collection(), &path.doc_id(), doc)
                    .await?
            }
            WriteMode::Merge => self.merge_with_reseed(&path, doc).await?,
        }

        self.emit(SyncroEvent::LocalPushed);
        Ok(())
    }

    /// Merge, re-populating a vanished document up to [`MAX_RESEEDS`] times
    async fn merge_with_reseed(&self, path: &SyncroPath, doc: WireDocument) -> SyncroResult<()> {
        let store = self.ctx.store();
        let coordinator = self.ctx.coordinator();
        let doc_id = path.doc_id();

        retry::with_backoff(
            &RetryPolicy::immediate(MAX_RESEEDS),
            |e: &SyncroError| matches!(e, SyncroError::NotFound { .. }),
            |attempt| {
                let doc = doc.clone();
                let doc_id = &doc_id;
                async move {
                    if attempt > 1 {
                        warn!(
                            "Document {} missing, re-seeding ({}/{})",
                            path,
                            attempt - 1,
                            MAX_RESEEDS
                        );
                        coordinator.ensure_populated(path, true).await?;
                    }
                    store
                        .merge(path.collection(), doc_id, doc)
                        .await
                        .map_err(SyncroError::from)
                }
            },
        )
        .await
        .map_err(RetryError::into_inner)
    }
}

/// Apply realtime snapshots to the live value
async fn remote_loop(
    engine: Weak<EngineInner>,
    mut updates: mpsc::UnboundedReceiver<Option<WireDocument>>,
    mode: MergeMode,
) {
    while let Some(update) = updates.recv().await {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        match update {
            Some(doc) => inner.apply_remote(decode_document(&doc), mode),
            None => debug!("Realtime document for {} was removed", inner.raw_path),
        }
    }
}

/// Push debounced local changes to the realtime store
async fn local_loop(engine: Weak<EngineInner>, mut changes: watch::Receiver<u64>, throttle: Duration) {
    while changes.changed().await.is_ok() {
        if !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }
        changes.borrow_and_update();

        let Some(inner) = engine.upgrade() else {
            break;
        };
        if let Err(e) = inner.push_local(false).await {
            warn!("Failed to push local changes for {}: {}", inner.raw_path, e);
            inner.emit(SyncroEvent::Error(e.to_string()));
        }
    }
}
