//! Syncro Core Library
//!
//! This crate keeps "floating" entities in step across clients: a document
//! that lives in a realtime store while someone has it open, and in a
//! durable store the rest of the time.
//!
//! # Architecture
//!
//! - **Realtime store**: live collaboration medium, one document per path
//! - **Coordinator**: populates documents from durable state, tracks
//!   presence heartbeats, flushes documents back
//! - **Engine**: binds one path to a reactive live value and syncs both ways
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(MemoryStore::new());
//! let coordinator = Arc::new(RegistryClient::new("https://api.example.com")?);
//! let ctx = SyncroContext::new(SyncroConfig::load()?, store, coordinator).shared();
//!
//! let engine = SyncroEngine::new(ctx, "projects::11111111-1111-1111-1111-111111111111");
//! engine.mount(engine.default_mount_options()).await?;
//! engine.set(("title", "Roadmap"), SetOptions::default()).await?;
//! ```
//!
//! # Modules
//!
//! - `engine`: Mount lifecycle and two-way sync (main entry point)
//! - `path`: `ENTITY::UUID(::RELATION)?` addressing
//! - `codec`: Realtime wire format and typed field encoding
//! - `store`, `memory`: Realtime store interface and in-memory backend
//! - `coordinator`, `client`, `local`: Coordination service interface,
//!   HTTP client and in-process implementation
//! - `heartbeat`: Presence beacon
//! - `config`: Engine configuration

pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod local;
pub mod memory;
pub mod path;
pub mod reactive;
pub mod registry;
pub mod retry;
pub mod store;
pub mod synthetic;
pub mod value;

pub use client::RegistryClient;
pub use codec::{WireDocument, WireValue};
pub use config::SyncroConfig;
pub use context::SyncroContext;
pub use coordinator::{Coordinator, HeartbeatSignal};
pub use engine::{
    EngineStatus, MountOptions, SetOptions, SetOutcome, StatePatch, SyncroEngine, SyncroEvent,
    WriteMode,
};
pub use error::{StoreError, SyncroError, SyncroResult};
pub use heartbeat::PresenceHeartbeat;
pub use local::LocalCoordinator;
pub use memory::MemoryStore;
pub use path::{ParseOptions, SyncroPath};
pub use reactive::{AdapterFactory, LiveHandle, LiveState, LiveWriteGuard, MergeMode, ReactiveAdapter};
pub use registry::{EntityContext, EntityDescriptor, EntityHooks, EntityRegistry};
pub use store::{RealtimeStore, Subscription, SubscriptionHandle};
pub use value::{SyncroValue, ValueMap};
