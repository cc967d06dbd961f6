//! Coordination service interface
//!
//! The coordination service populates floating documents from the durable
//! store, tracks presence heartbeats, and flushes documents back (and tears
//! them down) once clients go away.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncroResult;
use crate::path::SyncroPath;

/// Presence beacon body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSignal {
    /// Process-lifetime session token
    pub session: String,
    /// Present (and true) only when local changes are unflushed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
}

impl HeartbeatSignal {
    pub fn new(session: impl Into<String>, dirty: bool) -> Self {
        Self {
            session: session.into(),
            dirty: dirty.then_some(true),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.unwrap_or(false)
    }
}

/// Server-side population, presence and flush
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Create the realtime document from durable state if absent
    ///
    /// `force` re-populates even when the document exists.
    async fn ensure_populated(&self, path: &SyncroPath, force: bool) -> SyncroResult<()>;

    /// Report that this session still has the document mounted
    async fn heartbeat(&self, path: &SyncroPath, signal: &HeartbeatSignal) -> SyncroResult<()>;

    /// Persist the realtime document to durable storage
    ///
    /// `destroy` also removes the floating document afterwards.
    async fn flush(&self, path: &SyncroPath, destroy: bool) -> SyncroResult<()>;
}
