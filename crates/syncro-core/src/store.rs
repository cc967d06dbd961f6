//! Realtime store interface
//!
//! The low-latency document store used as the live collaboration medium.
//! Documents are addressed by collection and id and hold top-level
//! [`WireValue`](crate::codec::WireValue) fields.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::codec::WireDocument;
use crate::error::StoreError;

/// Handle that stops a subscription's snapshot delivery
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving snapshots
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A live document subscription
#[derive(Debug)]
pub struct Subscription {
    /// Document contents at subscription time (`None` if missing)
    pub snapshot: Option<WireDocument>,
    /// Subsequent snapshots; `None` means the document was deleted
    pub updates: mpsc::UnboundedReceiver<Option<WireDocument>>,
    /// Cancels delivery
    pub handle: SubscriptionHandle,
}

/// A subscription-capable document store
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Read a document
    async fn get(&self, collection: &str, id: &str) -> Result<Option<WireDocument>, StoreError>;

    /// Subscribe to a document's snapshots
    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription, StoreError>;

    /// Update the named top-level fields of an existing document
    ///
    /// Fails with [`StoreError::NotFound`] if the document is missing.
    async fn merge(&self, collection: &str, id: &str, fields: WireDocument)
        -> Result<(), StoreError>;

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, doc: WireDocument) -> Result<(), StoreError>;

    /// Remove a document
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
