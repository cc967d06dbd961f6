//! In-process realtime store
//!
//! Keeps documents in memory and fans every change out to subscribers.
//! Used for single-process deployments, the local coordinator and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::codec::WireDocument;
use crate::error::StoreError;
use crate::store::{RealtimeStore, Subscription, SubscriptionHandle};

type DocKey = (String, String);

struct Subscriber {
    key: DocKey,
    tx: mpsc::UnboundedSender<Option<WireDocument>>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<DocKey, WireDocument>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

impl Inner {
    fn notify(&mut self, key: &DocKey) {
        let snapshot = self.docs.get(key).cloned();
        self.subscribers.retain(|_, sub| {
            if &sub.key != key {
                return true;
            }
            sub.tx.send(snapshot.clone()).is_ok()
        });
    }
}

/// Memory-backed [`RealtimeStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents held
    pub fn len(&self) -> usize {
        self.inner.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

fn key(collection: &str, id: &str) -> DocKey {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<WireDocument>, StoreError> {
        Ok(self.inner.lock().docs.get(&key(collection, id)).cloned())
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let doc_key = key(collection, id);

        let (snapshot, subscriber_id) = {
            let mut inner = self.inner.lock();
            let subscriber_id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(
                subscriber_id,
                Subscriber {
                    key: doc_key.clone(),
                    tx,
                },
            );
            (inner.docs.get(&doc_key).cloned(), subscriber_id)
        };

        debug!("Subscribed to {}/{} (#{})", collection, id, subscriber_id);

        let inner = Arc::clone(&self.inner);
        let handle = SubscriptionHandle::new(move || {
            inner.lock().subscribers.remove(&subscriber_id);
        });

        Ok(Subscription {
            snapshot,
            updates: rx,
            handle,
        })
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: WireDocument,
    ) -> Result<(), StoreError> {
        let doc_key = key(collection, id);
        let mut inner = self.inner.lock();
        let Some(doc) = inner.docs.get_mut(&doc_key) else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        doc.extend(fields);
        inner.notify(&doc_key);
        Ok(())
    }

    async fn set(&self, collection: &str, id: &str, doc: WireDocument) -> Result<(), StoreError> {
        let doc_key = key(collection, id);
        let mut inner = self.inner.lock();
        inner.docs.insert(doc_key.clone(), doc);
        inner.notify(&doc_key);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let doc_key = key(collection, id);
        let mut inner = self.inner.lock();
        if inner.docs.remove(&doc_key).is_some() {
            inner.notify(&doc_key);
        }
        Ok(())
    }
}
