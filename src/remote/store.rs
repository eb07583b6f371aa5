//! SQLite-backed document store with push subscriptions.

use super::{DocumentStore, SnapshotHandler};
use crate::db::Database;
use crate::error::StoreError;
use crate::subscriptions::{CancelToken, SubscriberSet};
use crate::types::{Document, Fields, Query, Snapshot, SnapshotEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Authoritative store over a `Database`.
///
/// Every write re-runs the query of each live subscription on the written
/// collection and pushes the result. Writes and their fan-out are serialized
/// under one lock, so each subscription observes snapshots in write order.
pub struct SqliteDocumentStore {
    db: Database,
    subscribers: SubscriberSet<Query, SnapshotEvent>,
    write_lock: Mutex<()>,
    seen_version: AtomicI64,
}

impl SqliteDocumentStore {
    /// Create a new store over an open database.
    pub fn new(db: Database) -> Self {
        let seen_version = db.data_version().unwrap_or_default();
        Self {
            db,
            subscribers: SubscriberSet::new(),
            write_lock: Mutex::new(()),
            seen_version: AtomicI64::new(seen_version),
        }
    }

    /// Get the database reference.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Number of live snapshot subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }

    fn snapshot_event(&self, query: &Query) -> SnapshotEvent {
        match self.db.query_documents(query) {
            Ok(documents) => SnapshotEvent::Snapshot(Snapshot { documents }),
            Err(e) => SnapshotEvent::Error(e.into()),
        }
    }

    /// Push fresh snapshots to subscriptions on `collection`, or on every
    /// collection when `None`. Must be called with the write lock held.
    fn fan_out(&self, collection: Option<&str>) {
        let mut failed = Vec::new();
        self.subscribers.publish_with(|id, query| {
            if collection.is_some_and(|c| c != query.collection) {
                return None;
            }
            let event = self.snapshot_event(query);
            if let SnapshotEvent::Error(ref e) = event {
                warn!(
                    collection = %query.collection,
                    error = %e,
                    "Snapshot query failed; closing subscription"
                );
                failed.push(id);
            }
            Some(event)
        });
        // An error event is terminal for its subscription.
        for id in failed {
            self.subscribers.remove(id);
        }
    }

    /// Re-deliver snapshots to every live subscription.
    pub fn refresh(&self) {
        let _guard = self.write_lock.lock().unwrap();
        self.fan_out(None);
    }

    /// Re-deliver snapshots if another connection has committed since the
    /// last check. Returns whether a refresh happened.
    pub fn refresh_if_changed(&self) -> anyhow::Result<bool> {
        let version = self.db.data_version()?;
        if self.seen_version.swap(version, Ordering::AcqRel) == version {
            return Ok(false);
        }
        debug!(version, "External database change detected");
        self.refresh();
        Ok(true)
    }

    /// Poll for writes made by other processes sharing the database file.
    pub fn spawn_change_poller(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(e) = store.refresh_if_changed() {
                    warn!("Change poll failed: {}", e);
                }
            }
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn subscribe(&self, query: Query, handler: SnapshotHandler) -> Result<CancelToken, StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        // Establishing fails if the initial query fails.
        let initial = self.db.query_documents(&query)?;

        debug!(
            collection = %query.collection,
            filter = ?query.filter,
            "Snapshot subscription established"
        );
        let token = self.subscribers.subscribe(query, handler);
        self.subscribers.deliver_to(
            token.id(),
            &SnapshotEvent::Snapshot(Snapshot { documents: initial }),
        );
        Ok(token)
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let id = self.db.insert_document(collection, fields)?;
        self.fan_out(Some(collection));
        Ok(id)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        self.db.update_document_fields(collection, id, partial)?;
        self.fan_out(Some(collection));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        if self.db.delete_document(collection, id)? {
            self.fan_out(Some(collection));
        }
        Ok(())
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.db.list_documents(collection)?)
    }
}
