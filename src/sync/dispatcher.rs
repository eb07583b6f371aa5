//! Mutation Dispatcher: validated add/update/remove against the store.
//!
//! Writes are fire-and-acknowledge. The visible collection only changes when
//! the store pushes the next snapshot, never from here.

use super::{SnapshotMaterializer, SyncContext};
use crate::error::{StoreError, SyncError, SyncResult, ValidationError, WriteOp};
use crate::logging::{LogLevel, Logger};
use crate::remote::DocumentStore;
use crate::types::{Identity, task_fields, text_fields};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Prompt passed to the remove confirmation gate.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";

/// What `remove` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The user did not confirm; nothing was sent.
    Declined,
    /// A delete for this record is already in flight.
    AlreadyPending,
    /// The store acknowledged the delete.
    Removed,
}

/// Pending-delete marker for one record. Cleared on drop.
struct PendingMarker<'a> {
    markers: &'a watch::Sender<BTreeSet<String>>,
    record_id: String,
}

impl<'a> PendingMarker<'a> {
    fn acquire(markers: &'a watch::Sender<BTreeSet<String>>, record_id: &str) -> Option<Self> {
        let inserted = markers.send_if_modified(|set| set.insert(record_id.to_string()));
        inserted.then(|| Self {
            markers,
            record_id: record_id.to_string(),
        })
    }
}

impl Drop for PendingMarker<'_> {
    fn drop(&mut self) {
        self.markers
            .send_if_modified(|set| set.remove(&self.record_id));
    }
}

pub struct MutationDispatcher {
    store: Arc<dyn DocumentStore>,
    collection: String,
    materializer: Arc<SnapshotMaterializer>,
    pending: watch::Sender<BTreeSet<String>>,
    logger: Logger,
}

impl MutationDispatcher {
    pub fn new(ctx: &SyncContext, materializer: Arc<SnapshotMaterializer>) -> Self {
        let (pending, _) = watch::channel(BTreeSet::new());
        Self {
            store: Arc::clone(&ctx.store),
            collection: ctx.collection.clone(),
            materializer,
            pending,
            logger: ctx.logger.named("dispatcher"),
        }
    }

    /// Create a task owned by `identity`. Returns the new document id.
    pub async fn add(&self, identity: Option<&Identity>, text: &str) -> SyncResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let identity = identity.ok_or(ValidationError::NoIdentity)?;

        let id = self
            .store
            .insert(&self.collection, task_fields(&identity.uid, text))
            .await
            .map_err(|e| self.write_failed(WriteOp::Add, None, e))?;
        debug!(%id, owner = %identity.uid, "Task added");
        Ok(id)
    }

    /// Replace the text of a visible task.
    pub async fn update(&self, record_id: &str, text: &str) -> SyncResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        if !self.materializer.contains(record_id) {
            return Err(ValidationError::UnknownRecord(record_id.to_string()).into());
        }

        self.store
            .update_fields(&self.collection, record_id, text_fields(text))
            .await
            .map_err(|e| self.write_failed(WriteOp::Update, Some(record_id), e))?;
        debug!(id = %record_id, "Task updated");
        Ok(())
    }

    /// Delete a task after `confirm` approves [`DELETE_PROMPT`].
    ///
    /// The record is marked pending while the request is in flight; a second
    /// remove for the same record during that window is not sent.
    pub async fn remove<F>(&self, record_id: &str, confirm: F) -> SyncResult<RemoveOutcome>
    where
        F: FnOnce(&str) -> bool,
    {
        if self.is_pending(record_id) {
            return Ok(RemoveOutcome::AlreadyPending);
        }
        if !confirm(DELETE_PROMPT) {
            return Ok(RemoveOutcome::Declined);
        }
        let Some(_marker) = PendingMarker::acquire(&self.pending, record_id) else {
            return Ok(RemoveOutcome::AlreadyPending);
        };

        self.store
            .delete(&self.collection, record_id)
            .await
            .map_err(|e| self.write_failed(WriteOp::Delete, Some(record_id), e))?;
        debug!(id = %record_id, "Task removed");
        Ok(RemoveOutcome::Removed)
    }

    /// Check if a delete is in flight for `record_id`.
    pub fn is_pending(&self, record_id: &str) -> bool {
        self.pending.borrow().contains(record_id)
    }

    /// Records with a delete in flight.
    pub fn pending(&self) -> BTreeSet<String> {
        self.pending.borrow().clone()
    }

    fn write_failed(&self, op: WriteOp, record_id: Option<&str>, source: StoreError) -> SyncError {
        self.logger.log_with_data(
            LogLevel::Error,
            op.failure_message(),
            json!({ "op": op.to_string(), "id": record_id, "error": source.to_string() }),
        );
        SyncError::remote_write(op, source)
    }
}
