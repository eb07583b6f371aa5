//! Snapshot Materializer: owns the scoped subscription and republishes the
//! visible collection.
//!
//! Every snapshot replaces the visible collection wholesale; consumers never
//! see a delta. Deliveries are checked against the live subscription handle
//! under the materializer lock, and `stop` takes the same lock, so once stop
//! returns nothing from the stopped subscription can be published.

use super::SyncContext;
use crate::error::SyncError;
use crate::logging::{LogLevel, Logger};
use crate::remote::DocumentStore;
use crate::subscriptions::CancelToken;
use crate::types::{Query, Snapshot, SnapshotEvent, TaskRecord};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// Read-only, render-ready ordered task list.
pub type VisibleCollection = Arc<Vec<TaskRecord>>;

/// Identifies one `start_for` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct ActiveSubscription {
    handle: SubscriptionHandle,
    owner: String,
    /// `None` until the store call returns.
    token: Option<CancelToken>,
}

#[derive(Default)]
struct MaterializerState {
    generation: u64,
    live: Option<ActiveSubscription>,
}

impl MaterializerState {
    fn is_live(&self, handle: SubscriptionHandle) -> bool {
        self.live.as_ref().is_some_and(|a| a.handle == handle)
    }
}

struct Shared {
    state: Mutex<MaterializerState>,
    visible: watch::Sender<VisibleCollection>,
    logger: Logger,
}

impl Shared {
    fn on_event(&self, handle: SubscriptionHandle, event: &SnapshotEvent) {
        let mut state = self.state.lock().unwrap();
        if !state.is_live(handle) {
            debug!(?handle, "Dropping delivery from stopped subscription");
            return;
        }

        match event {
            SnapshotEvent::Snapshot(snapshot) => {
                let records = materialize(snapshot, &self.logger);
                debug!(?handle, count = records.len(), "Visible collection replaced");
                self.visible.send_replace(Arc::new(records));
            }
            SnapshotEvent::Error(e) => {
                // Dropped: keep the last collection, do not resubscribe.
                let dropped = state.live.take();
                let owner = dropped.as_ref().map(|a| a.owner.clone());
                self.logger.log_with_data(
                    LogLevel::Error,
                    "Snapshot subscription dropped",
                    json!({ "owner": owner, "code": e.code(), "error": e.to_string() }),
                );
            }
        }
    }

    fn clear(&self) {
        self.visible.send_replace(Arc::new(Vec::new()));
    }
}

/// Map each document to a task record, in snapshot order. Documents that are
/// not task-shaped are skipped.
pub fn materialize(snapshot: &Snapshot, logger: &Logger) -> Vec<TaskRecord> {
    snapshot
        .documents
        .iter()
        .filter_map(|doc| match TaskRecord::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                logger.warning(&format!("Skipping document: {}", e));
                None
            }
        })
        .collect()
}

pub struct SnapshotMaterializer {
    store: Arc<dyn DocumentStore>,
    collection: String,
    shared: Arc<Shared>,
}

impl SnapshotMaterializer {
    pub fn new(ctx: &SyncContext) -> Self {
        let (visible, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            store: Arc::clone(&ctx.store),
            collection: ctx.collection.clone(),
            shared: Arc::new(Shared {
                state: Mutex::new(MaterializerState::default()),
                visible,
                logger: ctx.logger.named("materializer"),
            }),
        }
    }

    /// Subscribe to tasks owned by `uid`, replacing any active subscription.
    ///
    /// Returns `None` if the subscription could not be established; the
    /// error goes to the logger and the visible collection is left as is.
    pub fn start_for(&self, uid: &str) -> Option<SubscriptionHandle> {
        let handle = {
            let mut state = self.shared.state.lock().unwrap();
            let previous = state.live.take();
            state.generation += 1;
            let handle = SubscriptionHandle(state.generation);
            state.live = Some(ActiveSubscription {
                handle,
                owner: uid.to_string(),
                token: None,
            });
            if previous.is_some() {
                self.shared.clear();
            }
            handle
        };

        let weak = Arc::downgrade(&self.shared);
        let handler = Box::new(move |event: &SnapshotEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.on_event(handle, event);
            }
        });

        let query = Query::owned_by(self.collection.as_str(), uid);
        match self.store.subscribe(query, handler) {
            Ok(token) => {
                let mut state = self.shared.state.lock().unwrap();
                match state.live.as_mut() {
                    Some(active) if active.handle == handle => {
                        active.token = Some(token);
                        debug!(owner = %uid, ?handle, "Snapshot subscription started");
                        Some(handle)
                    }
                    // Stopped or dropped while the store was delivering.
                    _ => None,
                }
            }
            Err(e) => {
                {
                    let mut state = self.shared.state.lock().unwrap();
                    if state.is_live(handle) {
                        state.live = None;
                    }
                }
                let err = SyncError::Subscription(e);
                self.shared.logger.log_with_data(
                    LogLevel::Error,
                    "Snapshot subscription failed to establish",
                    json!({ "owner": uid, "code": err.code(), "error": err.to_string() }),
                );
                None
            }
        }
    }

    /// Stop `handle` if it is still the live subscription.
    pub fn stop(&self, handle: SubscriptionHandle) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if !state.is_live(handle) {
            return false;
        }
        let stopped = state.live.take();
        self.shared.clear();
        drop(stopped);
        true
    }

    /// Stop whatever subscription is live.
    pub fn stop_active(&self) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        match state.live.take() {
            Some(stopped) => {
                debug!(owner = %stopped.owner, "Snapshot subscription stopped");
                self.shared.clear();
                drop(stopped);
                true
            }
            None => false,
        }
    }

    /// Handle of the live subscription.
    pub fn active_handle(&self) -> Option<SubscriptionHandle> {
        self.shared.state.lock().unwrap().live.as_ref().map(|a| a.handle)
    }

    /// Owner uid of the live subscription.
    pub fn active_owner(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .unwrap()
            .live
            .as_ref()
            .map(|a| a.owner.clone())
    }

    /// Latest published collection.
    pub fn visible(&self) -> VisibleCollection {
        self.shared.visible.borrow().clone()
    }

    /// New consumer of collection replacements.
    pub fn watch(&self) -> watch::Receiver<VisibleCollection> {
        self.shared.visible.subscribe()
    }

    /// Check whether a record is in the latest published collection.
    pub fn contains(&self, record_id: &str) -> bool {
        self.shared
            .visible
            .borrow()
            .iter()
            .any(|r| r.id == record_id)
    }
}
