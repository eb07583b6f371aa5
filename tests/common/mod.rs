//! Hand-written fakes for the collaborator traits.
//!
//! `FakeStore` never pushes on its own: tests decide when a snapshot (or an
//! error) arrives by calling `push_*`. Writes are recorded and applied to an
//! in-memory document list.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use task_sync::config::SyncConfig;
use task_sync::error::{AuthError, StoreError};
use task_sync::logging::{LogRecord, Logger};
use task_sync::remote::{DocumentStore, IdentityHandler, IdentityProvider, SnapshotHandler};
use task_sync::subscriptions::{CancelToken, SubscriberSet};
use task_sync::sync::SyncContext;
use task_sync::types::{Document, Fields, Identity, Query, Snapshot, SnapshotEvent, task_fields};
use tokio::sync::{Notify, mpsc, oneshot};

pub const COLLECTION: &str = "todos";

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Subscribe(Query),
    Insert {
        collection: String,
        fields: Fields,
    },
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
    ListAll(String),
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreCall::Insert { .. } | StoreCall::Update { .. } | StoreCall::Delete { .. }
        )
    }
}

/// Test side of a held delete.
pub struct DeleteHold {
    /// Notified once the delete request reaches the store.
    pub started: Arc<Notify>,
    /// Resolves the held request.
    pub release: oneshot::Sender<Result<(), StoreError>>,
}

type HeldDelete = (Arc<Notify>, oneshot::Receiver<Result<(), StoreError>>);

#[derive(Default)]
pub struct FakeStore {
    subscribers: SubscriberSet<Query, SnapshotEvent>,
    documents: Mutex<Vec<Document>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_next_subscribe: Mutex<Option<StoreError>>,
    fail_requests: Mutex<Option<StoreError>>,
    held_delete: Mutex<Option<HeldDelete>>,
    next_id: AtomicU64,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a document without pushing anything.
    pub fn seed(&self, id: &str, owner: &str, text: &str) {
        self.documents
            .lock()
            .unwrap()
            .push(Document::new(id, task_fields(owner, text)));
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }

    /// Push each subscription its current query result.
    pub fn push_current(&self) {
        let documents = self.documents();
        self.subscribers.publish_with(|_, query| {
            Some(SnapshotEvent::Snapshot(Snapshot {
                documents: documents.iter().filter(|d| query.matches(d)).cloned().collect(),
            }))
        });
    }

    /// Push an arbitrary snapshot to every subscription.
    pub fn push_snapshot(&self, documents: Vec<Document>) {
        self.subscribers
            .publish(&SnapshotEvent::Snapshot(Snapshot { documents }));
    }

    /// Push a terminal error to every subscription.
    pub fn push_error(&self, error: StoreError) {
        self.subscribers.publish(&SnapshotEvent::Error(error));
    }

    pub fn fail_next_subscribe(&self, error: StoreError) {
        *self.fail_next_subscribe.lock().unwrap() = Some(error);
    }

    /// Fail every request (not subscriptions) until cleared.
    pub fn fail_requests(&self, error: Option<StoreError>) {
        *self.fail_requests.lock().unwrap() = error;
    }

    /// Make the next delete wait until the returned hold is released.
    pub fn hold_next_delete(&self) -> DeleteHold {
        let started = Arc::new(Notify::new());
        let (release, rx) = oneshot::channel();
        *self.held_delete.lock().unwrap() = Some((Arc::clone(&started), rx));
        DeleteHold { started, release }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Subscribe(_)))
            .count()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.fail_requests.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    fn subscribe(&self, query: Query, handler: SnapshotHandler) -> Result<CancelToken, StoreError> {
        self.record(StoreCall::Subscribe(query.clone()));
        if let Some(error) = self.fail_next_subscribe.lock().unwrap().take() {
            return Err(error);
        }

        let initial: Vec<Document> = self
            .documents()
            .into_iter()
            .filter(|d| query.matches(d))
            .collect();
        let token = self.subscribers.subscribe(query, handler);
        self.subscribers.deliver_to(
            token.id(),
            &SnapshotEvent::Snapshot(Snapshot { documents: initial }),
        );
        Ok(token)
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        self.record(StoreCall::Insert {
            collection: collection.to_string(),
            fields: fields.clone(),
        });
        self.check_failure()?;

        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.documents
            .lock()
            .unwrap()
            .push(Document::new(id.clone(), fields));
        Ok(id)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields: partial.clone(),
        });
        self.check_failure()?;

        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        doc.fields.extend(partial);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });

        let held = self.held_delete.lock().unwrap().take();
        if let Some((started, rx)) = held {
            started.notify_one();
            rx.await.unwrap_or(Ok(()))?;
        }
        self.check_failure()?;

        self.documents.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.record(StoreCall::ListAll(collection.to_string()));
        self.check_failure()?;
        Ok(self.documents())
    }
}

pub fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        email: format!("{}@example.com", uid.to_lowercase()),
    }
}

/// Identity provider whose transitions are driven by the test.
#[derive(Default)]
pub struct FakeIdentity {
    current: Mutex<Option<Identity>>,
    subscribers: SubscriberSet<(), Option<Identity>>,
    sign_out_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(uid: &str) -> Arc<Self> {
        let provider = Self::default();
        *provider.current.lock().unwrap() = Some(identity(uid));
        Arc::new(provider)
    }

    /// Transition and notify every handler.
    pub fn emit(&self, next: Option<Identity>) {
        *self.current.lock().unwrap() = next.clone();
        self.subscribers.publish(&next);
    }

    pub fn handler_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn on_change(&self, handler: IdentityHandler) -> CancelToken {
        let token = self
            .subscribers
            .subscribe((), move |identity: &Option<Identity>| handler(identity.as_ref()));
        let current = self.current.lock().unwrap().clone();
        self.subscribers.deliver_to(token.id(), &current);
        token
    }

    fn current(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }

    async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        if password != "secret" {
            return Err(AuthError::InvalidCredentials);
        }
        let uid = email.split('@').next().unwrap_or(email).to_uppercase();
        let next = identity(&uid);
        self.emit(Some(next.clone()));
        Ok(next)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.sign_in_with_credentials(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }
}

/// Build a context over the fakes. The receiver sees every logger record.
pub fn context(
    store: &Arc<FakeStore>,
    identity: &Arc<FakeIdentity>,
) -> (SyncContext, mpsc::UnboundedReceiver<LogRecord>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ctx = SyncContext::new(
        Arc::clone(store) as Arc<dyn DocumentStore>,
        Arc::clone(identity) as Arc<dyn IdentityProvider>,
        &SyncConfig::default(),
        Logger::new().with_sink(tx),
    );
    (ctx, rx)
}

/// Drain every record the logger has forwarded so far.
pub fn drain_logs(rx: &mut mpsc::UnboundedReceiver<LogRecord>) -> Vec<LogRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

pub fn text_of(fields: &Fields) -> Option<&str> {
    fields.get("text").and_then(Value::as_str)
}
