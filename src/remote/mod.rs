//! Collaborator seams: the authoritative document store and the identity
//! provider. The sync engine only talks to these traits.

pub mod identity;
pub mod store;

pub use identity::LocalIdentityProvider;
pub use store::SqliteDocumentStore;

use crate::error::{AuthError, StoreError};
use crate::subscriptions::CancelToken;
use crate::types::{Document, Fields, Identity, Query, SnapshotEvent};
use async_trait::async_trait;

/// Handler for pushed snapshot events.
pub type SnapshotHandler = Box<dyn Fn(&SnapshotEvent) + Send + Sync>;

/// Handler for identity transitions; `None` means signed out.
pub type IdentityHandler = Box<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Authoritative, push-capable document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Start a live query. The current snapshot is delivered before this
    /// returns; later writes to the collection push fresh snapshots in write
    /// order. Fails if the query cannot be established.
    fn subscribe(&self, query: Query, handler: SnapshotHandler) -> Result<CancelToken, StoreError>;

    /// Insert a document; the store assigns and returns its id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Shallow-merge `partial` into an existing document.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Every document in a collection, unscoped.
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

/// Source of the signed-in identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register for identity transitions. The handler runs once immediately
    /// with the current state, then on every change.
    fn on_change(&self, handler: IdentityHandler) -> CancelToken;

    /// The identity signed in right now, if any.
    fn current(&self) -> Option<Identity>;

    async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError>;

    /// Create an account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}
