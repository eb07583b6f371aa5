//! Scoped realtime synchronization engine.
//!
//! - [`gate`] observes the identity provider.
//! - [`materializer`] turns pushed snapshots into the visible collection.
//! - [`dispatcher`] issues add/update/remove with pending-delete markers.
//! - [`edit`] holds the purely local view/edit state and the add input.
//! - [`session`] ties identity transitions to the subscription lifecycle.
//!
//! Everything is reached through a [`SyncContext`] built once at startup.

pub mod dispatcher;
pub mod edit;
pub mod gate;
pub mod materializer;
pub mod session;

pub use dispatcher::{MutationDispatcher, RemoveOutcome};
pub use edit::{EditState, RecordEditor, TaskComposer};
pub use gate::IdentityGate;
pub use materializer::{SnapshotMaterializer, SubscriptionHandle, VisibleCollection};
pub use session::{Navigation, SessionController, SessionState};

use crate::config::SyncConfig;
use crate::logging::Logger;
use crate::remote::{DocumentStore, IdentityProvider};
use std::sync::Arc;

/// Collaborators and settings shared by every sync component.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Collection holding task documents.
    pub collection: String,
    pub logger: Logger,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &SyncConfig,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            identity,
            collection: config.collection.clone(),
            logger,
        }
    }
}
