//! Session Controller: identity transitions drive the subscription lifecycle.

use super::{IdentityGate, MutationDispatcher, SnapshotMaterializer, SyncContext};
use crate::error::AuthError;
use crate::subscriptions::CancelToken;
use crate::types::Identity;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

const NAVIGATION_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No identity callback has arrived yet.
    Loading,
    Authenticated(Identity),
    Unauthenticated,
}

/// Route changes requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    SignIn,
}

struct SessionInner {
    state: SessionState,
    identity_token: Option<CancelToken>,
    torn_down: bool,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    materializer: Arc<SnapshotMaterializer>,
    state_tx: watch::Sender<SessionState>,
    nav_tx: broadcast::Sender<Navigation>,
}

impl SessionShared {
    fn on_identity(&self, identity: Option<&Identity>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.torn_down {
            return;
        }

        match identity {
            Some(identity) => {
                let unchanged = matches!(
                    &inner.state,
                    SessionState::Authenticated(current) if current.uid == identity.uid
                );
                if unchanged {
                    return;
                }
                info!(uid = %identity.uid, "Session authenticated");
                self.materializer.start_for(&identity.uid);
                inner.state = SessionState::Authenticated(identity.clone());
            }
            None => {
                debug!("Session unauthenticated");
                self.materializer.stop_active();
                inner.state = SessionState::Unauthenticated;
                // No receivers is fine.
                let _ = self.nav_tx.send(Navigation::SignIn);
            }
        }
        self.state_tx.send_replace(inner.state.clone());
    }
}

/// Owns the materializer and dispatcher for one signed-in view.
///
/// Dropping the controller tears it down.
pub struct SessionController {
    shared: Arc<SessionShared>,
    gate: IdentityGate,
    dispatcher: Arc<MutationDispatcher>,
}

impl SessionController {
    /// Register with the identity gate. The gate reports the current state
    /// before this returns.
    pub fn start(ctx: &SyncContext) -> Self {
        let materializer = Arc::new(SnapshotMaterializer::new(ctx));
        let dispatcher = Arc::new(MutationDispatcher::new(ctx, Arc::clone(&materializer)));
        let gate = IdentityGate::new(Arc::clone(&ctx.identity));
        let (state_tx, _) = watch::channel(SessionState::Loading);
        let (nav_tx, _) = broadcast::channel(NAVIGATION_CAPACITY);

        let shared = Arc::new(SessionShared {
            inner: Mutex::new(SessionInner {
                state: SessionState::Loading,
                identity_token: None,
                torn_down: false,
            }),
            materializer,
            state_tx,
            nav_tx,
        });

        let weak = Arc::downgrade(&shared);
        let token = gate.on_identity_change(move |identity: Option<&Identity>| {
            if let Some(shared) = weak.upgrade() {
                shared.on_identity(identity);
            }
        });
        shared.inner.lock().unwrap().identity_token = Some(token);

        Self {
            shared,
            gate,
            dispatcher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().unwrap().state.clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Receive navigation requests emitted after this call.
    pub fn subscribe_navigation(&self) -> broadcast::Receiver<Navigation> {
        self.shared.nav_tx.subscribe()
    }

    /// The authenticated identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        match self.state() {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn materializer(&self) -> &Arc<SnapshotMaterializer> {
        &self.shared.materializer
    }

    pub fn dispatcher(&self) -> &Arc<MutationDispatcher> {
        &self.dispatcher
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    /// Sign out through the gate. The redirect follows from the resulting
    /// identity callback.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.gate.sign_out().await
    }

    /// Release the identity registration and the snapshot subscription.
    /// Idempotent.
    pub fn teardown(&self) {
        let token = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            inner.identity_token.take()
        };
        drop(token);
        self.shared.materializer.stop_active();
        debug!("Session torn down");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::db::Database;
    use crate::logging::Logger;
    use crate::remote::{IdentityProvider, LocalIdentityProvider, SqliteDocumentStore};

    fn setup() -> (SyncContext, Arc<LocalIdentityProvider>) {
        let db = Database::open_in_memory().unwrap();
        let store = Arc::new(SqliteDocumentStore::new(db.clone()));
        let identity = Arc::new(LocalIdentityProvider::new(db));
        let ctx = SyncContext::new(
            store,
            identity.clone(),
            &SyncConfig::default(),
            Logger::new(),
        );
        (ctx, identity)
    }

    #[tokio::test]
    async fn test_start_reports_unauthenticated() {
        let (ctx, _) = setup();
        let session = SessionController::start(&ctx);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.materializer().active_owner().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_starts_subscription() {
        let (ctx, identity) = setup();
        let session = SessionController::start(&ctx);

        let created = identity.create_account("a@example.com", "hunter22").await.unwrap();

        assert_eq!(session.state(), SessionState::Authenticated(created.clone()));
        assert_eq!(session.materializer().active_owner(), Some(created.uid));
    }

    #[tokio::test]
    async fn test_teardown_ignores_later_identity_changes() {
        let (ctx, identity) = setup();
        let session = SessionController::start(&ctx);
        session.teardown();

        identity.create_account("a@example.com", "hunter22").await.unwrap();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.materializer().active_owner().is_none());
    }
}
