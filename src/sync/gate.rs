//! Identity Gate: the engine's only view of the identity provider.

use crate::error::AuthError;
use crate::remote::IdentityProvider;
use crate::subscriptions::CancelToken;
use crate::types::Identity;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Register for identity transitions. Fires immediately with the current
    /// state, then on every change, until the token is cancelled.
    pub fn on_identity_change<F>(&self, handler: F) -> CancelToken
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        self.provider.on_change(Box::new(handler))
    }

    /// The signed-in identity, if any.
    pub fn current(&self) -> Option<Identity> {
        self.provider.current()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.provider
            .sign_in_with_credentials(email, password)
            .await
            .inspect_err(|e| warn!("Sign-in failed: {}", e))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.provider
            .create_account(email, password)
            .await
            .inspect_err(|e| warn!("Sign-up failed: {}", e))
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        debug!("Sign-out requested");
        self.provider.sign_out().await
    }
}
