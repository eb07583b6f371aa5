//! Email/password identity provider backed by the local database.

use super::{IdentityHandler, IdentityProvider};
use crate::db::Database;
use crate::error::AuthError;
use crate::subscriptions::{CancelToken, SubscriberSet};
use crate::types::Identity;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(AuthError::InvalidEmail(email.to_string()))
    }
}

/// Identity provider storing accounts in the `accounts` table.
///
/// Holds one signed-in identity per process and pushes every transition to
/// registered handlers on the thread that caused it.
pub struct LocalIdentityProvider {
    db: Database,
    current: Mutex<Option<Identity>>,
    subscribers: SubscriberSet<(), Option<Identity>>,
}

impl LocalIdentityProvider {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            current: Mutex::new(None),
            subscribers: SubscriberSet::new(),
        }
    }

    fn transition(&self, next: Option<Identity>) {
        *self.current.lock().unwrap() = next.clone();
        self.subscribers.publish(&next);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
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
        let email = validate_email(email)?;
        let account = self
            .db
            .find_account_by_email(&email)
            .map_err(|e| AuthError::Store(e.into()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if hash_password(&account.password_salt, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials);
        }

        let identity = Identity {
            uid: account.uid,
            email: account.email,
        };
        info!(uid = %identity.uid, "Signed in");
        self.transition(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let uid = Uuid::now_v7().simple().to_string();
        let salt = Uuid::new_v4().simple().to_string();
        let created = self
            .db
            .create_account(&uid, &email, &salt, &hash_password(&salt, password))
            .map_err(|e| AuthError::Store(e.into()))?;
        if !created {
            return Err(AuthError::EmailInUse(email));
        }

        let identity = Identity { uid, email };
        info!(uid = %identity.uid, "Account created");
        self.transition(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.current.lock().unwrap().is_some() {
            info!("Signed out");
        }
        self.transition(None);
        Ok(())
    }
}
