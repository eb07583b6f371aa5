//! Error types for the sync engine, the store and the identity provider.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidBody,
    EmptyText,
    NoIdentity,
    UnknownRecord,
    NotEditing,

    // Identity errors
    InvalidEmail,
    WeakPassword,
    EmailInUse,
    InvalidCredentials,

    // Remote errors
    RemoteWrite,
    Subscription,
    NotFound,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Input rejected before any request reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task text must not be empty")]
    EmptyText,
    #[error("no identity is signed in")]
    NoIdentity,
    #[error("unknown task: {0}")]
    UnknownRecord(String),
    #[error("no task is being edited")]
    NotEditing,
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::EmptyText => ErrorCode::EmptyText,
            ValidationError::NoIdentity => ErrorCode::NoIdentity,
            ValidationError::UnknownRecord(_) => ErrorCode::UnknownRecord,
            ValidationError::NotEditing => ErrorCode::NotEditing,
        }
    }
}

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Database(_) | StoreError::Malformed(_) => ErrorCode::DatabaseError,
            StoreError::Unavailable(_) => ErrorCode::InternalError,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed store errors that were wrapped on the way up
        match err.downcast::<StoreError>() {
            Ok(store_err) => store_err,
            Err(err) => StoreError::Database(err.to_string()),
        }
    }
}

/// Which mutation a remote write failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Add,
    Update,
    Delete,
}

impl WriteOp {
    /// Generic message shown to the user when this write fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            WriteOp::Add => "Failed to add task.",
            WriteOp::Update => "Failed to update the task.",
            WriteOp::Delete => "Failed to delete the task.",
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Add => write!(f, "add"),
            WriteOp::Update => write!(f, "update"),
            WriteOp::Delete => write!(f, "delete"),
        }
    }
}

/// Errors surfaced by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Display is the user-facing message; the store detail stays in `source`.
    #[error("{}", op.failure_message())]
    RemoteWrite {
        op: WriteOp,
        #[source]
        source: StoreError,
    },
    #[error("subscription failed: {0}")]
    Subscription(#[source] StoreError),
}

impl SyncError {
    pub fn remote_write(op: WriteOp, source: StoreError) -> Self {
        Self::RemoteWrite { op, source }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::Validation(e) => e.code(),
            SyncError::RemoteWrite { .. } => ErrorCode::RemoteWrite,
            SyncError::Subscription(_) => ErrorCode::Subscription,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}

/// Failures reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("an account already exists for {0}")]
    EmailInUse(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::InvalidEmail(_) => ErrorCode::InvalidEmail,
            AuthError::WeakPassword { .. } => ErrorCode::WeakPassword,
            AuthError::EmailInUse(_) => ErrorCode::EmailInUse,
            AuthError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AuthError::Store(e) => e.code(),
        }
    }
}

/// Result type for sync engine operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
