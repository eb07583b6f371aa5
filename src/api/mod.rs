//! Stateless HTTP CRUD surface over an unscoped collection.
//!
//! Independent of the realtime engine: it shares only the record shape and
//! the store. No identity, no subscriptions.

mod error;
mod server;

pub use error::ApiError;
pub use server::{ApiServer, build_router, start_server};
