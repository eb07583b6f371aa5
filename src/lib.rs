//! task-sync library
//!
//! Identity-scoped realtime task list synchronization, plus a stateless HTTP
//! CRUD surface over the same record shape.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod remote;
pub mod subscriptions;
pub mod sync;
pub mod types;
