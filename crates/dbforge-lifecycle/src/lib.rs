//! Database lifecycle manager.
//!
//! [`DatabaseLifecycle`] answers whether a database exists and creates or
//! deletes it together with its schema. Every operation comes in a blocking
//! and an async form, is idempotent, and leaves the engine's connections
//! closed on every exit path, including errors and cancellation.

pub mod config;
mod guard;
pub mod manager;

#[cfg(test)]
mod tests;

pub use config::LifecycleConfig;
pub use manager::DatabaseLifecycle;

pub use dbforge_core::{ConnectionState, Error, ExistenceState, Result};
pub use tokio_util::sync::CancellationToken;
