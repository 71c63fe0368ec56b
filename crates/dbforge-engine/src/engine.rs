use std::time::Duration;

use async_trait::async_trait;

use dbforge_core::{
    CatalogSnapshot, ConnectionState, DatabaseHandle, EngineKind, Result, SchemaDefinition,
};

use crate::postgres::PostgresEngine;
use crate::sqlite::SqliteEngine;

/// Capability interface implemented once per database engine.
///
/// Probes report absence as `Ok(false)`; every other failure is an error.
/// Implementations open connections lazily and keep them until [`Engine::close`]
/// or [`Engine::release`] is called.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    fn handle(&self) -> &DatabaseHandle;

    /// `Open` while any connection slot of this engine is open.
    fn connection_state(&self) -> ConnectionState;

    /// Close every connection slot.
    async fn close(&self);

    /// Drop every connection slot without waiting.
    fn release(&self);

    /// Catalog probe: does the physical database exist?
    async fn database_exists(&self) -> Result<bool>;

    async fn create_database(&self) -> Result<()>;

    /// Does the database contain any user table?
    async fn has_tables(&self) -> Result<bool>;

    /// Create every table of `definition` in a single transaction.
    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<()>;

    /// Disconnect sessions other than ours; returns how many were ended.
    async fn terminate_other_sessions(&self) -> Result<u64>;

    async fn drop_database(&self) -> Result<()>;

    /// Base tables and columns of the database.
    async fn catalog(&self) -> Result<CatalogSnapshot>;
}

/// Connection settings shared by all engines.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How long to wait for a connection before reporting a connectivity failure.
    pub acquire_timeout: Duration,
    /// Database used for server-level catalog queries (Postgres).
    pub maintenance_database: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(10),
            maintenance_database: "postgres".to_string(),
        }
    }
}

/// Build the engine matching the handle's engine kind.
pub fn build_engine(handle: DatabaseHandle, opts: &EngineOptions) -> Result<Box<dyn Engine>> {
    match handle.engine() {
        EngineKind::Postgres => Ok(Box::new(PostgresEngine::new(handle, opts)?)),
        EngineKind::Sqlite => Ok(Box::new(SqliteEngine::new(handle, opts)?)),
    }
}
