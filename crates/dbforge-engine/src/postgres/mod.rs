//! PostgreSQL engine.
//!
//! Server-level probes, `CREATE DATABASE` and `DROP DATABASE` go through the
//! maintenance database; schema work goes through the target database.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;

use dbforge_core::{
    CatalogSnapshot, ConnectionState, DatabaseHandle, Error, Result, SchemaDefinition,
};

use crate::connection::ConnectionSlot;
use crate::ddl::{PostgresDialect, quote_ident, schema_statements};
use crate::engine::{Engine, EngineOptions};

mod queries;

/// SQLSTATE for a database that does not exist.
const INVALID_CATALOG_NAME: &str = "3D000";
/// SQLSTATE raised by `DROP DATABASE` while sessions are still connected.
const OBJECT_IN_USE: &str = "55006";
/// Terminated backends exit asynchronously; the drop is retried meanwhile.
const DROP_ATTEMPTS: u32 = 5;
const DROP_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Engine for PostgreSQL servers.
pub struct PostgresEngine {
    handle: DatabaseHandle,
    target: ConnectionSlot<sqlx::Postgres>,
    maintenance: ConnectionSlot<sqlx::Postgres>,
}

impl PostgresEngine {
    pub fn new(handle: DatabaseHandle, opts: &EngineOptions) -> Result<Self> {
        let target = PgConnectOptions::from_str(handle.connection())
            .map_err(|err| Error::InvalidHandle(err.to_string()))?;
        let maintenance = target.clone().database(&opts.maintenance_database);

        Ok(Self {
            target: ConnectionSlot::new("target", target, opts.acquire_timeout),
            maintenance: ConnectionSlot::new("maintenance", maintenance, opts.acquire_timeout),
            handle,
        })
    }

    fn database(&self) -> &str {
        self.handle.database()
    }

    /// Probe by connecting to the target itself; used when the maintenance
    /// database is unavailable.
    async fn probe_target(&self) -> Result<bool> {
        match self.target.open().await {
            Ok(_) => Ok(true),
            Err(err) if is_missing_database(&err) => Ok(false),
            Err(err) => Err(map_error(err)),
        }
    }
}

#[async_trait]
impl Engine for PostgresEngine {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn handle(&self) -> &DatabaseHandle {
        &self.handle
    }

    fn connection_state(&self) -> ConnectionState {
        match (self.target.state(), self.maintenance.state()) {
            (ConnectionState::Closed, ConnectionState::Closed) => ConnectionState::Closed,
            _ => ConnectionState::Open,
        }
    }

    async fn close(&self) {
        self.target.close().await;
        self.maintenance.close().await;
    }

    fn release(&self) {
        self.target.release();
        self.maintenance.release();
    }

    async fn database_exists(&self) -> Result<bool> {
        let pool = match self.maintenance.open().await {
            Ok(pool) => pool,
            Err(err) if is_missing_database(&err) => {
                tracing::debug!(
                    event = "maintenance_database_missing",
                    fallback = "target_probe"
                );
                return self.probe_target().await;
            }
            Err(err) => return Err(map_error(err)),
        };
        queries::database_exists(&pool, self.database()).await
    }

    async fn create_database(&self) -> Result<()> {
        let pool = self.maintenance.open().await.map_err(map_error)?;
        let sql = format!("CREATE DATABASE {}", quote_ident(self.database()));
        queries::execute_ddl(&pool, &sql).await
    }

    async fn has_tables(&self) -> Result<bool> {
        let pool = self.target.open().await.map_err(map_error)?;
        queries::has_user_tables(&pool).await
    }

    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<()> {
        let statements = schema_statements(&PostgresDialect, definition)?;
        let pool = self.target.open().await.map_err(map_error)?;
        queries::execute_script(&pool, &statements).await
    }

    async fn terminate_other_sessions(&self) -> Result<u64> {
        let pool = self.maintenance.open().await.map_err(map_error)?;
        queries::terminate_other_sessions(&pool, self.database()).await
    }

    async fn drop_database(&self) -> Result<()> {
        // Our own session would block the drop just like anyone else's.
        self.target.close().await;
        let pool = self.maintenance.open().await.map_err(map_error)?;
        let sql = format!("DROP DATABASE {}", quote_ident(self.database()));

        let mut attempt = 1;
        loop {
            match sqlx::raw_sql(&sql).execute(&pool).await {
                Ok(_) => return Ok(()),
                Err(err) if attempt < DROP_ATTEMPTS && has_code(&err, OBJECT_IN_USE) => {
                    tracing::debug!(event = "drop_database_retry", attempt, database = self.database());
                    attempt += 1;
                    tokio::time::sleep(DROP_RETRY_DELAY).await;
                }
                Err(err) => return Err(map_error(err)),
            }
        }
    }

    async fn catalog(&self) -> Result<CatalogSnapshot> {
        let pool = self.target.open().await.map_err(map_error)?;
        let mut snapshot = CatalogSnapshot::new(self.engine(), self.database());
        snapshot.tables = queries::list_tables(&pool).await?;
        Ok(snapshot)
    }
}

fn is_missing_database(err: &sqlx::Error) -> bool {
    has_code(err, INVALID_CATALOG_NAME)
}

fn has_code(err: &sqlx::Error, sqlstate: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(sqlstate),
        _ => false,
    }
}

/// Normalize `sqlx` errors into the shared error kinds.
pub(crate) fn map_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::ConnectivityFailure(err.to_string()),
        sqlx::Error::Database(db) => {
            let code = db.code();
            match code.as_deref() {
                Some(INVALID_CATALOG_NAME) => Error::NotFound(db.message().to_string()),
                // Class 08: connection exception; class 28: invalid authorization; 57P01..03: shutdown.
                Some(code)
                    if code.starts_with("08")
                        || code.starts_with("28")
                        || code.starts_with("57P") =>
                {
                    Error::ConnectivityFailure(err.to_string())
                }
                _ => Error::Db(err.to_string()),
            }
        }
        sqlx::Error::RowNotFound => Error::NotFound(err.to_string()),
        _ => Error::Db(err.to_string()),
    }
}
