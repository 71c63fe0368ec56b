//! SQLite engine.
//!
//! The database is a single file: its existence is the catalog probe, an empty
//! file is a valid empty database, and dropping removes the file together with
//! its journal siblings.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;

use dbforge_core::{
    CatalogSnapshot, ConnectionState, DatabaseHandle, Error, Result, SchemaDefinition,
};

use crate::connection::ConnectionSlot;
use crate::ddl::{SqliteDialect, schema_statements};
use crate::engine::{Engine, EngineOptions};

mod queries;

/// Primary result code for a file that cannot be opened.
const SQLITE_CANTOPEN: i32 = 14;

/// Files SQLite may keep next to the database.
const SIBLING_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Engine for file-backed SQLite databases.
pub struct SqliteEngine {
    handle: DatabaseHandle,
    path: PathBuf,
    slot: ConnectionSlot<sqlx::Sqlite>,
}

impl SqliteEngine {
    pub fn new(handle: DatabaseHandle, opts: &EngineOptions) -> Result<Self> {
        let path = handle.file_path().ok_or_else(|| {
            Error::InvalidHandle(format!("not a SQLite database handle: {handle}"))
        })?;
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false)
            .foreign_keys(true);

        Ok(Self {
            slot: ConnectionSlot::new("file", options, opts.acquire_timeout),
            path,
            handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    fn handle(&self) -> &DatabaseHandle {
        &self.handle
    }

    fn connection_state(&self) -> ConnectionState {
        self.slot.state()
    }

    async fn close(&self) {
        self.slot.close().await;
    }

    fn release(&self) {
        self.slot.release();
    }

    async fn database_exists(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Err(Error::Unsupported(format!(
                "database path is not a file: {}",
                self.path.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::ConnectivityFailure(format!(
                "cannot inspect {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn create_database(&self) -> Result<()> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn has_tables(&self) -> Result<bool> {
        let pool = self.slot.open().await.map_err(map_error)?;
        queries::has_user_tables(&pool).await
    }

    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<()> {
        let statements = schema_statements(&SqliteDialect, definition)?;
        let pool = self.slot.open().await.map_err(map_error)?;
        queries::execute_script(&pool, &statements).await
    }

    async fn terminate_other_sessions(&self) -> Result<u64> {
        // Other handles on the file cannot be enumerated; removing the file
        // does not depend on them being closed.
        Ok(0)
    }

    async fn drop_database(&self) -> Result<()> {
        self.slot.close().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "database file {}",
                    self.path.display()
                )));
            }
            Err(err) => return Err(Error::Io(err)),
        }
        for suffix in SIBLING_SUFFIXES {
            match tokio::fs::remove_file(self.sibling(suffix)).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(Error::Io(err)),
            }
        }
        Ok(())
    }

    async fn catalog(&self) -> Result<CatalogSnapshot> {
        let pool = self.slot.open().await.map_err(map_error)?;
        let mut snapshot = CatalogSnapshot::new(self.engine(), self.handle.database());
        snapshot.tables = queries::list_tables(&pool).await?;
        Ok(snapshot)
    }
}

/// Normalize `sqlx` errors into the shared error kinds.
pub(crate) fn map_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.code().is_some_and(|code| is_cantopen(&code)) => {
            Error::NotFound(err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::ConnectivityFailure(err.to_string())
        }
        sqlx::Error::RowNotFound => Error::NotFound(err.to_string()),
        _ => Error::Db(err.to_string()),
    }
}

/// Extended result codes keep the primary code in their low byte.
fn is_cantopen(code: &str) -> bool {
    code.parse::<i32>()
        .is_ok_and(|code| code & 0xff == SQLITE_CANTOPEN)
}
