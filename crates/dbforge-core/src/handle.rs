use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::redaction::redact_connection_string;

/// Longest identifier Postgres keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Database engine a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Postgres,
    Sqlite,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Sqlite => "sqlite",
        }
    }

    /// Infer the engine from a connection string or file path.
    pub fn detect(conn: &str) -> Result<Self> {
        if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
            return Ok(EngineKind::Postgres);
        }
        if conn.starts_with("sqlite:") {
            return Ok(EngineKind::Sqlite);
        }
        let extension = Path::new(conn)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("db" | "sqlite" | "sqlite3") => Ok(EngineKind::Sqlite),
            _ => Err(Error::InvalidHandle(format!(
                "cannot infer engine from '{}'",
                redact_connection_string(conn).redacted
            ))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one physical database.
///
/// For Postgres the connection is a URL whose path names the database; for
/// SQLite it is the database file path. The handle is owned by the caller and
/// carries no connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHandle {
    engine: EngineKind,
    connection: String,
    database: String,
}

impl DatabaseHandle {
    /// Parse a connection string (`postgres://...`, `sqlite://path`) or a
    /// database file path.
    pub fn parse(conn: &str) -> Result<Self> {
        match EngineKind::detect(conn)? {
            EngineKind::Postgres => Self::postgres(conn),
            EngineKind::Sqlite => {
                let path = conn
                    .strip_prefix("sqlite://")
                    .or_else(|| conn.strip_prefix("sqlite:"))
                    .unwrap_or(conn);
                let (path, query) = match path.split_once('?') {
                    Some((path, query)) => (path, query),
                    None => (path, ""),
                };
                if query.split('&').any(|param| param == "mode=memory") {
                    return Err(Error::Unsupported(
                        "in-memory SQLite databases have no lifecycle".to_string(),
                    ));
                }
                Self::sqlite_file(path)
            }
        }
    }

    /// Handle for a Postgres database named by the URL path.
    pub fn postgres(url: &str) -> Result<Self> {
        let parts = redact_connection_string(url);
        let database = parts.database.ok_or_else(|| {
            Error::InvalidHandle(format!(
                "connection string names no database: {}",
                parts.redacted
            ))
        })?;
        Ok(Self {
            engine: EngineKind::Postgres,
            connection: url.to_string(),
            database,
        })
    }

    /// Handle for a SQLite database stored in `path`.
    pub fn sqlite_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = path.to_str().ok_or_else(|| {
            Error::InvalidHandle(format!("database path is not UTF-8: {}", path.display()))
        })?;
        if text.is_empty() || text == ":memory:" {
            return Err(Error::Unsupported(
                "in-memory SQLite databases have no lifecycle".to_string(),
            ));
        }
        Ok(Self {
            engine: EngineKind::Sqlite,
            connection: text.to_string(),
            database: text.to_string(),
        })
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Raw connection string or path, credentials included.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Database name (Postgres) or file path (SQLite).
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Database file for file-backed engines.
    pub fn file_path(&self) -> Option<PathBuf> {
        match self.engine {
            EngineKind::Sqlite => Some(PathBuf::from(&self.connection)),
            EngineKind::Postgres => None,
        }
    }

    /// Same server or directory, different database.
    pub fn with_database(&self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidHandle("database name is empty".to_string()));
        }
        match self.engine {
            EngineKind::Postgres => {
                let (scheme, rest) = self.connection.split_once("://").ok_or_else(|| {
                    Error::InvalidHandle("connection string has no scheme".to_string())
                })?;
                let (location, query) = match rest.split_once('?') {
                    Some((location, query)) => (location, Some(query)),
                    None => (rest, None),
                };
                let authority = location.split('/').next().unwrap_or(location);
                let mut url = format!("{scheme}://{authority}/{name}");
                if let Some(query) = query {
                    url.push('?');
                    url.push_str(query);
                }
                Self::postgres(&url)
            }
            EngineKind::Sqlite => {
                let path = Path::new(&self.connection).with_file_name(name);
                Self::sqlite_file(path)
            }
        }
    }

    /// A uniquely named sibling database, for throwaway test stores.
    pub fn scratch(&self, prefix: &str) -> Result<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        match self.engine {
            EngineKind::Postgres => {
                let keep = MAX_IDENTIFIER_LEN - suffix.len() - 1;
                let prefix: String = prefix.chars().take(keep).collect();
                self.with_database(&format!("{prefix}_{suffix}"))
            }
            EngineKind::Sqlite => self.with_database(&format!("{prefix}_{suffix}.db")),
        }
    }
}

impl fmt::Display for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.engine,
            redact_connection_string(&self.connection).redacted
        )
    }
}
