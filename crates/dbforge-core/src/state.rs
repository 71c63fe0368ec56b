use std::fmt;

use serde::{Deserialize, Serialize};

/// Observed existence of a database and its schema.
///
/// Never persisted; recomputed from the engine catalog on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceState {
    NotExists,
    ExistsNoSchema,
    ExistsWithSchema,
}

impl ExistenceState {
    pub fn exists(self) -> bool {
        !matches!(self, ExistenceState::NotExists)
    }

    pub fn has_schema(self) -> bool {
        matches!(self, ExistenceState::ExistsWithSchema)
    }
}

impl fmt::Display for ExistenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExistenceState::NotExists => "not_exists",
            ExistenceState::ExistsNoSchema => "exists_no_schema",
            ExistenceState::ExistsWithSchema => "exists_with_schema",
        };
        f.write_str(label)
    }
}

/// State of the physical connection held for a database handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}
