//! Core contracts for dbforge.
//!
//! This crate defines the database handle, the logical schema definition,
//! catalog snapshots and the error type shared by the engines, the lifecycle
//! manager and the CLI.

pub mod catalog;
pub mod definition;
pub mod error;
pub mod handle;
pub mod redaction;
pub mod source;
pub mod state;
pub mod validation;

pub use catalog::{CatalogColumn, CatalogSnapshot, CatalogTable};
pub use definition::{
    ColumnDefinition, LogicalType, SchemaDefinition, TableDefinition, ValueGeneration,
};
pub use error::{Error, Result};
pub use handle::{DatabaseHandle, EngineKind};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use source::{SchemaFile, SchemaSource};
pub use state::{ConnectionState, ExistenceState};
pub use validation::validate_definition;
