//! Engine capabilities used by the lifecycle manager.
//!
//! Each supported database engine implements [`Engine`]: catalog probes,
//! database creation and removal, schema application and catalog snapshots.
//! Engines own their connection slots and report whether any is open.

pub mod connection;
pub mod ddl;
pub mod engine;
pub mod postgres;
pub mod sqlite;

pub use connection::ConnectionSlot;
pub use ddl::{Dialect, PostgresDialect, SqliteDialect, quote_ident, schema_statements};
pub use engine::{Engine, EngineOptions, build_engine};
pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;
