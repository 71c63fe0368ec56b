use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::definition::SchemaDefinition;

/// Base tables of a database as reported by the engine catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Engine identifier (e.g. `postgres`).
    pub engine: String,
    /// Database name or file path.
    pub database: String,
    pub captured_at: DateTime<Utc>,
    /// Tables sorted by name.
    pub tables: Vec<CatalogTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTable {
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<CatalogColumn>,
}

/// Column as the engine reports it, with its native type name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

impl CatalogSnapshot {
    pub fn new(engine: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            database: database.into(),
            captured_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    /// Tables and columns of `definition` absent from this catalog, as
    /// `Table` or `Table.Column` strings.
    pub fn missing_objects(&self, definition: &SchemaDefinition) -> Vec<String> {
        let mut missing = Vec::new();
        for table in &definition.tables {
            let Some(existing) = self.table(&table.name) else {
                missing.push(table.name.clone());
                continue;
            };
            for column in &table.columns {
                if existing.column(&column.name).is_none() {
                    missing.push(format!("{}.{}", table.name, column.name));
                }
            }
        }
        missing
    }
}

impl CatalogTable {
    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// `Table.Column (type)` strings sorted by column name.
    pub fn describe_columns(&self) -> Vec<String> {
        let mut columns: Vec<&CatalogColumn> = self.columns.iter().collect();
        columns.sort_by(|left, right| left.name.cmp(&right.name));
        columns
            .into_iter()
            .map(|column| format!("{}.{} ({})", self.name, column.name, column.data_type))
            .collect()
    }
}
