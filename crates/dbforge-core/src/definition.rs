use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine-independent column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Binary,
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    Guid,
    DateTime,
}

impl LogicalType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            LogicalType::Byte | LogicalType::Int16 | LogicalType::Int32 | LogicalType::Int64
        )
    }
}

/// When the engine, rather than the caller, supplies a column value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueGeneration {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

/// Column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    pub logical_type: LogicalType,
    #[serde(default)]
    pub nullable: bool,
    /// Member of the table's primary key, in column order.
    #[serde(default)]
    pub key: bool,
    /// Value is compared on update to detect concurrent writes.
    #[serde(default)]
    pub concurrency_token: bool,
    #[serde(default)]
    pub value_generation: ValueGeneration,
}

impl ColumnDefinition {
    /// A required column that the caller always supplies.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: false,
            key: false,
            concurrency_token: false,
            value_generation: ValueGeneration::Never,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn generated_on_add(mut self) -> Self {
        self.value_generation = ValueGeneration::OnAdd;
        self
    }

    /// Concurrency token whose value the engine changes on every write.
    pub fn row_version(mut self) -> Self {
        self.concurrency_token = true;
        self.value_generation = ValueGeneration::OnAddOrUpdate;
        self
    }

    pub fn is_row_version(&self) -> bool {
        self.concurrency_token && self.value_generation == ValueGeneration::OnAddOrUpdate
    }
}

/// Table of a schema definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|column| column.key)
    }

    pub fn row_version(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.is_row_version())
    }
}

/// Logical model materialized by `ensure_created`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| Error::InvalidSchema(err.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|err| Error::InvalidSchema(err.to_string()))
    }

    /// Read a definition from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(Error::Unsupported(format!(
                "schema file must be .toml or .json: {}",
                path.display()
            ))),
        }
    }
}
