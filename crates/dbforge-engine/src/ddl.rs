//! DDL generation for schema definitions.
//!
//! Identifiers are always quoted so mixed-case names such as `Blogs` survive
//! on engines that fold unquoted identifiers.

use dbforge_core::{
    ColumnDefinition, Error, LogicalType, Result, SchemaDefinition, TableDefinition,
    ValueGeneration,
};

/// Engine-specific pieces of table DDL.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Native type used in `CREATE TABLE`.
    fn column_type(&self, column: &ColumnDefinition) -> &'static str;

    /// Default or identity clause for engine-generated values.
    fn generation_clause(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Result<Option<String>>;

    /// Statements that keep a row-version column changing on every update.
    fn row_version_statements(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Vec<String>;
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE` statement for one table, primary key included.
pub fn create_table_statement(dialect: &dyn Dialect, table: &TableDefinition) -> Result<String> {
    let mut lines = Vec::with_capacity(table.columns.len() + 1);

    for column in &table.columns {
        let mut line = format!(
            "    {} {}",
            quote_ident(&column.name),
            dialect.column_type(column)
        );
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(clause) = dialect.generation_clause(table, column)? {
            line.push(' ');
            line.push_str(&clause);
        }
        lines.push(line);
    }

    let keys: Vec<String> = table
        .key_columns()
        .map(|column| quote_ident(&column.name))
        .collect();
    if !keys.is_empty() {
        lines.push(format!(
            "    CONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(&format!("PK_{}", table.name)),
            keys.join(", ")
        ));
    }

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        quote_ident(&table.name),
        lines.join(",\n")
    ))
}

/// Every statement needed to materialize `definition`, in execution order.
pub fn schema_statements(dialect: &dyn Dialect, definition: &SchemaDefinition) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    for table in &definition.tables {
        statements.push(create_table_statement(dialect, table)?);
        if let Some(column) = table.row_version() {
            statements.extend(dialect.row_version_statements(table, column));
        }
    }
    Ok(statements)
}

fn unsupported_generation(dialect: &str, table: &TableDefinition, column: &ColumnDefinition) -> Error {
    Error::Unsupported(format!(
        "{dialect} cannot generate values on add for {}.{} ({:?})",
        table.name, column.name, column.logical_type
    ))
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_type(&self, column: &ColumnDefinition) -> &'static str {
        if column.is_row_version() {
            return "bigint";
        }
        match column.logical_type {
            LogicalType::String => "text",
            LogicalType::Binary => "bytea",
            LogicalType::Bool => "boolean",
            LogicalType::Byte | LogicalType::Int16 => "smallint",
            LogicalType::Int32 => "integer",
            LogicalType::Int64 => "bigint",
            LogicalType::Float32 => "real",
            LogicalType::Float64 => "double precision",
            LogicalType::Char => "character(1)",
            LogicalType::Guid => "uuid",
            LogicalType::DateTime => "timestamp without time zone",
        }
    }

    fn generation_clause(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Result<Option<String>> {
        if column.is_row_version() {
            return Ok(Some("DEFAULT 1".to_string()));
        }
        if column.value_generation != ValueGeneration::OnAdd {
            return Ok(None);
        }
        match column.logical_type {
            ty if ty.is_integer() => Ok(Some("GENERATED BY DEFAULT AS IDENTITY".to_string())),
            LogicalType::Guid => Ok(Some("DEFAULT gen_random_uuid()".to_string())),
            LogicalType::DateTime => Ok(Some("DEFAULT LOCALTIMESTAMP".to_string())),
            _ => Err(unsupported_generation(self.name(), table, column)),
        }
    }

    fn row_version_statements(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Vec<String> {
        let function = quote_ident(&format!("{}_{}_row_version", table.name, column.name));
        let trigger = quote_ident(&format!("{}_{}_bump", table.name, column.name));
        let column = quote_ident(&column.name);
        vec![
            format!(
                "CREATE FUNCTION {function}() RETURNS trigger LANGUAGE plpgsql AS $$\n\
                 BEGIN\n    NEW.{column} := OLD.{column} + 1;\n    RETURN NEW;\nEND;\n$$"
            ),
            format!(
                "CREATE TRIGGER {trigger} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE FUNCTION {function}()",
                quote_ident(&table.name)
            ),
        ]
    }
}

/// SQLite dialect, using the type affinities SQLite reports back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, column: &ColumnDefinition) -> &'static str {
        if column.is_row_version() {
            return "INTEGER";
        }
        match column.logical_type {
            LogicalType::String | LogicalType::Char | LogicalType::Guid | LogicalType::DateTime => {
                "TEXT"
            }
            LogicalType::Binary => "BLOB",
            LogicalType::Bool
            | LogicalType::Byte
            | LogicalType::Int16
            | LogicalType::Int32
            | LogicalType::Int64 => "INTEGER",
            LogicalType::Float32 | LogicalType::Float64 => "REAL",
        }
    }

    fn generation_clause(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Result<Option<String>> {
        if column.is_row_version() {
            return Ok(Some("DEFAULT 1".to_string()));
        }
        if column.value_generation != ValueGeneration::OnAdd {
            return Ok(None);
        }
        match column.logical_type {
            // A lone INTEGER primary key aliases the rowid and is assigned on insert.
            ty if ty.is_integer() && column.key && table.key_columns().count() == 1 => Ok(None),
            LogicalType::DateTime => Ok(Some("DEFAULT CURRENT_TIMESTAMP".to_string())),
            _ => Err(unsupported_generation(self.name(), table, column)),
        }
    }

    fn row_version_statements(
        &self,
        table: &TableDefinition,
        column: &ColumnDefinition,
    ) -> Vec<String> {
        let trigger = quote_ident(&format!("{}_{}_bump", table.name, column.name));
        let table = quote_ident(&table.name);
        let column = quote_ident(&column.name);
        vec![format!(
            "CREATE TRIGGER {trigger} AFTER UPDATE ON {table} FOR EACH ROW \
             WHEN NEW.{column} = OLD.{column}\n\
             BEGIN\n    UPDATE {table} SET {column} = OLD.{column} + 1 WHERE rowid = NEW.rowid;\nEND"
        )]
    }
}
