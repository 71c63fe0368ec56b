use std::collections::BTreeSet;

use crate::definition::{SchemaDefinition, ValueGeneration};
use crate::error::{Error, Result};

/// Validate internal consistency of a schema definition.
///
/// This checks:
/// - duplicate tables/columns
/// - empty tables
/// - nullable key columns
/// - engine-generated update values outside a single row-version column
pub fn validate_definition(definition: &SchemaDefinition) -> Result<()> {
    let mut tables = BTreeSet::new();

    for table in &definition.tables {
        if table.name.is_empty() {
            return Err(Error::InvalidSchema("table name is empty".to_string()));
        }
        if !tables.insert(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        if table.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table has no columns: {}",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        let mut row_versions = 0;
        for column in &table.columns {
            if column.name.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "column name is empty in table {}",
                    table.name
                )));
            }
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
            if column.key && column.nullable {
                return Err(Error::InvalidSchema(format!(
                    "key column cannot be nullable: {}.{}",
                    table.name, column.name
                )));
            }
            if column.value_generation == ValueGeneration::OnAddOrUpdate {
                if !column.concurrency_token {
                    return Err(Error::InvalidSchema(format!(
                        "only concurrency tokens can be generated on update: {}.{}",
                        table.name, column.name
                    )));
                }
                row_versions += 1;
            }
        }

        if row_versions > 1 {
            return Err(Error::InvalidSchema(format!(
                "more than one row version column in table {}",
                table.name
            )));
        }
    }

    Ok(())
}
