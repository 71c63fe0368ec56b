#![allow(dead_code)]

use dbforge_core::{ColumnDefinition, LogicalType, SchemaDefinition, TableDefinition};

/// One table with a composite key, a row version and one column per
/// remaining logical type.
pub fn blogs() -> SchemaDefinition {
    SchemaDefinition::new().with_table(
        TableDefinition::new("Blogs")
            .with_column(ColumnDefinition::new("Key1", LogicalType::String).key())
            .with_column(ColumnDefinition::new("Key2", LogicalType::Binary).key())
            .with_column(ColumnDefinition::new("Cheese", LogicalType::String).nullable())
            .with_column(ColumnDefinition::new("ErMilan", LogicalType::Int32))
            .with_column(ColumnDefinition::new("George", LogicalType::Bool))
            .with_column(ColumnDefinition::new("TheGu", LogicalType::Guid))
            .with_column(ColumnDefinition::new("NotFigTime", LogicalType::DateTime))
            .with_column(ColumnDefinition::new("ToEat", LogicalType::Byte))
            .with_column(ColumnDefinition::new("OrNothing", LogicalType::Float64))
            .with_column(ColumnDefinition::new("Fuse", LogicalType::Int16))
            .with_column(ColumnDefinition::new("WayRound", LogicalType::Int64))
            .with_column(ColumnDefinition::new("On", LogicalType::Float32))
            .with_column(ColumnDefinition::new("AndChew", LogicalType::Binary).nullable())
            .with_column(ColumnDefinition::new("AndRow", LogicalType::Binary).row_version())
            .with_column(ColumnDefinition::new("CupOfChar", LogicalType::Char)),
    )
}

/// Pair sorted column names with the expected native types.
pub fn expected_columns(types: [&str; 15]) -> Vec<String> {
    const NAMES: [&str; 15] = [
        "AndChew",
        "AndRow",
        "Cheese",
        "CupOfChar",
        "ErMilan",
        "Fuse",
        "George",
        "Key1",
        "Key2",
        "NotFigTime",
        "On",
        "OrNothing",
        "TheGu",
        "ToEat",
        "WayRound",
    ];
    NAMES
        .iter()
        .zip(types)
        .map(|(name, data_type)| format!("Blogs.{name} ({data_type})"))
        .collect()
}
