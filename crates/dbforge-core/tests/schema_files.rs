use dbforge_core::{
    Error, LogicalType, SchemaDefinition, SchemaFile, SchemaSource, ValueGeneration,
};
use schemars::schema_for;
use std::fs;

const BLOGS_TOML: &str = r#"
[[tables]]
name = "Blogs"

[[tables.columns]]
name = "Key1"
logical_type = "string"
key = true

[[tables.columns]]
name = "Key2"
logical_type = "binary"
key = true

[[tables.columns]]
name = "AndRow"
logical_type = "binary"
concurrency_token = true
value_generation = "on_add_or_update"
"#;

#[test]
fn loads_and_validates_toml_schema_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("blogs.toml");
    fs::write(&path, BLOGS_TOML).expect("write schema");

    let definition = SchemaFile::new(&path).definition().expect("load schema");
    let blogs = definition.table("Blogs").expect("Blogs table");
    assert_eq!(blogs.key_columns().count(), 2);

    let row_version = blogs.row_version().expect("row version column");
    assert_eq!(row_version.name, "AndRow");
    assert_eq!(row_version.logical_type, LogicalType::Binary);
    assert_eq!(row_version.value_generation, ValueGeneration::OnAddOrUpdate);
}

#[test]
fn json_and_toml_forms_agree() {
    let from_toml = SchemaDefinition::from_toml_str(BLOGS_TOML).expect("toml");
    let json = serde_json::to_string(&from_toml).expect("serialize");
    let from_json = SchemaDefinition::from_json_str(&json).expect("json");
    assert_eq!(from_toml, from_json);
}

#[test]
fn schema_file_rejects_invalid_definition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dup.json");
    fs::write(
        &path,
        r#"{"tables":[
            {"name":"T","columns":[{"name":"a","logical_type":"int32"}]},
            {"name":"T","columns":[{"name":"a","logical_type":"int32"}]}
        ]}"#,
    )
    .expect("write schema");

    let err = SchemaFile::new(&path).definition().unwrap_err();
    assert!(matches!(err, Error::InvalidSchema(_)));
}

#[test]
fn schema_file_rejects_unknown_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("blogs.yaml");
    fs::write(&path, BLOGS_TOML).expect("write schema");
    assert!(matches!(
        SchemaFile::new(&path).definition(),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn json_schema_describes_tables() {
    let generated = schema_for!(SchemaDefinition);
    let value = serde_json::to_value(&generated).expect("serialize json schema");
    assert!(value["properties"]["tables"].is_object());
    assert!(value["definitions"]["LogicalType"].is_object());
}
