use sqlx::SqlitePool;

use dbforge_core::{CatalogColumn, CatalogTable, Result};

use super::map_error;

pub async fn has_user_tables(pool: &SqlitePool) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        select count(*)
        from sqlite_master
        where type = 'table'
          and name not like 'sqlite\_%' escape '\'
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(map_error)?;
    Ok(count > 0)
}

pub async fn list_table_names(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select name
        from sqlite_master
        where type = 'table'
          and name not like 'sqlite\_%' escape '\'
        order by name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(map_error)
}

#[derive(sqlx::FromRow)]
struct RawColumn {
    name: String,
    #[sqlx(rename = "type")]
    data_type: String,
    notnull: i64,
}

pub async fn list_columns(pool: &SqlitePool, table: &str) -> Result<Vec<CatalogColumn>> {
    let rows = sqlx::query_as::<_, RawColumn>(
        r#"select name, type, "notnull" from pragma_table_info(?1) order by cid"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(map_error)?;

    Ok(rows
        .into_iter()
        .map(|row| CatalogColumn {
            name: row.name,
            data_type: row.data_type,
            is_nullable: row.notnull == 0,
        })
        .collect())
}

pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<CatalogTable>> {
    let mut tables = Vec::new();
    for name in list_table_names(pool).await? {
        let columns = list_columns(pool, &name).await?;
        tables.push(CatalogTable { name, columns });
    }
    Ok(tables)
}

/// Run `statements` inside one explicit transaction, rolling back when any
/// of them fails.
pub async fn execute_script(pool: &SqlitePool, statements: &[String]) -> Result<()> {
    let script = format!("BEGIN;\n{};\nCOMMIT;", statements.join(";\n"));
    if let Err(err) = sqlx::raw_sql(&script).execute(pool).await {
        if let Err(rollback) = sqlx::raw_sql("ROLLBACK").execute(pool).await {
            tracing::debug!(event = "schema_rollback_skipped", error = %rollback);
        }
        return Err(map_error(err));
    }
    Ok(())
}
