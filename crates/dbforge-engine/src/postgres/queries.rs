use sqlx::PgPool;

use dbforge_core::{CatalogColumn, CatalogTable, Result};

use super::map_error;

pub async fn database_exists(pool: &PgPool, database: &str) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("select exists(select 1 from pg_database where datname = $1)")
        .bind(database)
        .fetch_one(pool)
        .await
        .map_err(map_error)
}

/// Any base table in the current schema, the same scope `list_tables` reads.
pub async fn has_user_tables(pool: &PgPool) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        select exists(
          select 1
          from information_schema.tables
          where table_type = 'BASE TABLE'
            and table_schema = current_schema()
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(map_error)
}

#[derive(sqlx::FromRow)]
struct RawColumn {
    table_name: String,
    column_name: Option<String>,
    data_type: Option<String>,
    is_nullable: Option<bool>,
}

/// Base tables of the current schema with their columns in ordinal order.
pub async fn list_tables(pool: &PgPool) -> Result<Vec<CatalogTable>> {
    let rows = sqlx::query_as::<_, RawColumn>(
        r#"
        select
          t.table_name::text as table_name,
          c.column_name::text as column_name,
          c.data_type::text as data_type,
          (c.is_nullable = 'YES') as is_nullable
        from information_schema.tables t
        left join information_schema.columns c
          on c.table_schema = t.table_schema and c.table_name = t.table_name
        where t.table_type = 'BASE TABLE'
          and t.table_schema = current_schema()
        order by t.table_name, c.ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(map_error)?;

    let mut tables: Vec<CatalogTable> = Vec::new();
    for row in rows {
        if tables.last().is_none_or(|table| table.name != row.table_name) {
            tables.push(CatalogTable {
                name: row.table_name.clone(),
                columns: Vec::new(),
            });
        }
        if let (Some(table), Some(name), Some(data_type)) =
            (tables.last_mut(), row.column_name, row.data_type)
        {
            table.columns.push(CatalogColumn {
                name,
                data_type,
                is_nullable: row.is_nullable.unwrap_or(true),
            });
        }
    }
    Ok(tables)
}

pub async fn terminate_other_sessions(pool: &PgPool, database: &str) -> Result<u64> {
    let terminated = sqlx::query_scalar::<_, i64>(
        r#"
        select count(pg_terminate_backend(pid))
        from pg_stat_activity
        where datname = $1
          and pid <> pg_backend_pid()
        "#,
    )
    .bind(database)
    .fetch_one(pool)
    .await
    .map_err(map_error)?;
    Ok(u64::try_from(terminated).unwrap_or_default())
}

/// Run DDL through the simple query protocol; `CREATE DATABASE` and
/// dollar-quoted bodies cannot be prepared.
pub async fn execute_ddl(pool: &PgPool, sql: &str) -> Result<()> {
    sqlx::raw_sql(sql).execute(pool).await.map_err(map_error)?;
    Ok(())
}

/// Run `statements` as one multi-statement query. Postgres executes such a
/// query as a single implicit transaction, so either every statement applies
/// or none does.
pub async fn execute_script(pool: &PgPool, statements: &[String]) -> Result<()> {
    let script = statements.join(";\n");
    sqlx::raw_sql(&script).execute(pool).await.map_err(map_error)?;
    Ok(())
}
