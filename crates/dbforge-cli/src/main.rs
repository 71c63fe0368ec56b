mod config;
mod logging;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;

use config::{CliConfig, ConfigError, Overrides};
use dbforge_core::{
    DatabaseHandle, Error as CoreError, SchemaDefinition, SchemaFile, SchemaSource,
};
use dbforge_lifecycle::{CancellationToken, DatabaseLifecycle, LifecycleConfig};
use logging::{LogFormat, LoggingError, init_logging};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

#[derive(Parser, Debug)]
#[command(name = "dbforge", version, about = "Create, probe and delete databases and their schema")]
struct Cli {
    /// Config file with named profiles (defaults to ./dbforge.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Format of log events on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    /// Also append JSON log events to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the database exists.
    Exists(TargetArgs),
    /// Report the existence state (absent, empty or with schema).
    Status(TargetArgs),
    /// Create the database and its schema when missing.
    Create(TargetArgs),
    /// Drop the database, disconnecting other sessions.
    Delete(TargetArgs),
    /// Print the tables and columns of the database.
    Catalog(TargetArgs),
    /// Validate a schema file or print the schema file format.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Database connection string or SQLite file (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string or SQLite file (positional form).
    #[arg(value_name = "CONNECTION_STRING")]
    conn_pos: Option<String>,
    /// Profile from the config file.
    #[arg(long)]
    profile: Option<String>,
    /// Schema definition file (TOML or JSON).
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,
    /// Maintenance database used for server catalog queries.
    #[arg(long)]
    maintenance_database: Option<String>,
    /// Cancel the operation after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Print the JSON Schema of schema definition files.
    #[arg(long, default_value_t = false, conflicts_with = "file")]
    json_schema: bool,
    /// Schema definition file to validate.
    #[arg(value_name = "FILE", required_unless_present = "json_schema")]
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Exists,
    Status,
    Create,
    Delete,
    Catalog,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Exists => "exists",
            Operation::Status => "status",
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Catalog => "catalog",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_file.as_deref())?;

    let (operation, args) = match cli.command {
        Command::Schema(args) => return run_schema(args),
        Command::Exists(args) => (Operation::Exists, args),
        Command::Status(args) => (Operation::Status, args),
        Command::Create(args) => (Operation::Create, args),
        Command::Delete(args) => (Operation::Delete, args),
        Command::Catalog(args) => (Operation::Catalog, args),
    };
    let config = CliConfig::load_or_default(cli.config.as_deref())?;
    run_operation(operation, args, &config).await
}

async fn run_operation(
    operation: Operation,
    args: TargetArgs,
    config: &CliConfig,
) -> Result<(), CliError> {
    let TargetArgs {
        conn,
        conn_pos,
        profile,
        schema,
        maintenance_database,
        timeout_secs,
    } = args;

    if timeout_secs == Some(0) {
        return Err(CliError::InvalidArgs(
            "--timeout-secs must be greater than zero".to_string(),
        ));
    }

    let target = config.resolve(Overrides {
        connection: conn.or(conn_pos),
        profile,
        schema,
        maintenance_database,
    })?;

    let handle = DatabaseHandle::parse(&target.connection)?;
    let schema_source: Box<dyn SchemaSource> = match target.schema {
        Some(path) => Box::new(SchemaFile::new(path)),
        None => Box::new(SchemaDefinition::new()),
    };
    let lifecycle = DatabaseLifecycle::new(LifecycleConfig::for_handle(
        handle,
        schema_source,
        &target.options,
    )?);

    let cancel = CancellationToken::new();
    let watcher = watch_for_cancel(cancel.clone(), timeout_secs.map(Duration::from_secs));

    tracing::info!(
        event = "operation_started",
        operation = operation.as_str(),
        database = %lifecycle.handle()
    );
    let timer = Instant::now();
    let outcome = execute(operation, &lifecycle, &cancel).await;
    watcher.abort();

    let output = outcome?;
    tracing::info!(
        event = "operation_finished",
        operation = operation.as_str(),
        duration_ms = timer.elapsed().as_millis()
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(
    operation: Operation,
    lifecycle: &DatabaseLifecycle,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, CliError> {
    let database = lifecycle.handle().to_string();
    let output = match operation {
        Operation::Exists => {
            json!({ "database": database, "exists": lifecycle.exists_async(cancel).await? })
        }
        Operation::Status => {
            json!({ "database": database, "state": lifecycle.state_async(cancel).await? })
        }
        Operation::Create => {
            json!({ "database": database, "created": lifecycle.ensure_created_async(cancel).await? })
        }
        Operation::Delete => {
            json!({ "database": database, "deleted": lifecycle.ensure_deleted_async(cancel).await? })
        }
        Operation::Catalog => serde_json::to_value(lifecycle.catalog_async(cancel).await?)?,
    };
    Ok(output)
}

/// Cancel `token` on Ctrl-C or once `timeout` elapses.
fn watch_for_cancel(token: CancellationToken, timeout: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::warn!(event = "signal_handler_failed", error = %err);
                    return;
                }
                tracing::warn!(event = "interrupt_received");
            }
            () = deadline => {
                tracing::warn!(event = "timeout_elapsed");
            }
        }
        token.cancel();
    })
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    if args.json_schema {
        let schema = schemars::schema_for!(SchemaDefinition);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let path = args
        .file
        .ok_or_else(|| CliError::InvalidArgs("a schema file is required".to_string()))?;
    let definition = SchemaFile::new(&path).definition()?;
    tracing::info!(event = "schema_validated", path = %path.display());

    let tables: Vec<_> = definition
        .tables
        .iter()
        .map(|table| json!({ "name": table.name, "columns": table.columns.len() }))
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "valid": true, "tables": tables }))?
    );
    Ok(())
}
