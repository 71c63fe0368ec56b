use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dbforge_core::{
    CatalogColumn, CatalogSnapshot, CatalogTable, ColumnDefinition, ConnectionState,
    DatabaseHandle, Error, ExistenceState, LogicalType, Result, SchemaDefinition,
    TableDefinition,
};
use dbforge_engine::Engine;

use crate::{DatabaseLifecycle, LifecycleConfig};

/// In-process engine whose behavior is set up per test.
#[derive(Default)]
struct Script {
    exists: bool,
    tables: Vec<CatalogTable>,
    open: bool,
    unreachable: bool,
    fail_schema: bool,
    hang_on_tables: bool,
    calls: Vec<&'static str>,
}

struct ScriptedEngine {
    handle: DatabaseHandle,
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    /// Record the call and open the connection, failing when unreachable.
    fn connect(&self, call: &'static str) -> Result<()> {
        self.with(|script| {
            script.calls.push(call);
            if script.unreachable {
                return Err(Error::ConnectivityFailure("connection refused".to_string()));
            }
            script.open = true;
            Ok(())
        })
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn engine(&self) -> &'static str {
        "scripted"
    }

    fn handle(&self) -> &DatabaseHandle {
        &self.handle
    }

    fn connection_state(&self) -> ConnectionState {
        if self.with(|script| script.open) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    async fn close(&self) {
        self.with(|script| script.open = false);
    }

    fn release(&self) {
        self.with(|script| {
            script.calls.push("release");
            script.open = false;
        });
    }

    async fn database_exists(&self) -> Result<bool> {
        self.connect("database_exists")?;
        Ok(self.with(|script| script.exists))
    }

    async fn create_database(&self) -> Result<()> {
        self.connect("create_database")?;
        self.with(|script| script.exists = true);
        Ok(())
    }

    async fn has_tables(&self) -> Result<bool> {
        self.connect("has_tables")?;
        if self.with(|script| script.hang_on_tables) {
            std::future::pending::<()>().await;
        }
        Ok(self.with(|script| !script.tables.is_empty()))
    }

    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<()> {
        self.connect("create_schema")?;
        self.with(|script| {
            if script.fail_schema {
                return Err(Error::Db("relation already exists".to_string()));
            }
            script.tables = definition
                .tables
                .iter()
                .map(|table| CatalogTable {
                    name: table.name.clone(),
                    columns: table
                        .columns
                        .iter()
                        .map(|column| CatalogColumn {
                            name: column.name.clone(),
                            data_type: "scripted".to_string(),
                            is_nullable: column.nullable,
                        })
                        .collect(),
                })
                .collect();
            Ok(())
        })
    }

    async fn terminate_other_sessions(&self) -> Result<u64> {
        self.connect("terminate_other_sessions")?;
        Ok(2)
    }

    async fn drop_database(&self) -> Result<()> {
        self.connect("drop_database")?;
        self.with(|script| {
            script.exists = false;
            script.tables.clear();
        });
        Ok(())
    }

    async fn catalog(&self) -> Result<CatalogSnapshot> {
        self.connect("catalog")?;
        let mut snapshot = CatalogSnapshot::new("scripted", self.handle.database());
        snapshot.tables = self.with(|script| script.tables.clone());
        Ok(snapshot)
    }
}

fn posts() -> SchemaDefinition {
    SchemaDefinition::new().with_table(
        TableDefinition::new("Posts")
            .with_column(ColumnDefinition::new("Id", LogicalType::Int32).key())
            .with_column(ColumnDefinition::new("Title", LogicalType::String).nullable())
            .with_column(ColumnDefinition::new("Version", LogicalType::Int64).row_version()),
    )
}

fn lifecycle(
    definition: SchemaDefinition,
    setup: impl FnOnce(&mut Script),
) -> (DatabaseLifecycle, Arc<Mutex<Script>>) {
    let mut script = Script::default();
    setup(&mut script);
    let script = Arc::new(Mutex::new(script));
    let engine = ScriptedEngine {
        handle: DatabaseHandle::sqlite_file("/tmp/scripted.db").unwrap(),
        script: Arc::clone(&script),
    };
    let manager = DatabaseLifecycle::new(LifecycleConfig::new(
        Box::new(engine),
        Box::new(definition),
    ));
    (manager, script)
}

fn calls(script: &Arc<Mutex<Script>>) -> Vec<&'static str> {
    script.lock().unwrap().calls.clone()
}

#[tokio::test]
async fn ensure_created_creates_database_and_schema_once() {
    let (manager, script) = lifecycle(posts(), |_| {});
    let cancel = CancellationToken::new();
    assert_eq!(manager.last_observed(), None);

    assert!(!manager.exists_async(&cancel).await.unwrap());
    assert_eq!(manager.last_observed(), Some(ExistenceState::NotExists));

    assert!(manager.ensure_created_async(&cancel).await.unwrap());
    assert_eq!(manager.last_observed(), Some(ExistenceState::ExistsWithSchema));
    assert_eq!(manager.connection_state(), ConnectionState::Closed);

    assert!(!manager.ensure_created_async(&cancel).await.unwrap());
    let schema_calls = calls(&script)
        .into_iter()
        .filter(|call| *call == "create_schema")
        .count();
    assert_eq!(schema_calls, 1);
    assert!(manager.exists_async(&cancel).await.unwrap());
}

#[tokio::test]
async fn ensure_created_fills_an_empty_existing_database() {
    let (manager, script) = lifecycle(posts(), |script| script.exists = true);
    let cancel = CancellationToken::new();

    assert_eq!(
        manager.state_async(&cancel).await.unwrap(),
        ExistenceState::ExistsNoSchema
    );
    assert!(manager.ensure_created_async(&cancel).await.unwrap());
    assert!(!calls(&script).contains(&"create_database"));
    assert_eq!(
        manager.state_async(&cancel).await.unwrap(),
        ExistenceState::ExistsWithSchema
    );
}

#[tokio::test]
async fn empty_definition_only_creates_the_database() {
    let (manager, script) = lifecycle(SchemaDefinition::new(), |_| {});
    let cancel = CancellationToken::new();

    assert!(manager.ensure_created_async(&cancel).await.unwrap());
    assert!(!manager.ensure_created_async(&cancel).await.unwrap());
    assert!(!calls(&script).contains(&"create_schema"));
    assert_eq!(manager.last_observed(), Some(ExistenceState::ExistsNoSchema));
}

#[tokio::test]
async fn unrelated_tables_are_a_schema_conflict() {
    let (manager, _script) = lifecycle(posts(), |script| {
        script.exists = true;
        script.tables = vec![CatalogTable {
            name: "Legacy".to_string(),
            columns: vec![CatalogColumn {
                name: "Id".to_string(),
                data_type: "scripted".to_string(),
                is_nullable: false,
            }],
        }];
    });

    let err = manager
        .ensure_created_async(&CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::SchemaConflict(message) => assert!(message.contains("Posts")),
        other => panic!("expected schema conflict, got {other:?}"),
    }
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn invalid_definition_is_rejected_before_touching_the_database() {
    let definition = SchemaDefinition::new()
        .with_table(TableDefinition::new("Posts").with_column(ColumnDefinition::new(
            "Id",
            LogicalType::Int32,
        )))
        .with_table(TableDefinition::new("Posts").with_column(ColumnDefinition::new(
            "Id",
            LogicalType::Int32,
        )));
    let (manager, script) = lifecycle(definition, |_| {});

    let err = manager
        .ensure_created_async(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSchema(_)));
    assert!(!calls(&script).contains(&"create_database"));
}

#[tokio::test]
async fn ensure_deleted_is_idempotent() {
    let (manager, script) = lifecycle(posts(), |_| {});
    let cancel = CancellationToken::new();

    assert!(!manager.ensure_deleted_async(&cancel).await.unwrap());
    assert!(manager.ensure_created_async(&cancel).await.unwrap());
    assert!(manager.ensure_deleted_async(&cancel).await.unwrap());
    assert!(!manager.ensure_deleted_async(&cancel).await.unwrap());

    let calls = calls(&script);
    let terminate = calls
        .iter()
        .position(|call| *call == "terminate_other_sessions")
        .unwrap();
    let drop = calls.iter().position(|call| *call == "drop_database").unwrap();
    assert!(terminate < drop);
    assert_eq!(manager.last_observed(), Some(ExistenceState::NotExists));
}

#[tokio::test]
async fn create_delete_cycles_repeat() {
    let (manager, _script) = lifecycle(posts(), |_| {});
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        assert!(manager.ensure_created_async(&cancel).await.unwrap());
        assert!(manager.ensure_deleted_async(&cancel).await.unwrap());
    }
    assert!(!manager.exists_async(&cancel).await.unwrap());
}

#[tokio::test]
async fn unreachable_server_is_an_error_not_absence() {
    let (manager, _script) = lifecycle(posts(), |script| script.unreachable = true);

    let err = manager
        .exists_async(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
    assert_eq!(manager.last_observed(), None);
}

#[tokio::test]
async fn failed_schema_rolls_back_a_database_it_created() {
    let (manager, script) = lifecycle(posts(), |script| script.fail_schema = true);
    let cancel = CancellationToken::new();

    let err = manager.ensure_created_async(&cancel).await.unwrap_err();
    assert!(matches!(err, Error::Db(_)));
    assert!(calls(&script).contains(&"drop_database"));
    assert_eq!(manager.last_observed(), Some(ExistenceState::NotExists));
    assert!(!manager.exists_async(&cancel).await.unwrap());
}

#[tokio::test]
async fn failed_schema_keeps_a_database_it_did_not_create() {
    let (manager, script) = lifecycle(posts(), |script| {
        script.exists = true;
        script.fail_schema = true;
    });
    let cancel = CancellationToken::new();

    assert!(manager.ensure_created_async(&cancel).await.is_err());
    assert!(!calls(&script).contains(&"drop_database"));
    assert!(manager.exists_async(&cancel).await.unwrap());
}

#[tokio::test]
async fn cancellation_closes_the_connection() {
    let (manager, _script) = lifecycle(posts(), |script| script.hang_on_tables = true);
    let cancel = CancellationToken::new();
    let trigger = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        }
    };

    let (result, ()) = tokio::join!(manager.ensure_created_async(&cancel), trigger);
    assert!(matches!(result, Err(Error::OperationCanceled)));
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn cancelled_token_skips_the_operation() {
    let (manager, script) = lifecycle(posts(), |_| {});
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = manager.ensure_deleted_async(&cancel).await;
    assert!(matches!(result, Err(Error::OperationCanceled)));
    assert!(calls(&script).is_empty());
}

#[tokio::test]
async fn dropped_future_releases_the_connection() {
    let (manager, script) = lifecycle(posts(), |script| {
        script.exists = true;
        script.hang_on_tables = true;
    });
    let cancel = CancellationToken::new();

    let outcome = tokio::time::timeout(Duration::from_millis(20), manager.state_async(&cancel)).await;
    assert!(outcome.is_err());
    assert!(calls(&script).contains(&"release"));
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn catalog_of_absent_database_is_not_found() {
    let (manager, script) = lifecycle(posts(), |_| {});

    let err = manager
        .catalog_async(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!calls(&script).contains(&"create_database"));
}

#[test]
fn blocking_forms_drive_the_same_operations() {
    let (manager, _script) = lifecycle(posts(), |_| {});

    assert!(!manager.exists().unwrap());
    assert!(manager.ensure_created().unwrap());
    assert_eq!(manager.state().unwrap(), ExistenceState::ExistsWithSchema);
    let catalog = manager.catalog().unwrap();
    assert_eq!(catalog.table_names(), vec!["Posts"]);
    assert!(manager.ensure_deleted().unwrap());
    assert!(!manager.exists().unwrap());
}

#[tokio::test]
async fn blocking_form_runs_inside_a_runtime() {
    let (manager, script) = lifecycle(posts(), |_| {});

    assert!(!manager.exists().unwrap());
    assert!(manager.ensure_created().unwrap());
    assert!(calls(&script).contains(&"create_schema"));
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_form_runs_on_spawn_blocking_threads() {
    let (manager, _script) = lifecycle(posts(), |_| {});
    let manager = Arc::new(manager);

    let worker = Arc::clone(&manager);
    let created = tokio::task::spawn_blocking(move || worker.ensure_created())
        .await
        .unwrap()
        .unwrap();
    assert!(created);
    assert!(manager.exists_async(&CancellationToken::new()).await.unwrap());
}

#[tokio::test]
async fn exists_does_not_open_the_database() {
    let (manager, script) = lifecycle(posts(), |script| {
        script.exists = true;
        script.hang_on_tables = true;
    });

    assert!(manager.exists_async(&CancellationToken::new()).await.unwrap());
    assert_eq!(calls(&script), vec!["database_exists"]);
    assert_eq!(manager.last_observed(), None);
}
