use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use dbforge_core::{
    CatalogSnapshot, ConnectionState, DatabaseHandle, Error, ExistenceState, Result,
    SchemaSource,
};
use dbforge_engine::Engine;

use crate::config::LifecycleConfig;
use crate::guard::ConnectionGuard;

/// Creates, probes and deletes one database and its schema.
///
/// The handle starts in an unknown state (`last_observed() == None`) and is
/// reusable across any number of create/delete cycles. Operations on one
/// manager run strictly one step at a time; racing managers on the same
/// database are left to the engine's own locking.
pub struct DatabaseLifecycle {
    engine: Box<dyn Engine>,
    schema_source: Box<dyn SchemaSource>,
    observed: Mutex<Option<ExistenceState>>,
}

impl DatabaseLifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            engine: config.engine,
            schema_source: config.schema_source,
            observed: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> &DatabaseHandle {
        self.engine.handle()
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.engine.connection_state()
    }

    /// State recorded by the last successful operation; `None` until the
    /// first probe.
    pub fn last_observed(&self) -> Option<ExistenceState> {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocking form of [`DatabaseLifecycle::exists_async`].
    pub fn exists(&self) -> Result<bool> {
        block_on(self.exists_async(&CancellationToken::new()))
    }

    /// Blocking form of [`DatabaseLifecycle::state_async`].
    pub fn state(&self) -> Result<ExistenceState> {
        block_on(self.state_async(&CancellationToken::new()))
    }

    /// Blocking form of [`DatabaseLifecycle::ensure_created_async`].
    pub fn ensure_created(&self) -> Result<bool> {
        block_on(self.ensure_created_async(&CancellationToken::new()))
    }

    /// Blocking form of [`DatabaseLifecycle::ensure_deleted_async`].
    pub fn ensure_deleted(&self) -> Result<bool> {
        block_on(self.ensure_deleted_async(&CancellationToken::new()))
    }

    /// Blocking form of [`DatabaseLifecycle::catalog_async`].
    pub fn catalog(&self) -> Result<CatalogSnapshot> {
        block_on(self.catalog_async(&CancellationToken::new()))
    }

    /// Does the physical database exist?
    ///
    /// Absence is `Ok(false)`; an unreachable server is
    /// `Err(Error::ConnectivityFailure)`.
    pub async fn exists_async(&self, cancel: &CancellationToken) -> Result<bool> {
        self.run("exists", cancel, self.probe_existence()).await
    }

    /// Resolve the database to one of the three existence states.
    pub async fn state_async(&self, cancel: &CancellationToken) -> Result<ExistenceState> {
        self.run("state", cancel, self.probe_state()).await
    }

    /// Create the database and its schema when missing.
    ///
    /// Returns true when the database or its tables were created, false when
    /// both were already in place.
    pub async fn ensure_created_async(&self, cancel: &CancellationToken) -> Result<bool> {
        self.run("ensure_created", cancel, self.create_missing()).await
    }

    /// Drop the database, disconnecting other sessions first.
    ///
    /// Returns false when there was nothing to drop.
    pub async fn ensure_deleted_async(&self, cancel: &CancellationToken) -> Result<bool> {
        self.run("ensure_deleted", cancel, self.delete_existing()).await
    }

    /// Catalog snapshot of the existing database.
    pub async fn catalog_async(&self, cancel: &CancellationToken) -> Result<CatalogSnapshot> {
        self.run("catalog", cancel, self.snapshot()).await
    }

    /// Run one operation, closing the engine's connections on every exit path.
    async fn run<T>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let guard = ConnectionGuard::new(self.engine.as_ref());
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::OperationCanceled),
            result = work => result,
        };
        guard.close().await;

        match &outcome {
            Ok(_) => {
                tracing::debug!(event = "operation_finished", operation, database = %self.handle());
            }
            Err(Error::OperationCanceled) => {
                tracing::warn!(event = "operation_canceled", operation, database = %self.handle());
            }
            Err(err) => {
                tracing::warn!(
                    event = "operation_failed",
                    operation,
                    database = %self.handle(),
                    error = %err
                );
            }
        }
        outcome
    }

    /// Catalog-level probe only; the database itself is never opened.
    async fn probe_existence(&self) -> Result<bool> {
        let exists = self.engine.database_exists().await?;
        tracing::debug!(event = "exists_probed", database = %self.handle(), exists);
        if !exists {
            self.observe(Some(ExistenceState::NotExists));
        } else if self.last_observed() == Some(ExistenceState::NotExists) {
            self.observe(None);
        }
        Ok(exists)
    }

    async fn probe_state(&self) -> Result<ExistenceState> {
        let state = if !self.engine.database_exists().await? {
            ExistenceState::NotExists
        } else if self.engine.has_tables().await? {
            ExistenceState::ExistsWithSchema
        } else {
            ExistenceState::ExistsNoSchema
        };
        tracing::debug!(event = "existence_probed", database = %self.handle(), state = %state);
        self.observe(Some(state));
        Ok(state)
    }

    async fn create_missing(&self) -> Result<bool> {
        let definition = self.schema_source.definition()?;

        let mut created_database = false;
        if !self.engine.database_exists().await? {
            self.engine.create_database().await?;
            created_database = true;
            tracing::info!(event = "database_created", database = %self.handle());
        }

        if self.engine.has_tables().await? {
            self.observe(Some(ExistenceState::ExistsWithSchema));
            let catalog = self.engine.catalog().await?;
            let missing = catalog.missing_objects(&definition);
            if !missing.is_empty() {
                return Err(Error::SchemaConflict(format!(
                    "existing tables do not match the schema definition; missing {}",
                    missing.join(", ")
                )));
            }
            tracing::debug!(event = "schema_present", database = %self.handle());
            return Ok(created_database);
        }

        if definition.is_empty() {
            self.observe(Some(ExistenceState::ExistsNoSchema));
            return Ok(created_database);
        }

        if let Err(err) = self.engine.create_schema(&definition).await {
            if created_database {
                self.roll_back_creation().await;
            } else {
                self.observe(Some(ExistenceState::ExistsNoSchema));
            }
            return Err(err);
        }

        tracing::info!(
            event = "schema_created",
            database = %self.handle(),
            tables = definition.tables.len()
        );
        self.observe(Some(ExistenceState::ExistsWithSchema));
        Ok(true)
    }

    /// Drop a database this operation created before its schema failed.
    async fn roll_back_creation(&self) {
        self.engine.close().await;
        match self.engine.drop_database().await {
            Ok(()) => {
                tracing::warn!(event = "database_creation_rolled_back", database = %self.handle());
                self.observe(Some(ExistenceState::NotExists));
            }
            Err(err) => {
                tracing::error!(
                    event = "database_rollback_failed",
                    database = %self.handle(),
                    error = %err
                );
                self.observe(None);
            }
        }
    }

    async fn delete_existing(&self) -> Result<bool> {
        if !self.engine.database_exists().await? {
            tracing::debug!(event = "database_absent", database = %self.handle());
            self.observe(Some(ExistenceState::NotExists));
            return Ok(false);
        }

        let terminated = self.engine.terminate_other_sessions().await?;
        if terminated > 0 {
            tracing::info!(event = "sessions_terminated", database = %self.handle(), count = terminated);
        }
        self.engine.drop_database().await?;

        tracing::info!(event = "database_dropped", database = %self.handle());
        self.observe(Some(ExistenceState::NotExists));
        Ok(true)
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        if !self.engine.database_exists().await? {
            self.observe(Some(ExistenceState::NotExists));
            return Err(Error::NotFound(format!("database {}", self.handle())));
        }
        let catalog = self.engine.catalog().await?;
        self.observe(Some(if catalog.tables.is_empty() {
            ExistenceState::ExistsNoSchema
        } else {
            ExistenceState::ExistsWithSchema
        }));
        Ok(catalog)
    }

    fn observe(&self, state: Option<ExistenceState>) {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Drive `future` to completion on a private current-thread runtime.
///
/// A thread that already belongs to a tokio runtime cannot start another one,
/// so there the runtime runs on a scoped thread that is joined before
/// returning.
fn block_on<T, F>(future: F) -> Result<T>
where
    T: Send,
    F: Future<Output = Result<T>> + Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return run_to_completion(future);
    }
    std::thread::scope(|scope| {
        scope
            .spawn(move || run_to_completion(future))
            .join()
            .map_err(|_| Error::Runtime("blocking lifecycle worker panicked".to_string()))?
    })
}

fn run_to_completion<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::Runtime(err.to_string()))?;
    runtime.block_on(future)
}
