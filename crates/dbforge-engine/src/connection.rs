use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sqlx::pool::PoolOptions;
use sqlx::{Connection, Database, Pool};

use dbforge_core::ConnectionState;

type ConnectOptionsOf<DB> = <<DB as Database>::Connection as Connection>::Options;

/// A single physical connection to one database, opened on demand.
///
/// The slot holds at most one pool of size one. The lock is only taken to
/// swap the pool in or out and is never held across an await point.
pub struct ConnectionSlot<DB: Database> {
    label: &'static str,
    options: ConnectOptionsOf<DB>,
    acquire_timeout: Duration,
    pool: Mutex<Option<Pool<DB>>>,
}

impl<DB: Database> ConnectionSlot<DB> {
    pub fn new(label: &'static str, options: ConnectOptionsOf<DB>, acquire_timeout: Duration) -> Self {
        Self {
            label,
            options,
            acquire_timeout,
            pool: Mutex::new(None),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn state(&self) -> ConnectionState {
        if self.lock().is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Return the open pool, connecting first when the slot is closed.
    pub async fn open(&self) -> Result<Pool<DB>, sqlx::Error> {
        let existing = self.lock().clone();
        if let Some(pool) = existing {
            return Ok(pool);
        }

        let pool = PoolOptions::<DB>::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.options.clone())
            .await?;
        tracing::debug!(event = "connection_opened", slot = self.label);

        let mut current = self.lock();
        match current.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                *current = Some(pool.clone());
                Ok(pool)
            }
        }
    }

    /// Close the slot, waiting for the connection to shut down.
    pub async fn close(&self) {
        let pool = self.lock().take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::debug!(event = "connection_closed", slot = self.label);
        }
    }

    /// Drop the pool without waiting; used when an operation is abandoned.
    pub fn release(&self) {
        if self.lock().take().is_some() {
            tracing::debug!(event = "connection_released", slot = self.label);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pool<DB>>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
