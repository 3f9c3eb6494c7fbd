//! The Postgres-backed tick persister.
//!
//! Thin adapter from the tick pipeline's [`TickPersister`] boundary onto
//! the `cadre-db` transaction helpers. All atomicity lives in the store;
//! this type only translates errors into the shape the pipeline expects.

use cadre_core::tick::{PersistError, TickPersister};
use cadre_types::TickDelta;
use sqlx::PgPool;

/// Persists tick deltas into Postgres.
#[derive(Debug, Clone)]
pub struct PgPersister {
    pool: PgPool,
}

impl PgPersister {
    /// Create a persister over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TickPersister for PgPersister {
    async fn persist(&self, delta: &TickDelta) -> Result<(), PersistError> {
        cadre_db::persist_tick(&self.pool, delta)
            .await
            .map_err(|e| PersistError::new(e.to_string()))
    }

    async fn reset(&self, full: bool) -> Result<(), PersistError> {
        cadre_db::reset_run(&self.pool, full)
            .await
            .map_err(|e| PersistError::new(e.to_string()))
    }
}
