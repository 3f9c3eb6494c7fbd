//! Atomic end-of-tick persistence.
//!
//! A completed tick hands its [`TickDelta`] here as one unit: the clock
//! row advances together with every other effect, or nothing is written.
//! Snapshot tables (pending set, inbound queues) are replaced wholesale;
//! the event and dispatch logs are append-only.

use cadre_types::{ClockState, TickDelta};
use sqlx::PgPool;
use tracing::debug;

use crate::comm_store::{insert_dispatched_tx, replace_pending_tx, replace_queues_tx};
use crate::error::DbError;
use crate::event_store::insert_events_tx;
use crate::plan_store::{upsert_plans_tx, upsert_stats_tx};
use crate::project_store::upsert_rooms_tx;
use crate::worker_store::upsert_workers_tx;

/// Apply a whole tick delta in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Postgres`] if any statement fails; the transaction
/// rolls back and the stored tick counter is untouched.
pub async fn persist_tick(pool: &PgPool, delta: &TickDelta) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r"UPDATE sim_clock
          SET current_tick = $1, running = $2, auto_advance = $3, updated_at = now()
          WHERE id = TRUE",
    )
    .bind(i64::try_from(delta.clock.current_tick).unwrap_or(i64::MAX))
    .bind(delta.clock.running)
    .bind(delta.clock.auto_advance)
    .execute(&mut *tx)
    .await?;

    upsert_workers_tx(&mut tx, &delta.workers).await?;
    insert_events_tx(&mut tx, &delta.events).await?;
    upsert_rooms_tx(&mut tx, &delta.rooms).await?;
    upsert_plans_tx(&mut tx, &delta.plans).await?;
    replace_pending_tx(&mut tx, &delta.pending).await?;
    insert_dispatched_tx(&mut tx, &delta.dispatched).await?;
    replace_queues_tx(&mut tx, &delta.queues).await?;
    upsert_stats_tx(&mut tx, &delta.stats).await?;

    tx.commit().await?;

    debug!(
        tick = delta.tick,
        workers = delta.workers.len(),
        events = delta.events.len(),
        plans = delta.plans.len(),
        dispatched = delta.dispatched.len(),
        "Persisted tick delta"
    );
    Ok(())
}

/// Load the stored clock row.
///
/// # Errors
///
/// Returns [`DbError::Postgres`] if the query fails.
pub async fn load_clock(pool: &PgPool) -> Result<ClockState, DbError> {
    let row: (i64, bool, bool) =
        sqlx::query_as("SELECT current_tick, running, auto_advance FROM sim_clock WHERE id = TRUE")
            .fetch_one(pool)
            .await?;
    Ok(ClockState {
        current_tick: u64::try_from(row.0).unwrap_or_default(),
        running: row.1,
        auto_advance: row.2,
    })
}

/// Write the clock row outside the tick path (lifecycle transitions).
///
/// # Errors
///
/// Returns [`DbError::Postgres`] if the update fails.
pub async fn save_clock(pool: &PgPool, clock: &ClockState) -> Result<(), DbError> {
    sqlx::query(
        r"UPDATE sim_clock
          SET current_tick = $1, running = $2, auto_advance = $3, updated_at = now()
          WHERE id = TRUE",
    )
    .bind(i64::try_from(clock.current_tick).unwrap_or(i64::MAX))
    .bind(clock.running)
    .bind(clock.auto_advance)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear run artifacts in one transaction.
///
/// A plain reset keeps the roster and the project timeline and returns
/// worker statuses to `working`. A full reset also removes workers,
/// projects, and assignments, leaving only the schema and a zeroed clock.
///
/// # Errors
///
/// Returns [`DbError::Postgres`] if any statement fails.
pub async fn reset_run(pool: &PgPool, full: bool) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for table in [
        "events",
        "worker_plans",
        "scheduled_communications",
        "dispatched_messages",
        "inbound_queue",
        "participation_stats",
        "chat_rooms",
    ] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
    }

    if full {
        sqlx::query("DELETE FROM project_assignments")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM workers").execute(&mut *tx).await?;
    } else {
        sqlx::query("UPDATE workers SET status = 'working', status_until_tick = NULL")
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r"UPDATE sim_clock
          SET current_tick = 0, running = FALSE, auto_advance = FALSE, updated_at = now()
          WHERE id = TRUE",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    debug!(full, "Reset run state");
    Ok(())
}
