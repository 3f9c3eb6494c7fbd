//! Event log persistence.
//!
//! Events are the audit trail of the simulation: every generated or
//! injected event is written once, immutably, keyed by its effect tick.

use cadre_types::{EventId, ProjectId, SimEvent, SimEventType, WorkerId};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `events` table.
pub struct EventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of events within one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn batch_insert(&self, events: &[SimEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        insert_events_tx(&mut tx, events).await?;
        tx.commit().await?;

        tracing::debug!(count = events.len(), "Inserted events");
        Ok(())
    }

    /// Query events effective at a specific tick.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Decode`] for an unknown event-type string.
    pub async fn get_events_by_tick(&self, tick: u64) -> Result<Vec<SimEvent>, DbError> {
        let tick_i64 = i64::try_from(tick).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, event_type, target_worker_ids, project_id, at_tick, payload, created_at
              FROM events
              WHERE at_tick = $1
              ORDER BY id",
        )
        .bind(tick_i64)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }
}

/// Insert events inside an existing transaction.
///
/// The `target_worker_ids` array column rules out a single UNNEST
/// statement, so rows go in one at a time. An event id already present
/// is skipped, keeping replays idempotent.
pub(crate) async fn insert_events_tx(
    tx: &mut Transaction<'_, Postgres>,
    events: &[SimEvent],
) -> Result<(), DbError> {
    for event in events {
        let targets: Vec<Uuid> = event
            .target_worker_ids
            .iter()
            .map(|id| id.into_inner())
            .collect();
        sqlx::query(
            r"INSERT INTO events (id, event_type, target_worker_ids, project_id, at_tick, payload, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id.into_inner())
        .bind(event_type_to_db(event.event_type))
        .bind(&targets)
        .bind(event.project_id.map(ProjectId::into_inner))
        .bind(i64::try_from(event.at_tick).unwrap_or(i64::MAX))
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    target_worker_ids: Vec<Uuid>,
    project_id: Option<Uuid>,
    at_tick: i64,
    payload: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl EventRow {
    fn into_event(self) -> Result<SimEvent, DbError> {
        Ok(SimEvent {
            id: EventId::from(self.id),
            event_type: event_type_from_db(&self.event_type)?,
            target_worker_ids: self
                .target_worker_ids
                .into_iter()
                .map(WorkerId::from)
                .collect(),
            project_id: self.project_id.map(ProjectId::from),
            at_tick: u64::try_from(self.at_tick).unwrap_or_default(),
            payload: self.payload,
            created_at: self.created_at,
        })
    }
}

/// Convert a [`SimEventType`] to its storage string.
pub(crate) const fn event_type_to_db(event_type: SimEventType) -> &'static str {
    match event_type {
        SimEventType::SickLeave => "sick_leave",
        SimEventType::ClientChange => "client_change",
        SimEventType::Custom => "custom",
    }
}

/// Parse a storage string back into a [`SimEventType`].
pub(crate) fn event_type_from_db(value: &str) -> Result<SimEventType, DbError> {
    match value {
        "sick_leave" => Ok(SimEventType::SickLeave),
        "client_change" => Ok(SimEventType::ClientChange),
        "custom" => Ok(SimEventType::Custom),
        other => Err(DbError::Decode(format!("unknown event type: {other}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_storage_strings() {
        for event_type in [
            SimEventType::SickLeave,
            SimEventType::ClientChange,
            SimEventType::Custom,
        ] {
            assert_eq!(
                event_type_from_db(event_type_to_db(event_type)).unwrap(),
                event_type
            );
        }
    }
}
