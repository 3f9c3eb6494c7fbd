//! Roster persistence.
//!
//! Workers are seeded once at bootstrap and never deleted; only the
//! status columns change during a run.

use cadre_types::{Worker, WorkerId, WorkerStatus};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `workers` table.
pub struct WorkerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> WorkerStore<'a> {
    /// Create a new worker store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the given workers in one multi-row statement.
    ///
    /// Identity columns are written on insert; for existing rows only the
    /// mutable status columns are updated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn upsert(&self, workers: &[Worker]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        upsert_workers_tx(&mut tx, workers).await?;
        tx.commit().await?;
        tracing::debug!(count = workers.len(), "Upserted workers (batch UNNEST)");
        Ok(())
    }

    /// Load the full roster in name order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails and
    /// [`DbError::Decode`] for an unknown status string.
    pub async fn load_all(&self) -> Result<Vec<Worker>, DbError> {
        let rows = sqlx::query_as::<_, WorkerRow>(
            r"SELECT id, name, role, timezone, email, chat_handle, is_department_head, status, status_until_tick
              FROM workers
              ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(WorkerRow::into_worker).collect()
    }

    /// Number of workers currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workers")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(row.0).unwrap_or_default())
    }
}

/// Upsert workers inside an existing transaction.
///
/// Identity columns are written on insert; for existing rows only the
/// mutable status columns are updated.
pub(crate) async fn upsert_workers_tx(
    tx: &mut Transaction<'_, Postgres>,
    workers: &[Worker],
) -> Result<(), DbError> {
    if workers.is_empty() {
        return Ok(());
    }

    let len = workers.len();
    let mut ids = Vec::with_capacity(len);
    let mut names = Vec::with_capacity(len);
    let mut roles = Vec::with_capacity(len);
    let mut timezones = Vec::with_capacity(len);
    let mut emails = Vec::with_capacity(len);
    let mut handles = Vec::with_capacity(len);
    let mut heads = Vec::with_capacity(len);
    let mut statuses = Vec::with_capacity(len);
    let mut untils: Vec<Option<i64>> = Vec::with_capacity(len);

    for worker in workers {
        ids.push(worker.id.into_inner());
        names.push(worker.name.clone());
        roles.push(worker.role.clone());
        timezones.push(worker.timezone.clone());
        emails.push(worker.email.clone());
        handles.push(worker.chat_handle.clone());
        heads.push(worker.is_department_head);
        statuses.push(status_to_db(worker.status).to_owned());
        untils.push(
            worker
                .status_until_tick
                .map(|t| i64::try_from(t).unwrap_or(i64::MAX)),
        );
    }

    sqlx::query(
        r"INSERT INTO workers (id, name, role, timezone, email, chat_handle, is_department_head, status, status_until_tick)
          SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::TEXT[], $4::TEXT[], $5::TEXT[], $6::TEXT[], $7::BOOLEAN[], $8::TEXT[], $9::BIGINT[])
          ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            status_until_tick = EXCLUDED.status_until_tick",
    )
    .bind(&ids)
    .bind(&names)
    .bind(&roles)
    .bind(&timezones)
    .bind(&emails)
    .bind(&handles)
    .bind(&heads)
    .bind(&statuses)
    .bind(&untils)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// A row from the `workers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct WorkerRow {
    id: Uuid,
    name: String,
    role: String,
    timezone: String,
    email: String,
    chat_handle: String,
    is_department_head: bool,
    status: String,
    status_until_tick: Option<i64>,
}

impl WorkerRow {
    fn into_worker(self) -> Result<Worker, DbError> {
        Ok(Worker {
            id: WorkerId::from(self.id),
            name: self.name,
            role: self.role,
            timezone: self.timezone,
            email: self.email,
            chat_handle: self.chat_handle,
            is_department_head: self.is_department_head,
            status: status_from_db(&self.status)?,
            status_until_tick: self
                .status_until_tick
                .map(|t| u64::try_from(t).unwrap_or_default()),
        })
    }
}

/// Convert a [`WorkerStatus`] to its storage string.
pub(crate) const fn status_to_db(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Working => "working",
        WorkerStatus::Away => "away",
        WorkerStatus::OffDuty => "off_duty",
        WorkerStatus::Overtime => "overtime",
        WorkerStatus::SickLeave => "sick_leave",
        WorkerStatus::Vacation => "vacation",
    }
}

/// Parse a storage string back into a [`WorkerStatus`].
pub(crate) fn status_from_db(value: &str) -> Result<WorkerStatus, DbError> {
    match value {
        "working" => Ok(WorkerStatus::Working),
        "away" => Ok(WorkerStatus::Away),
        "off_duty" => Ok(WorkerStatus::OffDuty),
        "overtime" => Ok(WorkerStatus::Overtime),
        "sick_leave" => Ok(WorkerStatus::SickLeave),
        "vacation" => Ok(WorkerStatus::Vacation),
        other => Err(DbError::Decode(format!("unknown worker status: {other}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [
            WorkerStatus::Working,
            WorkerStatus::Away,
            WorkerStatus::OffDuty,
            WorkerStatus::Overtime,
            WorkerStatus::SickLeave,
            WorkerStatus::Vacation,
        ] {
            assert_eq!(status_from_db(status_to_db(status)).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        assert!(matches!(
            status_from_db("moonlighting"),
            Err(DbError::Decode(_))
        ));
    }
}
