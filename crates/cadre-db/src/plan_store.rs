//! Plan and participation persistence.
//!
//! One plan row per worker and simulated day; regeneration within the
//! same day overwrites. Participation rows accumulate per day and carry
//! the probability modifier computed by the balancer.

use cadre_types::{ParticipationStat, WorkerId, WorkerPlan};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `worker_plans` and `participation_stats` tables.
pub struct PlanStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PlanStore<'a> {
    /// Create a new plan store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Upsert plans in one multi-row statement, keyed by worker and day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn upsert_plans(&self, plans: &[WorkerPlan]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        upsert_plans_tx(&mut tx, plans).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Load every stored plan, ordered by day then worker.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_plans(&self) -> Result<Vec<WorkerPlan>, DbError> {
        let rows = sqlx::query_as::<_, PlanRow>(
            r"SELECT worker_id, day_index, generated_tick, plan_text, from_fallback
              FROM worker_plans
              ORDER BY day_index, worker_id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PlanRow::into_plan).collect())
    }

    /// Upsert participation rows, keyed by worker and day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn upsert_stats(&self, stats: &[ParticipationStat]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        upsert_stats_tx(&mut tx, stats).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Load every participation row, ordered by day then worker.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_stats(&self) -> Result<Vec<ParticipationStat>, DbError> {
        let rows = sqlx::query_as::<_, StatRow>(
            r"SELECT worker_id, day_index, email_count, chat_count, probability_modifier
              FROM participation_stats
              ORDER BY day_index, worker_id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(StatRow::into_stat).collect())
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped writers, shared with the tick persist path
// ---------------------------------------------------------------------------

/// Upsert plans inside an existing transaction.
pub(crate) async fn upsert_plans_tx(
    tx: &mut Transaction<'_, Postgres>,
    plans: &[WorkerPlan],
) -> Result<(), DbError> {
    if plans.is_empty() {
        return Ok(());
    }

    let len = plans.len();
    let mut worker_ids = Vec::with_capacity(len);
    let mut day_indexes = Vec::with_capacity(len);
    let mut generated_ticks = Vec::with_capacity(len);
    let mut plan_texts = Vec::with_capacity(len);
    let mut fallbacks = Vec::with_capacity(len);

    for plan in plans {
        worker_ids.push(plan.worker_id.into_inner());
        day_indexes.push(i64::try_from(plan.day_index).unwrap_or(i64::MAX));
        generated_ticks.push(i64::try_from(plan.generated_tick).unwrap_or(i64::MAX));
        plan_texts.push(plan.plan_text.clone());
        fallbacks.push(plan.from_fallback);
    }

    sqlx::query(
        r"INSERT INTO worker_plans (worker_id, day_index, generated_tick, plan_text, from_fallback)
          SELECT * FROM UNNEST($1::UUID[], $2::BIGINT[], $3::BIGINT[], $4::TEXT[], $5::BOOLEAN[])
          ON CONFLICT (worker_id, day_index) DO UPDATE SET
            generated_tick = EXCLUDED.generated_tick,
            plan_text = EXCLUDED.plan_text,
            from_fallback = EXCLUDED.from_fallback",
    )
    .bind(&worker_ids)
    .bind(&day_indexes)
    .bind(&generated_ticks)
    .bind(&plan_texts)
    .bind(&fallbacks)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Upsert participation rows inside an existing transaction.
pub(crate) async fn upsert_stats_tx(
    tx: &mut Transaction<'_, Postgres>,
    stats: &[ParticipationStat],
) -> Result<(), DbError> {
    if stats.is_empty() {
        return Ok(());
    }

    let len = stats.len();
    let mut worker_ids = Vec::with_capacity(len);
    let mut day_indexes = Vec::with_capacity(len);
    let mut email_counts = Vec::with_capacity(len);
    let mut chat_counts = Vec::with_capacity(len);
    let mut modifiers = Vec::with_capacity(len);

    for stat in stats {
        worker_ids.push(stat.worker_id.into_inner());
        day_indexes.push(i64::try_from(stat.day_index).unwrap_or(i64::MAX));
        email_counts.push(i32::try_from(stat.email_count).unwrap_or(i32::MAX));
        chat_counts.push(i32::try_from(stat.chat_count).unwrap_or(i32::MAX));
        modifiers.push(stat.probability_modifier);
    }

    sqlx::query(
        r"INSERT INTO participation_stats (worker_id, day_index, email_count, chat_count, probability_modifier)
          SELECT * FROM UNNEST($1::UUID[], $2::BIGINT[], $3::INT[], $4::INT[], $5::DOUBLE PRECISION[])
          ON CONFLICT (worker_id, day_index) DO UPDATE SET
            email_count = EXCLUDED.email_count,
            chat_count = EXCLUDED.chat_count,
            probability_modifier = EXCLUDED.probability_modifier",
    )
    .bind(&worker_ids)
    .bind(&day_indexes)
    .bind(&email_counts)
    .bind(&chat_counts)
    .bind(&modifiers)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct PlanRow {
    worker_id: Uuid,
    day_index: i64,
    generated_tick: i64,
    plan_text: String,
    from_fallback: bool,
}

impl PlanRow {
    fn into_plan(self) -> WorkerPlan {
        WorkerPlan {
            worker_id: WorkerId::from(self.worker_id),
            day_index: u64::try_from(self.day_index).unwrap_or_default(),
            generated_tick: u64::try_from(self.generated_tick).unwrap_or_default(),
            plan_text: self.plan_text,
            from_fallback: self.from_fallback,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StatRow {
    worker_id: Uuid,
    day_index: i64,
    email_count: i32,
    chat_count: i32,
    probability_modifier: f64,
}

impl StatRow {
    fn into_stat(self) -> ParticipationStat {
        ParticipationStat {
            worker_id: WorkerId::from(self.worker_id),
            day_index: u64::try_from(self.day_index).unwrap_or_default(),
            email_count: u32::try_from(self.email_count).unwrap_or_default(),
            chat_count: u32::try_from(self.chat_count).unwrap_or_default(),
            probability_modifier: self.probability_modifier,
        }
    }
}
