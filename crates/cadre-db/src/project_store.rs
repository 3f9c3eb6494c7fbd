//! Project timeline persistence: projects, assignments, and chat rooms.

use cadre_types::{ChatRoom, Project, ProjectAssignment, ProjectId, RoomId, WorkerId};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `projects`, `project_assignments`, and `chat_rooms`
/// tables.
pub struct ProjectStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectStore<'a> {
    /// Create a new project store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a project and replace its assignment rows atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any statement fails.
    pub async fn store(
        &self,
        project: &Project,
        assignments: &[ProjectAssignment],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO projects (id, name, summary, start_week, duration_weeks, plan_text)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (id) DO UPDATE SET
                summary = EXCLUDED.summary,
                plan_text = EXCLUDED.plan_text",
        )
        .bind(project.id.into_inner())
        .bind(&project.name)
        .bind(&project.summary)
        .bind(i32::try_from(project.start_week).unwrap_or(i32::MAX))
        .bind(i32::try_from(project.duration_weeks).unwrap_or(i32::MAX))
        .bind(project.plan_text.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM project_assignments WHERE project_id = $1")
            .bind(project.id.into_inner())
            .execute(&mut *tx)
            .await?;

        if !assignments.is_empty() {
            let project_ids: Vec<Uuid> = assignments
                .iter()
                .map(|a| a.project_id.into_inner())
                .collect();
            let worker_ids: Vec<Uuid> = assignments
                .iter()
                .map(|a| a.worker_id.into_inner())
                .collect();
            sqlx::query(
                r"INSERT INTO project_assignments (project_id, worker_id)
                  SELECT * FROM UNNEST($1::UUID[], $2::UUID[])
                  ON CONFLICT DO NOTHING",
            )
            .bind(&project_ids)
            .bind(&worker_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(project = %project.name, assignees = assignments.len(), "Stored project");
        Ok(())
    }

    /// Load every project in start-week order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_projects(&self) -> Result<Vec<Project>, DbError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r"SELECT id, name, summary, start_week, duration_weeks, plan_text
              FROM projects
              ORDER BY start_week, name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ProjectRow::into_project).collect())
    }

    /// Load every assignment row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_assignments(&self) -> Result<Vec<ProjectAssignment>, DbError> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT project_id, worker_id FROM project_assignments ORDER BY project_id, worker_id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(project_id, worker_id)| ProjectAssignment {
                project_id: ProjectId::from(project_id),
                worker_id: WorkerId::from(worker_id),
            })
            .collect())
    }

    /// Load every chat room.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_rooms(&self) -> Result<Vec<ChatRoom>, DbError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r"SELECT id, project_id, room_key, is_active, created_tick, archived_tick
              FROM chat_rooms
              ORDER BY created_tick",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(RoomRow::into_room).collect())
    }
}

/// Upsert chat rooms inside an existing transaction.
///
/// Room identity never changes after creation; only the active flag and
/// the archive tick move.
pub(crate) async fn upsert_rooms_tx(
    tx: &mut Transaction<'_, Postgres>,
    rooms: &[ChatRoom],
) -> Result<(), DbError> {
    if rooms.is_empty() {
        return Ok(());
    }

    let len = rooms.len();
    let mut ids = Vec::with_capacity(len);
    let mut project_ids = Vec::with_capacity(len);
    let mut room_keys = Vec::with_capacity(len);
    let mut actives = Vec::with_capacity(len);
    let mut created_ticks = Vec::with_capacity(len);
    let mut archived_ticks: Vec<Option<i64>> = Vec::with_capacity(len);

    for room in rooms {
        ids.push(room.id.into_inner());
        project_ids.push(room.project_id.into_inner());
        room_keys.push(room.room_key.clone());
        actives.push(room.is_active);
        created_ticks.push(i64::try_from(room.created_tick).unwrap_or(i64::MAX));
        archived_ticks.push(
            room.archived_tick
                .map(|t| i64::try_from(t).unwrap_or(i64::MAX)),
        );
    }

    sqlx::query(
        r"INSERT INTO chat_rooms (id, project_id, room_key, is_active, created_tick, archived_tick)
          SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::TEXT[], $4::BOOLEAN[], $5::BIGINT[], $6::BIGINT[])
          ON CONFLICT (project_id) DO UPDATE SET
            is_active = EXCLUDED.is_active,
            archived_tick = EXCLUDED.archived_tick",
    )
    .bind(&ids)
    .bind(&project_ids)
    .bind(&room_keys)
    .bind(&actives)
    .bind(&created_ticks)
    .bind(&archived_ticks)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// A row from the `projects` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    summary: String,
    start_week: i32,
    duration_weeks: i32,
    plan_text: Option<String>,
}

impl ProjectRow {
    fn into_project(self) -> Project {
        Project {
            id: ProjectId::from(self.id),
            name: self.name,
            summary: self.summary,
            start_week: u32::try_from(self.start_week).unwrap_or_default(),
            duration_weeks: u32::try_from(self.duration_weeks).unwrap_or(1),
            plan_text: self.plan_text,
        }
    }
}

/// A row from the `chat_rooms` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    project_id: Uuid,
    room_key: String,
    is_active: bool,
    created_tick: i64,
    archived_tick: Option<i64>,
}

impl RoomRow {
    fn into_room(self) -> ChatRoom {
        ChatRoom {
            id: RoomId::from(self.id),
            project_id: ProjectId::from(self.project_id),
            room_key: self.room_key,
            is_active: self.is_active,
            created_tick: u64::try_from(self.created_tick).unwrap_or_default(),
            archived_tick: self
                .archived_tick
                .map(|t| u64::try_from(t).unwrap_or_default()),
        }
    }
}
