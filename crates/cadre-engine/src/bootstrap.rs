//! Store seeding and state hydration at startup.
//!
//! A fresh database gets the config-seeded roster and project timeline
//! written out. A database with prior state wins instead: the in-memory
//! core is rebuilt from stored rows, including the clock position,
//! pending communications, cooldown windows, and thread roots, so a
//! restarted engine resumes exactly where it stopped.

use cadre_core::SimClock;
use cadre_core::tick::SimCore;
use cadre_db::{CommStore, PlanStore, ProjectStore, WorkerStore, load_clock};
use cadre_types::WorkerId;
use sqlx::PgPool;
use tracing::info;

use crate::error::EngineError;

/// Write the config-seeded roster and project timeline to a fresh store.
pub async fn seed_stores(pool: &PgPool, core: &SimCore) -> Result<(), EngineError> {
    WorkerStore::new(pool).upsert(&core.roster).await?;

    let store = ProjectStore::new(pool);
    for project in core.projects.projects() {
        let assignments: Vec<_> = core
            .projects
            .assignments()
            .iter()
            .filter(|a| a.project_id == project.id)
            .copied()
            .collect();
        store.store(project, &assignments).await?;
    }

    info!(
        workers = core.roster.len(),
        projects = core.projects.projects().count(),
        "Seeded stores from configuration"
    );
    Ok(())
}

/// Rebuild the in-memory core from stored state.
///
/// The configuration still supplies the calendar geometry and all
/// tunables; everything stateful comes from the database.
pub async fn hydrate(pool: &PgPool, core: &mut SimCore) -> Result<(), EngineError> {
    let clock_state = load_clock(pool).await?;

    let workers = WorkerStore::new(pool).load_all().await?;
    if !workers.is_empty() {
        core.roster = workers;
    }

    let store = ProjectStore::new(pool);
    let projects = store.load_projects().await?;
    let assignments = store.load_assignments().await?;
    core.projects.clear();
    for project in projects {
        let rows: Vec<_> = assignments
            .iter()
            .filter(|a| a.project_id == project.id)
            .copied()
            .collect();
        core.projects.store(project, rows);
    }
    core.projects.restore_rooms(store.load_rooms().await?);

    core.clock = SimClock::from_parts(
        clock_state.current_tick,
        core.config.time.ticks_per_day,
        core.config.time.days_per_week,
    )?;

    let active: Vec<WorkerId> = core.roster.iter().map(|w| w.id).collect();
    core.registry.sync(&active);
    core.registry
        .restore(CommStore::new(pool).load_queues().await?);

    let plan_store = PlanStore::new(pool);
    core.balancer.restore(plan_store.load_stats().await?);
    core.plans = plan_store
        .load_plans()
        .await?
        .into_iter()
        .map(|plan| ((plan.worker_id, plan.day_index), plan))
        .collect();

    let comms = CommStore::new(pool);
    core.hub.restore_pending(comms.load_pending().await?);

    // The dispatch log rebuilds cooldown windows and thread roots. Stale
    // cooldown entries are harmless; the window check ignores them.
    let mut dispatch_count = 0_usize;
    for message in comms.load_recent_dispatches(0).await? {
        for address in &message.recipients {
            core.hub.restore_cooldown(
                message.channel,
                message.sender,
                address.clone(),
                message.tick,
            );
        }
        core.hub.restore_thread(
            message.id,
            message.thread_id.unwrap_or(message.id),
            message.sender,
            message.channel,
            message.subject.clone(),
        );
        dispatch_count = dispatch_count.saturating_add(1);
    }

    info!(
        tick = clock_state.current_tick,
        workers = core.roster.len(),
        pending = core.hub.pending().len(),
        dispatch_log = dispatch_count,
        "Hydrated core from stored state"
    );
    Ok(())
}
