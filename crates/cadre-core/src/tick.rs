//! Tick cycle: the phased engine loop that drives the Cadre simulation.
//!
//! Each tick advances one simulated minute and runs through these phases:
//!
//! 1. **Clock** -- advance the clock and clear per-tick dedup state.
//!
//! 2. **Status expiry** -- clear temporary worker statuses whose expiry
//!    tick has passed.
//!
//! 3. **Events** -- generate seeded events (sick leave, client changes),
//!    release injected events due this tick, apply status overrides, and
//!    queue planning adjustments scoped to project collaborators.
//!
//! 4. **Room sync** -- open chat rooms for projects entering their active
//!    window and archive rooms for projects leaving it.
//!
//! 5. **Planning** -- select workers due for a plan (day start, new
//!    inbound messages, or pending adjustments), fan out to the
//!    [`PlanSource`] against one immutable snapshot, then apply results
//!    sequentially: store the plan, queue its send directives, and gate
//!    over-active senders through the participation balancer.
//!
//! 6. **Dispatch** -- process every communication due at this tick through
//!    the hub's suppression rules and forward survivors to the delivery
//!    backend; fan deliveries into recipient queues.
//!
//! 7. **Persist** -- hand the accumulated [`TickDelta`] to the
//!    [`TickPersister`]. On failure the pre-tick state is restored, so the
//!    clock never half-advances.
//!
//! The cycle is deterministic for a given seed and plan-source output:
//! event rolls and balancer gates draw from per-tick seeded generators,
//! and plans are applied in request order regardless of completion order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use cadre_comms::{
    CommunicationHub, DeliveryBackend, Directory, DirectoryWorker, DispatchReport, HubConfig,
    Suppression,
};
use cadre_types::{
    ChatRoom, ClockState, LifecyclePhase, Project, ProjectAssignment, ProjectId, SimEvent,
    SuppressionReason, TickDelta, Worker, WorkerId, WorkerPlan, WorkerStatus,
};

use crate::balancer::{ParticipationBalancer, VolumeStanding};
use crate::clock::{ClockError, SimClock};
use crate::config::SimulationConfig;
use crate::events::EventSystem;
use crate::lifecycle::{LifecycleController, LifecycleError};
use crate::planning::{
    ContextSnapshot, PlanRequest, PlanSource, PlanningCoordinator, PlanningError,
};
use crate::projects::ProjectManager;
use crate::registry::WorkerRuntimeRegistry;
use crate::scheduler::{AdvanceResult, ControlState};

/// Errors that can occur while advancing the simulation.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// Another advance or reset holds the single-writer permit.
    #[error("an advance is already in progress")]
    Busy,

    /// A tick was requested outside the `Running` phase.
    #[error("simulation is not running (phase {phase:?})")]
    NotRunning {
        /// The phase the simulation was in.
        phase: LifecyclePhase,
    },

    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A lifecycle transition was invalid.
    #[error("lifecycle error: {source}")]
    Lifecycle {
        /// The underlying lifecycle error.
        #[from]
        source: LifecycleError,
    },

    /// Planning failed in strict mode.
    #[error("planning error: {source}")]
    Planning {
        /// The underlying planning error.
        #[from]
        source: PlanningError,
    },

    /// The persister rejected a tick delta or a reset.
    #[error("persist error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: PersistError,
    },
}

/// A persistence failure reported by a [`TickPersister`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PersistError {
    /// Human-readable failure description.
    pub message: String,
}

impl PersistError {
    /// Wrap a failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A sink for end-of-tick deltas.
///
/// Implementations write the delta atomically: either every effect of the
/// tick lands or none do. The returned futures must be `Send` because the
/// auto-advance loop runs inside a spawned task.
pub trait TickPersister {
    /// Persist one tick's effects.
    fn persist(&self, delta: &TickDelta) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Clear persisted run state. A full reset also clears the dispatch
    /// history and project timeline.
    fn reset(&self, full: bool) -> impl Future<Output = Result<(), PersistError>> + Send;
}

/// A persister that drops deltas, for tests and store-less runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

impl NoopPersister {
    /// Create a no-op persister.
    pub const fn new() -> Self {
        Self
    }
}

impl TickPersister for NoopPersister {
    async fn persist(&self, _delta: &TickDelta) -> Result<(), PersistError> {
        Ok(())
    }

    async fn reset(&self, _full: bool) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick that was executed.
    pub tick: u64,
    /// Messages dispatched this tick.
    pub dispatched: u64,
    /// Communications suppressed this tick, balancer gates included.
    pub suppressed: u64,
    /// Plans generated this tick.
    pub plans_generated: u64,
    /// The effects to persist.
    pub delta: TickDelta,
}

/// Result of the planning phase.
struct PlanPhase {
    /// Plans stored this tick, in request order.
    plans: Vec<WorkerPlan>,
    /// Communications removed by the participation balancer.
    balanced: Vec<Suppression>,
}

// ---------------------------------------------------------------------------
// Simulation core
// ---------------------------------------------------------------------------

/// The mutable simulation state passed through the tick cycle.
///
/// `SimCore` is `Clone`: the advance loop snapshots it before each tick and
/// restores the snapshot when the tick or its persist fails, so observable
/// state never reflects a half-executed tick.
#[derive(Debug, Clone)]
pub struct SimCore {
    /// The loaded configuration, kept for full resets.
    pub config: SimulationConfig,
    /// The simulation clock.
    pub clock: SimClock,
    /// Lifecycle phase tracking.
    pub lifecycle: LifecycleController,
    /// Event generation and adjustment bookkeeping.
    pub events: EventSystem,
    /// Projects, assignments, and chat rooms.
    pub projects: ProjectManager,
    /// Per-worker inbound queues.
    pub registry: WorkerRuntimeRegistry,
    /// Daily send-volume accounting.
    pub balancer: ParticipationBalancer,
    /// Scheduled-communication state and dispatch rules.
    pub hub: CommunicationHub,
    /// Bounded-parallel planning.
    pub coordinator: PlanningCoordinator,
    /// The worker roster. Identity fields are immutable after onboarding;
    /// only statuses change.
    pub roster: Vec<Worker>,
    /// Latest plan per (worker, day).
    pub plans: BTreeMap<(WorkerId, u64), WorkerPlan>,
    /// Running totals for the end-of-run report. Per-process only; a
    /// restart starts the counters over.
    pub totals: RunTotals,
}

/// Cumulative counters reported when a run stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    /// Messages dispatched across the run.
    pub dispatched: u64,
    /// Communications suppressed across the run, balancer gates included.
    pub suppressed: u64,
    /// Events generated and released across the run.
    pub events: u64,
}

impl SimCore {
    /// Build a fresh core from configuration: seed the roster and project
    /// timeline, and wire every subsystem from its config section.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] for a degenerate calendar.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ClockError> {
        let clock = SimClock::new(&config.time)?;
        let hub = CommunicationHub::new(HubConfig {
            cooldown_ticks: config.comms.cooldown_ticks,
            ticks_per_day: config.time.ticks_per_day,
        });

        let mut roster = Vec::with_capacity(config.workers.len());
        for seed in &config.workers {
            let slug = address_slug(&seed.name);
            roster.push(Worker {
                id: WorkerId::new(),
                name: seed.name.clone(),
                role: seed.role.clone(),
                timezone: seed.timezone.clone(),
                email: seed
                    .email
                    .clone()
                    .unwrap_or_else(|| format!("{slug}@cadre.local")),
                chat_handle: seed.chat_handle.clone().unwrap_or_else(|| format!("@{slug}")),
                is_department_head: seed.department_head,
                status: WorkerStatus::Working,
                status_until_tick: None,
            });
        }

        let mut projects = ProjectManager::new();
        for seed in &config.projects {
            let project = Project {
                id: ProjectId::new(),
                name: seed.name.clone(),
                summary: seed.summary.clone(),
                start_week: seed.start_week.max(1),
                duration_weeks: seed.duration_weeks.max(1),
                plan_text: None,
            };
            let mut assignments = Vec::new();
            for assignee in &seed.assignees {
                roster
                    .iter()
                    .find(|w| w.name.eq_ignore_ascii_case(assignee))
                    .map_or_else(
                        || {
                            warn!(
                                project = %seed.name,
                                assignee = %assignee,
                                "unknown assignee in project seed"
                            );
                        },
                        |worker| {
                            assignments.push(ProjectAssignment {
                                project_id: project.id,
                                worker_id: worker.id,
                            });
                        },
                    );
            }
            projects.store(project, assignments);
        }

        Ok(Self {
            clock,
            lifecycle: LifecycleController::new(),
            events: EventSystem::new(config.events.clone(), config.simulation.seed),
            projects,
            registry: WorkerRuntimeRegistry::new(config.comms.queue_capacity),
            balancer: ParticipationBalancer::new(config.balance.clone()),
            hub,
            coordinator: PlanningCoordinator::new(config.planning.clone()),
            roster,
            plans: BTreeMap::new(),
            totals: RunTotals::default(),
            config: config.clone(),
        })
    }

    /// Execute one complete tick.
    ///
    /// Runs every phase except persist, which the owning handle performs so
    /// it can roll back on failure. The caller must hold the advance permit.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::NotRunning`] outside the `Running` phase,
    /// [`TickError::Clock`] on tick overflow, and [`TickError::Planning`]
    /// when a strict-mode planning call fails. The caller restores the
    /// pre-tick snapshot on any error.
    pub async fn run_tick<S: PlanSource + Sync>(
        &mut self,
        source: &S,
        backend: &DeliveryBackend,
    ) -> Result<TickSummary, TickError> {
        if !self.lifecycle.is_running() {
            return Err(TickError::NotRunning {
                phase: self.lifecycle.phase(),
            });
        }

        // Day-start duties run on the first tick executed after a day
        // boundary, tick 1 of a fresh run included.
        let day_start = self.clock.is_day_start();
        let tick = self.clock.advance()?;
        let day_index = self.clock.day_index();
        let week = self.clock.week();

        info!(tick, week, time = %self.clock.clock_time(), "tick started");

        self.hub.reset_tick_state();
        let ids: Vec<WorkerId> = self.roster.iter().map(|w| w.id).collect();
        self.registry.sync(&ids);

        // --- Phase: status expiry ---
        let mut changed_workers = self.expire_statuses(tick);

        // --- Phase: events ---
        let events = self.event_phase(tick, day_start, week, &mut changed_workers);

        // --- Phase: room sync ---
        let room_sync = self.projects.sync_rooms(week, tick);

        // --- Phase: planning ---
        let plan_phase = self
            .planning_phase(source, tick, day_index, week, day_start)
            .await?;

        // --- Phase: dispatch ---
        let report = self.dispatch_phase(tick, day_index, backend).await;

        // --- Phase: summary ---
        let rooms = room_sync
            .created
            .into_iter()
            .chain(room_sync.archived)
            .collect();
        Ok(self.summarize(changed_workers, events, rooms, plan_phase, report))
    }

    /// Assemble the tick summary and its persistence delta.
    fn summarize(
        &mut self,
        workers: Vec<Worker>,
        events: Vec<SimEvent>,
        rooms: Vec<ChatRoom>,
        plan_phase: PlanPhase,
        report: DispatchReport,
    ) -> TickSummary {
        let tick = self.clock.tick();
        let stats = self
            .balancer
            .rows_for_day(self.clock.day_index(), &self.roster);
        let dispatched = u64::try_from(report.dispatched.len()).unwrap_or(u64::MAX);
        let suppressed = u64::try_from(
            report
                .suppressed
                .len()
                .saturating_add(plan_phase.balanced.len()),
        )
        .unwrap_or(u64::MAX);
        let plans_generated = u64::try_from(plan_phase.plans.len()).unwrap_or(u64::MAX);

        self.totals.dispatched = self.totals.dispatched.saturating_add(dispatched);
        self.totals.suppressed = self.totals.suppressed.saturating_add(suppressed);
        self.totals.events = self
            .totals
            .events
            .saturating_add(u64::try_from(events.len()).unwrap_or(u64::MAX));

        debug!(tick, dispatched, suppressed, plans_generated, "tick finished");

        let delta = TickDelta {
            tick,
            // `running` and `auto_advance` are stamped by the handle at
            // persist time; it owns lifecycle visibility.
            clock: ClockState {
                current_tick: tick,
                running: true,
                auto_advance: false,
            },
            workers,
            events,
            rooms,
            plans: plan_phase.plans,
            pending: self.hub.pending().to_vec(),
            dispatched: report.dispatched,
            queues: self.registry.snapshot(),
            stats,
        };

        TickSummary {
            tick,
            dispatched,
            suppressed,
            plans_generated,
            delta,
        }
    }

    /// Clear temporary statuses whose expiry tick has passed.
    fn expire_statuses(&mut self, tick: u64) -> Vec<Worker> {
        let mut changed = Vec::new();
        for worker in &mut self.roster {
            if worker.status_until_tick.is_some_and(|until| until <= tick) {
                debug!(worker = %worker.name, from = ?worker.status, "temporary status expired");
                worker.status = WorkerStatus::Working;
                worker.status_until_tick = None;
                changed.push(worker.clone());
            }
        }
        changed
    }

    /// Generate and release events, apply their status overrides, and queue
    /// planning adjustments scoped to the targets' project collaborators.
    fn event_phase(
        &mut self,
        tick: u64,
        day_start: bool,
        week: u32,
        changed: &mut Vec<Worker>,
    ) -> Vec<SimEvent> {
        let mut events = self.events.generate_for_tick(tick, day_start, &self.roster);
        events.extend(self.events.take_due(tick));

        for event in &events {
            for patch in self.events.status_override(event) {
                if let Some(worker) = self.roster.iter_mut().find(|w| w.id == patch.worker_id) {
                    worker.status = patch.status;
                    worker.status_until_tick = Some(patch.until_tick);
                    changed.push(worker.clone());
                }
            }

            let mut collaborators = Vec::new();
            for &target in &event.target_worker_ids {
                for id in self.projects.collaborators_for(target, week, &self.roster) {
                    if !collaborators.contains(&id) && !event.target_worker_ids.contains(&id) {
                        collaborators.push(id);
                    }
                }
            }
            collaborators.sort_unstable();

            self.events.apply(event, &self.roster, &collaborators);
        }

        events
    }

    /// Plan every worker due this tick and apply the results sequentially.
    async fn planning_phase<S: PlanSource + Sync>(
        &mut self,
        source: &S,
        tick: u64,
        day_index: u64,
        week: u32,
        day_start: bool,
    ) -> Result<PlanPhase, PlanningError> {
        let planners: Vec<Worker> = self
            .roster
            .iter()
            .filter(|w| {
                w.status.plans()
                    && (day_start
                        || self.registry.has_new_messages(w.id)
                        || self.events.has_adjustments(w.id))
            })
            .cloned()
            .collect();

        let mut phase = PlanPhase {
            plans: Vec::new(),
            balanced: Vec::new(),
        };
        if planners.is_empty() {
            return Ok(phase);
        }

        let snapshot = Arc::new(ContextSnapshot {
            tick,
            day_index,
            week,
            clock_time: self.clock.clock_time(),
            roster: self.roster.clone(),
            active_projects: self
                .projects
                .active_projects_for_week(week)
                .into_iter()
                .cloned()
                .collect(),
        });

        let team_average = self.balancer.team_average(day_index, &self.roster);
        let mut requests = Vec::with_capacity(planners.len());
        for worker in planners {
            let collaborator_names = self.collaborator_names(worker.id, week);
            let adjustments = self.events.take_adjustments(worker.id);
            let inbox = self.registry.drain(worker.id);
            self.registry.clear_new_flag(worker.id);
            let participation_hint = self.participation_hint(worker.id, day_index, team_average);
            requests.push(PlanRequest {
                worker,
                snapshot: Arc::clone(&snapshot),
                collaborator_names,
                adjustments,
                inbox,
                participation_hint,
            });
        }

        let outcomes = self.coordinator.run(source, requests).await?;

        // Balancer gates draw from their own per-tick stream so event rolls
        // stay reproducible independently of how many plans were made.
        let seed = self.config.simulation.seed;
        let mut gate_rng = StdRng::seed_from_u64(seed.wrapping_mul(31).wrapping_add(tick));

        for outcome in outcomes {
            let Some(sender) = self.roster.iter().find(|w| w.id == outcome.worker_id) else {
                continue;
            };
            let plan = WorkerPlan {
                worker_id: outcome.worker_id,
                day_index,
                generated_tick: tick,
                plan_text: outcome.text,
                from_fallback: outcome.from_fallback,
            };
            let scheduled = self
                .hub
                .schedule_from_plan_text(sender, &plan.plan_text, tick);
            self.plans.insert((plan.worker_id, day_index), plan.clone());
            phase.plans.push(plan);

            for comm_id in scheduled.scheduled {
                if self
                    .balancer
                    .gate(sender.id, day_index, &self.roster, &mut gate_rng)
                {
                    continue;
                }
                if self.hub.unschedule(comm_id).is_some() {
                    debug!(
                        sender = %sender.name,
                        comm_id = %comm_id,
                        "send gated for participation balance"
                    );
                    phase.balanced.push(Suppression {
                        comm_id,
                        sender: sender.id,
                        reason: SuppressionReason::Balanced,
                    });
                }
            }
        }

        Ok(phase)
    }

    /// Dispatch due communications and fan deliveries into recipient queues.
    async fn dispatch_phase(
        &mut self,
        tick: u64,
        day_index: u64,
        backend: &DeliveryBackend,
    ) -> DispatchReport {
        let directory = self.build_directory();
        let report = self.hub.dispatch(tick, &directory, backend).await;

        for message in &report.inbound {
            self.registry.enqueue(message.clone());
        }
        for &(message_id, reply_tick) in &report.replied {
            self.registry.mark_replied(message_id, reply_tick);
        }
        for message in &report.dispatched {
            self.balancer
                .record_send(message.sender, message.channel, day_index);
        }

        report
    }

    /// Resolution directory for the current roster and active rooms.
    fn build_directory(&self) -> Directory {
        let mut directory = Directory::new();
        for worker in &self.roster {
            directory.add_worker(DirectoryWorker {
                id: worker.id,
                name: worker.name.clone(),
                email: worker.email.clone(),
                chat_handle: worker.chat_handle.clone(),
            });
        }
        for room in self.projects.rooms().filter(|r| r.is_active) {
            let members = self.projects.members_of(room.project_id, &self.roster);
            directory.add_room(room.room_key.clone(), members);
        }
        directory
    }

    /// Briefing nudge for a worker whose daily send volume is far from
    /// the team's. The hard guarantee stays with the scheduling gate;
    /// this only steers the plan.
    fn participation_hint(
        &self,
        worker_id: WorkerId,
        day_index: u64,
        team_average: f64,
    ) -> Option<String> {
        match self
            .balancer
            .standing_for(worker_id, day_index, team_average)
        {
            VolumeStanding::Dominant => Some(
                "You have sent noticeably more messages than the rest of the team \
                 today. Keep further messages to the essential."
                    .to_owned(),
            ),
            VolumeStanding::Quiet => Some(
                "You have been quieter than the rest of the team today. Reach out \
                 where it would move the work forward."
                    .to_owned(),
            ),
            VolumeStanding::Typical => None,
        }
    }

    /// Display names of a worker's collaborators this week.
    fn collaborator_names(&self, worker_id: WorkerId, week: u32) -> Vec<String> {
        self.projects
            .collaborators_for(worker_id, week, &self.roster)
            .into_iter()
            .filter_map(|id| {
                self.roster
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| w.name.clone())
            })
            .collect()
    }
}

/// Derive an address slug from a display name: lowercase ASCII
/// alphanumerics, words joined with dots.
fn address_slug(name: &str) -> String {
    name.split_whitespace()
        .map(|part| {
            part.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

// ---------------------------------------------------------------------------
// Simulation handle
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle to a shared simulation.
///
/// All control operations funnel through this handle: manual and automatic
/// advances contend for a single permit, so at most one advance executes at
/// a time and a busy simulation fast-fails further requests instead of
/// queueing them.
pub struct Simulation<S, P> {
    inner: Arc<SimulationInner<S, P>>,
}

struct SimulationInner<S, P> {
    core: Mutex<SimCore>,
    control: ControlState,
    source: S,
    backend: DeliveryBackend,
    persister: P,
}

impl<S, P> Clone for Simulation<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> Simulation<S, P>
where
    S: PlanSource + Sync,
    P: TickPersister + Sync,
{
    /// Build a simulation from configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] for a degenerate calendar config.
    pub fn new(
        config: &SimulationConfig,
        source: S,
        backend: DeliveryBackend,
        persister: P,
    ) -> Result<Self, TickError> {
        let core = SimCore::from_config(config)?;
        Ok(Self {
            inner: Arc::new(SimulationInner {
                core: Mutex::new(core),
                control: ControlState::new(),
                source,
                backend,
                persister,
            }),
        })
    }

    /// Transition to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Lifecycle`] from `Running` or `Stopped`.
    pub async fn start(&self) -> Result<(), TickError> {
        let mut core = self.inner.core.lock().await;
        core.lifecycle.start()?;
        Ok(())
    }

    /// Transition to `Paused` and stop background advancing.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Lifecycle`] unless `Running`.
    pub async fn pause(&self) -> Result<(), TickError> {
        self.inner.control.stop_auto();
        let mut core = self.inner.core.lock().await;
        core.lifecycle.pause()?;
        Ok(())
    }

    /// Finalize the run. State is retained for inspection but no further
    /// ticks can execute.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Lifecycle`] when already stopped.
    pub async fn stop(&self) -> Result<(), TickError> {
        self.inner.control.stop_auto();
        let mut core = self.inner.core.lock().await;
        core.lifecycle.stop()?;
        info!(
            tick = core.clock.tick(),
            plans = core.plans.len(),
            dispatched = core.totals.dispatched,
            suppressed = core.totals.suppressed,
            events = core.totals.events,
            "run stopped"
        );
        Ok(())
    }

    /// Advance the simulation by `ticks` ticks. The `reason` is a short
    /// operator label (`"auto"`, `"manual"`) carried into the logs.
    ///
    /// Holds the single advance permit for the whole span. Each tick is
    /// executed and persisted atomically: on any failure the pre-tick state
    /// is restored and the error returned, leaving earlier ticks of the
    /// span durable. Auto-pause is evaluated after every tick and ends the
    /// span early once the project timeline is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Busy`] when another advance is in flight, plus
    /// any error from the tick pipeline or the persister.
    pub async fn advance(&self, ticks: u64, reason: &str) -> Result<AdvanceResult, TickError> {
        let _guard = self
            .inner
            .control
            .try_begin_advance()
            .ok_or(TickError::Busy)?;
        let mut core = self.inner.core.lock().await;
        debug!(ticks, reason, "advance started");

        let start_tick = core.clock.tick();
        let mut result = AdvanceResult {
            start_tick,
            end_tick: start_tick,
            ticks_advanced: 0,
            dispatched: 0,
            suppressed: 0,
            plans_generated: 0,
            auto_paused: false,
        };

        for _ in 0..ticks {
            let backup = core.clone();
            let summary = match core.run_tick(&self.inner.source, &self.inner.backend).await {
                Ok(summary) => summary,
                Err(err) => {
                    *core = backup;
                    return Err(err);
                }
            };

            let mut delta = summary.delta;
            delta.clock.running = core.lifecycle.is_running();
            delta.clock.auto_advance = self.inner.control.auto_running();
            if let Err(err) = self.inner.persister.persist(&delta).await {
                *core = backup;
                warn!(tick = summary.tick, error = %err, "tick persist failed, state rolled back");
                return Err(TickError::Persist { source: err });
            }

            result.end_tick = summary.tick;
            result.ticks_advanced = result.ticks_advanced.saturating_add(1);
            result.dispatched = result.dispatched.saturating_add(summary.dispatched);
            result.suppressed = result.suppressed.saturating_add(summary.suppressed);
            result.plans_generated = result
                .plans_generated
                .saturating_add(summary.plans_generated);

            let week = core.clock.week();
            if core.lifecycle.evaluate_auto_pause(week, &core.projects) {
                core.lifecycle.pause()?;
                self.inner.control.stop_auto();
                result.auto_paused = true;
                info!(week, "auto-paused: no active or future projects");
                break;
            }
        }

        Ok(result)
    }

    /// Queue an operator-injected event. It takes effect once the clock
    /// reaches its `at_tick`.
    pub async fn inject_event(&self, event: SimEvent) {
        let mut core = self.inner.core.lock().await;
        core.events.inject(event);
    }

    /// Clear run state and return to `Idle`.
    ///
    /// A plain reset keeps the roster and project timeline; a full reset
    /// rebuilds everything from configuration, dispatch history included.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Busy`] when an advance is in flight, and
    /// [`TickError::Persist`] when the persister cannot clear its state.
    pub async fn reset(&self, full: bool) -> Result<(), TickError> {
        let _guard = self
            .inner
            .control
            .try_begin_advance()
            .ok_or(TickError::Busy)?;
        self.inner.control.stop_auto();
        let mut core = self.inner.core.lock().await;

        core.lifecycle.begin_reset();
        self.inner.persister.reset(full).await?;

        if full {
            let config = core.config.clone();
            *core = SimCore::from_config(&config)?;
            info!("full reset complete");
        } else {
            core.clock.reset();
            core.events.clear();
            core.registry.clear();
            core.balancer.clear();
            core.hub.clear();
            core.plans.clear();
            core.projects.clear_rooms();
            for worker in &mut core.roster {
                worker.status = WorkerStatus::Working;
                worker.status_until_tick = None;
            }
            core.lifecycle.finish_reset()?;
            info!("reset complete");
        }

        Ok(())
    }

    /// Stop the background advance task, if one is running.
    pub fn stop_auto_advance(&self) {
        self.inner.control.stop_auto();
    }

    /// Whether an advance currently holds the permit.
    pub fn is_busy(&self) -> bool {
        self.inner.control.is_busy()
    }

    /// Whether background auto-advance is enabled.
    pub fn auto_running(&self) -> bool {
        self.inner.control.auto_running()
    }

    /// Current tick of the clock.
    pub async fn current_tick(&self) -> u64 {
        self.inner.core.lock().await.clock.tick()
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> LifecyclePhase {
        self.inner.core.lock().await.lifecycle.phase()
    }

    /// Lock the core for inspection or startup hydration.
    pub async fn core(&self) -> MutexGuard<'_, SimCore> {
        self.inner.core.lock().await
    }
}

impl<S, P> Simulation<S, P>
where
    S: PlanSource + Send + Sync + 'static,
    P: TickPersister + Send + Sync + 'static,
{
    /// Start advancing one tick per interval in a background task.
    ///
    /// A busy simulation skips the beat rather than queueing it. The task
    /// exits when auto-advance is stopped or superseded, when auto-pause
    /// engages, or when a tick fails.
    pub fn start_auto_advance(&self, interval_ms: u64) {
        let generation = self.inner.control.start_auto(interval_ms);
        let handle = self.clone();
        tokio::spawn(async move {
            let interval = Duration::from_millis(interval_ms.max(1));
            info!(interval_ms, "auto-advance started");
            loop {
                sleep(interval).await;
                if !handle.inner.control.auto_live(generation) {
                    break;
                }
                match handle.advance(1, "auto").await {
                    Ok(result) => {
                        if result.auto_paused {
                            break;
                        }
                    }
                    Err(TickError::Busy) => {
                        warn!("auto-advance beat skipped, an advance is in progress");
                    }
                    Err(err) => {
                        warn!(error = %err, "auto-advance halted by tick failure");
                        handle.inner.control.stop_auto();
                        break;
                    }
                }
            }
            debug!("auto-advance task exited");
        });
    }
}
