//! Event generation, injection, and planning adjustments.
//!
//! Events come from two places: callers inject them verbatim through the
//! control surface, and the generator rolls random ones from a seeded RNG.
//! Generation is deterministic given the same seed and roster: the per-tick
//! RNG is derived from `seed + tick`, and rolls happen in roster order.
//!
//! Applied events turn into [`PlanAdjustment`] directives consumed by the
//! next plan-generation call for each affected worker.

use std::collections::BTreeMap;

use cadre_types::{
    EventId, PlanAdjustment, SimEvent, SimEventType, Worker, WorkerId, WorkerStatus,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::EventsConfig;

/// A temporary status override produced by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOverride {
    /// The affected worker.
    pub worker_id: WorkerId,
    /// The status to apply.
    pub status: WorkerStatus,
    /// Tick at which the override expires.
    pub until_tick: u64,
}

/// Event generation and adjustment bookkeeping.
#[derive(Debug, Clone)]
pub struct EventSystem {
    config: EventsConfig,
    seed: u64,
    /// Injected events waiting for their effect tick.
    injected: Vec<SimEvent>,
    /// Adjustments waiting to be consumed by planning, per worker.
    adjustments: BTreeMap<WorkerId, Vec<PlanAdjustment>>,
}

impl EventSystem {
    /// Create an event system with the given generation seed.
    pub const fn new(config: EventsConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            injected: Vec::new(),
            adjustments: BTreeMap::new(),
        }
    }

    /// Store a caller-supplied event verbatim. It takes effect once the
    /// clock reaches its `at_tick`.
    pub fn inject(&mut self, event: SimEvent) {
        info!(event_id = %event.id, at_tick = event.at_tick, "event injected");
        self.injected.push(event);
    }

    /// Remove and return every injected event due at or before `tick`.
    pub fn take_due(&mut self, tick: u64) -> Vec<SimEvent> {
        let mut due = Vec::new();
        self.injected.retain(|e| {
            if e.at_tick <= tick {
                due.push(e.clone());
                false
            } else {
                true
            }
        });
        due
    }

    /// Roll random events for `tick`.
    ///
    /// Deterministic given the same seed, tick, and roster order. Sick
    /// leave is rolled per worker at each day start; a client change is
    /// rolled on the configured interval and targets the department head.
    pub fn generate_for_tick(
        &self,
        tick: u64,
        is_day_start: bool,
        workers: &[Worker],
    ) -> Vec<SimEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tick));
        let mut events = Vec::new();

        if is_day_start {
            for worker in workers {
                if !worker.status.plans() || worker.status == WorkerStatus::SickLeave {
                    continue;
                }
                if rng.random_bool(self.config.sick_leave_daily_chance.clamp(0.0, 1.0)) {
                    events.push(SimEvent {
                        id: EventId::new(),
                        event_type: SimEventType::SickLeave,
                        target_worker_ids: vec![worker.id],
                        project_id: None,
                        at_tick: tick,
                        payload: serde_json::json!({
                            "duration_ticks": self.config.sick_leave_duration_ticks,
                        }),
                        created_at: Utc::now(),
                    });
                }
            }
        }

        let interval = self.config.client_change_interval_ticks.max(1);
        let on_interval = tick > 0 && tick.checked_rem(interval) == Some(0);
        if on_interval && rng.random_bool(self.config.client_change_chance.clamp(0.0, 1.0)) {
            if let Some(head) = workers.iter().find(|w| w.is_department_head) {
                events.push(SimEvent {
                    id: EventId::new(),
                    event_type: SimEventType::ClientChange,
                    target_worker_ids: vec![head.id],
                    project_id: None,
                    at_tick: tick,
                    payload: serde_json::json!({
                        "expected_extra_minutes": self.config.client_change_extra_minutes,
                    }),
                    created_at: Utc::now(),
                });
            }
        }

        events
    }

    /// The status override an event implies, if any.
    pub fn status_override(&self, event: &SimEvent) -> Vec<StatusOverride> {
        if event.event_type != SimEventType::SickLeave {
            return Vec::new();
        }
        let duration = event
            .payload
            .get("duration_ticks")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(self.config.sick_leave_duration_ticks);
        event
            .target_worker_ids
            .iter()
            .map(|&worker_id| StatusOverride {
                worker_id,
                status: WorkerStatus::SickLeave,
                until_tick: event.at_tick.saturating_add(duration),
            })
            .collect()
    }

    /// Convert an event into planning adjustments for the affected workers
    /// and their collaborators, and queue them for the next planning pass.
    ///
    /// `collaborators` scopes the fan-out: only workers sharing a project
    /// with the target learn about it, preventing cross-project leakage.
    pub fn apply(&mut self, event: &SimEvent, roster: &[Worker], collaborators: &[WorkerId]) {
        let name_of = |id: WorkerId| {
            roster
                .iter()
                .find(|w| w.id == id)
                .map_or_else(|| "a colleague".to_owned(), |w| w.name.clone())
        };

        match event.event_type {
            SimEventType::SickLeave => {
                for &target in &event.target_worker_ids {
                    self.push_adjustment(PlanAdjustment {
                        worker_id: target,
                        source_event: event.id,
                        directive: "You are on sick leave today. Hand off anything urgent \
                                    and defer the rest of your tasks."
                            .to_owned(),
                    });
                    for &peer in collaborators {
                        if peer == target {
                            continue;
                        }
                        self.push_adjustment(PlanAdjustment {
                            worker_id: peer,
                            source_event: event.id,
                            directive: format!(
                                "{} is out sick today. Coordinate the handoff of their \
                                 urgent work.",
                                name_of(target)
                            ),
                        });
                    }
                }
            }
            SimEventType::ClientChange => {
                let extra = event
                    .payload
                    .get("expected_extra_minutes")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(self.config.client_change_extra_minutes);
                for &target in &event.target_worker_ids {
                    self.push_adjustment(PlanAdjustment {
                        worker_id: target,
                        source_event: event.id,
                        directive: format!(
                            "A client change request adds roughly {extra} minutes of work. \
                             Replan today and coordinate scope with your project team."
                        ),
                    });
                    for &peer in collaborators {
                        if peer == target {
                            continue;
                        }
                        self.push_adjustment(PlanAdjustment {
                            worker_id: peer,
                            source_event: event.id,
                            directive: format!(
                                "A client change request adds roughly {extra} minutes of \
                                 work to {}'s plate. Expect scope adjustments on the \
                                 shared project.",
                                name_of(target)
                            ),
                        });
                    }
                }
            }
            SimEventType::Custom => {
                let directive = event
                    .payload
                    .get("directive")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("An unplanned event needs your attention; adjust today's plan.")
                    .to_owned();
                for &target in &event.target_worker_ids {
                    self.push_adjustment(PlanAdjustment {
                        worker_id: target,
                        source_event: event.id,
                        directive: directive.clone(),
                    });
                }
            }
        }
    }

    /// Queue one adjustment.
    fn push_adjustment(&mut self, adjustment: PlanAdjustment) {
        self.adjustments
            .entry(adjustment.worker_id)
            .or_default()
            .push(adjustment);
    }

    /// Whether a worker has unconsumed adjustments.
    pub fn has_adjustments(&self, worker_id: WorkerId) -> bool {
        self.adjustments.contains_key(&worker_id)
    }

    /// Remove and return a worker's queued adjustments.
    pub fn take_adjustments(&mut self, worker_id: WorkerId) -> Vec<PlanAdjustment> {
        self.adjustments.remove(&worker_id).unwrap_or_default()
    }

    /// Drop all queued adjustments and pending injected events.
    pub fn clear(&mut self) {
        self.injected.clear();
        self.adjustments.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn worker(name: &str, head: bool) -> Worker {
        Worker {
            id: WorkerId::new(),
            name: name.to_owned(),
            role: "Engineer".to_owned(),
            timezone: "UTC".to_owned(),
            email: format!("{name}@cadre.test"),
            chat_handle: format!("@{name}"),
            is_department_head: head,
            status: WorkerStatus::Working,
            status_until_tick: None,
        }
    }

    fn system(seed: u64) -> EventSystem {
        EventSystem::new(EventsConfig::default(), seed)
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let roster = vec![worker("dana", true), worker("priya", false)];
        let a = system(7);
        let b = system(7);
        for tick in [0, 120, 1440, 2880] {
            let ea = a.generate_for_tick(tick, tick % 1440 == 0, &roster);
            let eb = b.generate_for_tick(tick, tick % 1440 == 0, &roster);
            assert_eq!(ea.len(), eb.len(), "tick {tick}");
            for (x, y) in ea.iter().zip(eb.iter()) {
                assert_eq!(x.event_type, y.event_type);
                assert_eq!(x.target_worker_ids, y.target_worker_ids);
            }
        }
    }

    #[test]
    fn injected_events_surface_at_their_tick() {
        let roster = vec![worker("dana", true)];
        let mut sys = system(1);
        sys.inject(SimEvent {
            id: EventId::new(),
            event_type: SimEventType::ClientChange,
            target_worker_ids: vec![roster[0].id],
            project_id: None,
            at_tick: 540,
            payload: serde_json::json!({ "expected_extra_minutes": 180 }),
            created_at: Utc::now(),
        });

        assert!(sys.take_due(539).is_empty());
        let due = sys.take_due(540);
        assert_eq!(due.len(), 1);
        assert!(sys.take_due(540).is_empty());
    }

    #[test]
    fn client_change_adjustment_mentions_the_extension() {
        let roster = vec![worker("dana", true)];
        let mut sys = system(1);
        let event = SimEvent {
            id: EventId::new(),
            event_type: SimEventType::ClientChange,
            target_worker_ids: vec![roster[0].id],
            project_id: None,
            at_tick: 540,
            payload: serde_json::json!({ "expected_extra_minutes": 180 }),
            created_at: Utc::now(),
        };
        sys.apply(&event, &roster, &[]);
        let adjustments = sys.take_adjustments(roster[0].id);
        assert_eq!(adjustments.len(), 1);
        assert!(adjustments[0].directive.contains("180 minutes"));
    }

    #[test]
    fn client_change_fans_out_to_collaborators_only() {
        let dana = worker("dana", true);
        let priya = worker("priya", false);
        let tom = worker("tom", false);
        let roster = vec![dana.clone(), priya.clone(), tom.clone()];
        let mut sys = system(1);
        let event = SimEvent {
            id: EventId::new(),
            event_type: SimEventType::ClientChange,
            target_worker_ids: vec![dana.id],
            project_id: None,
            at_tick: 540,
            payload: serde_json::json!({ "expected_extra_minutes": 180 }),
            created_at: Utc::now(),
        };
        // priya shares a project with dana; tom does not.
        sys.apply(&event, &roster, &[priya.id]);

        let peer = sys.take_adjustments(priya.id);
        assert_eq!(peer.len(), 1);
        assert!(peer[0].directive.contains("dana"));
        assert!(peer[0].directive.contains("180"));
        assert!(sys.take_adjustments(tom.id).is_empty());
    }

    #[test]
    fn sick_leave_sets_a_status_override() {
        let roster = vec![worker("dana", false)];
        let sys = system(1);
        let event = SimEvent {
            id: EventId::new(),
            event_type: SimEventType::SickLeave,
            target_worker_ids: vec![roster[0].id],
            project_id: None,
            at_tick: 1440,
            payload: serde_json::json!({ "duration_ticks": 1440 }),
            created_at: Utc::now(),
        };
        let overrides = sys.status_override(&event);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].status, WorkerStatus::SickLeave);
        assert_eq!(overrides[0].until_tick, 2880);
    }

    #[test]
    fn sick_leave_informs_collaborators_only() {
        let dana = worker("dana", false);
        let priya = worker("priya", false);
        let tom = worker("tom", false);
        let roster = vec![dana.clone(), priya.clone(), tom.clone()];
        let mut sys = system(1);
        let event = SimEvent {
            id: EventId::new(),
            event_type: SimEventType::SickLeave,
            target_worker_ids: vec![dana.id],
            project_id: None,
            at_tick: 0,
            payload: serde_json::json!({}),
            created_at: Utc::now(),
        };
        // Only priya shares a project with dana.
        sys.apply(&event, &roster, &[priya.id]);
        assert!(sys.has_adjustments(dana.id));
        assert!(sys.has_adjustments(priya.id));
        assert!(!sys.has_adjustments(tom.id));
        assert!(sys.take_adjustments(priya.id)[0].directive.contains("dana"));
    }
}
