//! Planning coordination: snapshot, bounded fan-out, sequential apply.
//!
//! Each tick, workers who need a new plan are planned concurrently against
//! one immutable [`ContextSnapshot`] shared read-only by every task. The
//! fan-out is bounded by a configurable pool size; size 1 degrades to
//! strictly sequential execution for deterministic debugging. Results are
//! returned in request order so the caller applies them sequentially --
//! no two results are ever merged concurrently.
//!
//! A failed or timed-out call is isolated to its worker: it falls back to
//! a deterministic template plan unless strict mode is configured, in
//! which case the whole advance aborts.

use std::sync::Arc;
use std::time::Duration;

use cadre_types::{InboundMessage, PlanAdjustment, Project, Worker, WorkerId};
use futures::StreamExt;
use futures::stream;
use tracing::warn;

use crate::config::PlanningConfig;

/// Errors from a plan source.
#[derive(Debug, thiserror::Error)]
pub enum PlanSourceError {
    /// The backend returned an error or was unreachable.
    #[error("plan backend error: {0}")]
    Backend(String),

    /// The prompt could not be rendered.
    #[error("prompt render error: {0}")]
    Template(String),
}

/// Errors from the coordinator as a whole.
#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    /// A worker's planning call failed in strict mode.
    #[error("planning failed for {worker_id} in strict mode: {message}")]
    Strict {
        /// The worker whose call failed.
        worker_id: WorkerId,
        /// Description of the failure.
        message: String,
    },
}

/// Immutable per-tick context shared read-only by all planning tasks.
///
/// Built once per tick from current state; never mutated afterwards, so
/// the parallel phase needs no locks and no store access.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Simulated day index.
    pub day_index: u64,
    /// Current week (1-based).
    pub week: u32,
    /// The `HH:MM` rendering of the current minute.
    pub clock_time: String,
    /// The full worker roster.
    pub roster: Vec<Worker>,
    /// Projects active this week.
    pub active_projects: Vec<Project>,
}

/// One worker's planning request.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// The worker to plan for.
    pub worker: Worker,
    /// The shared context snapshot.
    pub snapshot: Arc<ContextSnapshot>,
    /// Names of this worker's collaborators this week.
    pub collaborator_names: Vec<String>,
    /// Event adjustments the plan must honor.
    pub adjustments: Vec<PlanAdjustment>,
    /// Messages drained from the worker's inbound queue.
    pub inbox: Vec<InboundMessage>,
    /// Balancer nudge for workers far above or below the team's send
    /// volume, rendered into the briefing.
    pub participation_hint: Option<String>,
}

/// A plan produced by a source.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    /// The plan prose, possibly containing embedded send directives.
    pub text: String,
    /// Tokens the backend reported consuming, when known.
    pub tokens_used: Option<u32>,
}

/// One worker's planning outcome after fallback handling.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// The worker planned for.
    pub worker_id: WorkerId,
    /// The plan text to store and scan for directives.
    pub text: String,
    /// Whether the deterministic fallback produced this plan.
    pub from_fallback: bool,
}

/// A source of generated plans.
///
/// Implementations call the external text-generation collaborator. The
/// returned future must be `Send` because planning fans out inside a
/// spawned tick task.
pub trait PlanSource {
    /// Generate a plan for one worker.
    fn generate(
        &self,
        request: &PlanRequest,
    ) -> impl Future<Output = Result<GeneratedPlan, PlanSourceError>> + Send;
}

/// A stub source returning an empty schedule, for exercising the tick
/// cycle without a backend.
#[derive(Debug, Clone, Default)]
pub struct StubPlanSource;

impl StubPlanSource {
    /// Create a new stub source.
    pub const fn new() -> Self {
        Self
    }
}

impl PlanSource for StubPlanSource {
    async fn generate(&self, request: &PlanRequest) -> Result<GeneratedPlan, PlanSourceError> {
        Ok(GeneratedPlan {
            text: format!(
                "Focus on {} work and keep the inbox clear.",
                request
                    .snapshot
                    .active_projects
                    .first()
                    .map_or("project", |p| p.name.as_str())
            ),
            tokens_used: None,
        })
    }
}

/// Bounded-parallel planning over a shared snapshot.
#[derive(Debug, Clone)]
pub struct PlanningCoordinator {
    config: PlanningConfig,
}

impl PlanningCoordinator {
    /// Create a coordinator from planning configuration.
    pub const fn new(config: PlanningConfig) -> Self {
        Self { config }
    }

    /// Plan every request concurrently, bounded by the pool size, and
    /// return outcomes in request order.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::Strict`] when a call fails and strict
    /// mode is configured. Otherwise failures fall back to the template
    /// plan and never block other workers.
    pub async fn run<S: PlanSource + Sync>(
        &self,
        source: &S,
        requests: Vec<PlanRequest>,
    ) -> Result<Vec<PlanOutcome>, PlanningError> {
        let timeout = Duration::from_millis(self.config.timeout_ms.max(1));
        let pool = self.config.pool_size.max(1);

        let mut completed: Vec<(usize, PlanRequest, Result<GeneratedPlan, String>)> =
            stream::iter(requests.into_iter().enumerate())
                .map(|(index, request)| async move {
                    let result =
                        match tokio::time::timeout(timeout, source.generate(&request)).await {
                            Ok(Ok(plan)) => Ok(plan),
                            Ok(Err(e)) => Err(e.to_string()),
                            Err(_) => Err(format!(
                                "planning call exceeded {}ms",
                                timeout.as_millis()
                            )),
                        };
                    (index, request, result)
                })
                .buffer_unordered(pool)
                .collect()
                .await;

        // Completion order varies with the pool; apply order must not.
        completed.sort_by_key(|(index, _, _)| *index);

        let mut outcomes = Vec::with_capacity(completed.len());
        for (_, request, result) in completed {
            match result {
                Ok(plan) => outcomes.push(PlanOutcome {
                    worker_id: request.worker.id,
                    text: plan.text,
                    from_fallback: false,
                }),
                Err(message) => {
                    if self.config.strict {
                        return Err(PlanningError::Strict {
                            worker_id: request.worker.id,
                            message,
                        });
                    }
                    warn!(
                        worker_id = %request.worker.id,
                        error = %message,
                        "planning call failed, using fallback plan"
                    );
                    outcomes.push(PlanOutcome {
                        worker_id: request.worker.id,
                        text: fallback_plan(&request),
                        from_fallback: true,
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

/// The deterministic template plan used when a planning call fails.
///
/// Derived only from the request, so retries and replays produce the
/// same text. It schedules no communications.
pub fn fallback_plan(request: &PlanRequest) -> String {
    let mut plan = format!(
        "Day plan for {} ({}).\n",
        request.worker.name, request.worker.role
    );
    if let Some(project) = request.snapshot.active_projects.first() {
        plan.push_str(&format!("Morning: continue work on {}.\n", project.name));
    } else {
        plan.push_str("Morning: clear backlog and documentation.\n");
    }
    for adjustment in &request.adjustments {
        plan.push_str(&format!("Note: {}\n", adjustment.directive));
    }
    if !request.inbox.is_empty() {
        plan.push_str(&format!(
            "Afternoon: work through {} unread message(s).\n",
            request.inbox.len()
        ));
    }
    plan.push_str("End of day: summarize progress.\n");
    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use cadre_types::WorkerStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn worker(name: &str) -> Worker {
        Worker {
            id: WorkerId::new(),
            name: name.to_owned(),
            role: "Engineer".to_owned(),
            timezone: "UTC".to_owned(),
            email: format!("{name}@cadre.test"),
            chat_handle: format!("@{name}"),
            is_department_head: false,
            status: WorkerStatus::Working,
            status_until_tick: None,
        }
    }

    fn request(worker: Worker, snapshot: &Arc<ContextSnapshot>) -> PlanRequest {
        PlanRequest {
            worker,
            snapshot: Arc::clone(snapshot),
            collaborator_names: Vec::new(),
            adjustments: Vec::new(),
            inbox: Vec::new(),
            participation_hint: None,
        }
    }

    /// Fails for one named worker, succeeds for everyone else.
    struct FlakySource {
        fail_for: String,
        calls: AtomicU32,
    }

    impl PlanSource for FlakySource {
        async fn generate(&self, request: &PlanRequest) -> Result<GeneratedPlan, PlanSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.worker.name == self.fail_for {
                Err(PlanSourceError::Backend("boom".to_owned()))
            } else {
                Ok(GeneratedPlan {
                    text: format!("plan for {}", request.worker.name),
                    tokens_used: Some(10),
                })
            }
        }
    }

    fn coordinator(pool_size: usize, strict: bool) -> PlanningCoordinator {
        PlanningCoordinator::new(PlanningConfig {
            pool_size,
            timeout_ms: 5000,
            strict,
        })
    }

    #[tokio::test]
    async fn outcomes_keep_request_order() {
        let snapshot = Arc::new(ContextSnapshot::default());
        let names = ["a", "b", "c", "d", "e"];
        let requests: Vec<PlanRequest> = names
            .iter()
            .map(|n| request(worker(n), &snapshot))
            .collect();
        let ids: Vec<WorkerId> = requests.iter().map(|r| r.worker.id).collect();

        let outcomes = coordinator(4, false)
            .run(&StubPlanSource::new(), requests)
            .await
            .unwrap();
        let out_ids: Vec<WorkerId> = outcomes.iter().map(|o| o.worker_id).collect();
        assert_eq!(out_ids, ids);
    }

    #[tokio::test]
    async fn pool_sizes_produce_identical_outcomes() {
        let snapshot = Arc::new(ContextSnapshot {
            tick: 540,
            day_index: 0,
            week: 1,
            clock_time: "09:00".to_owned(),
            roster: Vec::new(),
            active_projects: Vec::new(),
        });
        let workers: Vec<Worker> = ["a", "b", "c", "d"].iter().map(|n| worker(n)).collect();

        let sequential: Vec<PlanRequest> = workers
            .iter()
            .map(|w| request(w.clone(), &snapshot))
            .collect();
        let parallel = sequential.clone();

        let one = coordinator(1, false)
            .run(&StubPlanSource::new(), sequential)
            .await
            .unwrap();
        let four = coordinator(4, false)
            .run(&StubPlanSource::new(), parallel)
            .await
            .unwrap();

        assert_eq!(one.len(), four.len());
        for (a, b) in one.iter().zip(four.iter()) {
            assert_eq!(a.worker_id, b.worker_id);
            assert_eq!(a.text, b.text);
        }
    }

    #[tokio::test]
    async fn one_failure_falls_back_without_blocking_others() {
        let snapshot = Arc::new(ContextSnapshot::default());
        let requests: Vec<PlanRequest> = ["a", "b", "c"]
            .iter()
            .map(|n| request(worker(n), &snapshot))
            .collect();

        let source = FlakySource {
            fail_for: "b".to_owned(),
            calls: AtomicU32::new(0),
        };
        let outcomes = coordinator(3, false).run(&source, requests).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].from_fallback);
        assert!(outcomes[1].from_fallback);
        assert!(!outcomes[2].from_fallback);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn strict_mode_propagates_the_failure() {
        let snapshot = Arc::new(ContextSnapshot::default());
        let requests = vec![request(worker("a"), &snapshot)];
        let source = FlakySource {
            fail_for: "a".to_owned(),
            calls: AtomicU32::new(0),
        };
        let result = coordinator(1, true).run(&source, requests).await;
        assert!(matches!(result, Err(PlanningError::Strict { .. })));
    }

    #[tokio::test]
    async fn fallback_plan_is_deterministic() {
        let snapshot = Arc::new(ContextSnapshot::default());
        let w = worker("dana");
        let a = fallback_plan(&request(w.clone(), &snapshot));
        let b = fallback_plan(&request(w, &snapshot));
        assert_eq!(a, b);
        assert!(a.contains("Day plan for dana"));
    }
}
