//! Core simulation engine for Cadre: the tick cycle and every subsystem
//! it drives.
//!
//! The engine advances a simulated organization one minute per tick.
//! Workers plan their day through an external text-generation
//! collaborator, embed send directives in their plans, and communicate
//! over email and chat channels subject to dedup, cooldown, and
//! participation-balancing rules. Everything is deterministic for a
//! given seed and plan-source output.
//!
//! # Modules
//!
//! - [`clock`] -- [`clock::SimClock`]: tick counter and derived calendar
//! - [`config`] -- YAML configuration with env overrides
//! - [`lifecycle`] -- run phase transitions and auto-pause
//! - [`events`] -- seeded and injected events, planning adjustments
//! - [`projects`] -- project timeline, assignments, chat-room sync
//! - [`registry`] -- per-worker inbound queues
//! - [`planning`] -- bounded-parallel plan generation with fallback
//! - [`balancer`] -- daily send-volume accounting and probability gates
//! - [`scheduler`] -- advance permit and auto-advance control state
//! - [`tick`] -- [`tick::SimCore`], the phased tick pipeline, and the
//!   [`tick::Simulation`] handle

pub mod balancer;
pub mod clock;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod planning;
pub mod projects;
pub mod registry;
pub mod scheduler;
pub mod tick;

// Re-export the primary surface at crate root for convenience.
pub use balancer::{ParticipationBalancer, VolumeStanding};
pub use clock::{ClockError, SimClock};
pub use config::{ConfigError, SimulationConfig};
pub use events::EventSystem;
pub use lifecycle::{LifecycleController, LifecycleError};
pub use planning::{
    ContextSnapshot, GeneratedPlan, PlanOutcome, PlanRequest, PlanSource, PlanSourceError,
    PlanningCoordinator, PlanningError, StubPlanSource, fallback_plan,
};
pub use projects::ProjectManager;
pub use registry::WorkerRuntimeRegistry;
pub use scheduler::{AdvanceResult, ControlState};
pub use tick::{
    NoopPersister, PersistError, RunTotals, SimCore, Simulation, TickError, TickPersister,
    TickSummary,
};
