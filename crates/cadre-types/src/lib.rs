//! Shared type definitions for the Cadre organization simulator.
//!
//! This crate is the single source of truth for all types used across the
//! Cadre workspace. It holds only data definitions; simulation behavior
//! lives in the downstream crates.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (statuses, channels, events, lifecycle)
//! - [`structs`] -- Core entity structs (workers, projects, messages, deltas)

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Channel, LifecyclePhase, SimEventType, SuppressionReason, WorkerStatus};
pub use ids::{CommId, EventId, MessageId, ProjectId, RoomId, WorkerId};
pub use structs::{
    ChatRoom, ClockState, DispatchedMessage, InboundMessage, ParticipationStat, PlanAdjustment,
    Project, ProjectAssignment, ScheduledCommunication, SimEvent, TickDelta, Worker, WorkerPlan,
};
