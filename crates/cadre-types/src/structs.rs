//! Core entity structs for the Cadre organization simulator.
//!
//! Everything in this module is plain data: identity records, timeline
//! records, communication payloads, and the end-of-tick persistence delta.
//! Behavior lives in `cadre-core` and `cadre-comms`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enums::{Channel, SimEventType, WorkerStatus};
use crate::ids::{CommId, EventId, MessageId, ProjectId, RoomId, WorkerId};

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// A worker in the simulated organization.
///
/// Identity fields (`id`, `name`, `role`, timezone, addresses) are immutable
/// after onboarding. Only `status` and `status_until_tick` change during a
/// run. Workers are never deleted, though a scenario may exclude them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker identifier.
    pub id: WorkerId,
    /// Display name, also the resolution key for send directives.
    pub name: String,
    /// Job role (e.g. "Backend Engineer").
    pub role: String,
    /// IANA timezone name for rendering local times in prompts.
    pub timezone: String,
    /// Email address used for the email channel.
    pub email: String,
    /// Chat handle used for the chat channel.
    pub chat_handle: String,
    /// Whether this worker is the department head (client-change events
    /// target the head).
    pub is_department_head: bool,
    /// Current availability status.
    pub status: WorkerStatus,
    /// Tick at which a temporary status expires, if any.
    pub status_until_tick: Option<u64>,
}

// ---------------------------------------------------------------------------
// Project and assignments
// ---------------------------------------------------------------------------

/// A project with a week-granular timeline window.
///
/// Active weeks are `[start_week, start_week + duration_weeks - 1]`
/// inclusive. Immutable once created except for plan regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: ProjectId,
    /// Short human-readable name (e.g. "alpha").
    pub name: String,
    /// One-paragraph summary fed into planning prompts.
    pub summary: String,
    /// First active week (1-based).
    pub start_week: u32,
    /// Number of active weeks (at least 1).
    pub duration_weeks: u32,
    /// The project plan prose, if one has been generated or supplied.
    pub plan_text: Option<String>,
}

impl Project {
    /// Last active week of this project (inclusive).
    ///
    /// Saturates rather than overflowing for degenerate durations.
    pub const fn end_week(&self) -> u32 {
        self.start_week
            .saturating_add(self.duration_weeks)
            .saturating_sub(1)
    }

    /// Whether this project is active during `week`.
    pub const fn is_active_in(&self, week: u32) -> bool {
        week >= self.start_week && week <= self.end_week()
    }
}

/// Membership row linking a worker to a project.
///
/// The `(project_id, worker_id)` pair is unique. A project with zero
/// assignment rows is an "unassigned" project: every active worker is an
/// implicit member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectAssignment {
    /// The project.
    pub project_id: ProjectId,
    /// The assigned worker.
    pub worker_id: WorkerId,
}

/// A per-project chat room, created when the project's window begins and
/// archived once it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Unique room identifier.
    pub id: RoomId,
    /// The project this room belongs to.
    pub project_id: ProjectId,
    /// Stable room key (e.g. "project-alpha"), the chat-channel address.
    pub room_key: String,
    /// Whether the room is currently active.
    pub is_active: bool,
    /// Tick at which the room was created.
    pub created_tick: u64,
    /// Tick at which the room was archived, if it has been.
    pub archived_tick: Option<u64>,
}

// ---------------------------------------------------------------------------
// Events and adjustments
// ---------------------------------------------------------------------------

/// An immutable simulation event, generated or injected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// The kind of event.
    pub event_type: SimEventType,
    /// Workers this event targets.
    pub target_worker_ids: Vec<WorkerId>,
    /// The project the event is scoped to, if any.
    pub project_id: Option<ProjectId>,
    /// The tick at which the event takes effect.
    pub at_tick: u64,
    /// Type-specific payload (e.g. `expected_extra_minutes`).
    pub payload: serde_json::Value,
    /// Real-world timestamp for the audit trail.
    pub created_at: DateTime<Utc>,
}

/// A short structured directive derived from an event, consumed by the next
/// plan-generation call for the affected worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAdjustment {
    /// The worker whose next plan must honor this adjustment.
    pub worker_id: WorkerId,
    /// The event this adjustment was derived from.
    pub source_event: EventId,
    /// One-line instruction injected into the planning context.
    pub directive: String,
}

// ---------------------------------------------------------------------------
// Communications
// ---------------------------------------------------------------------------

/// A communication parsed out of a worker's plan text, waiting for its
/// dispatch tick. Consumed exactly once by the communication hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCommunication {
    /// Unique identifier for this pending communication.
    pub id: CommId,
    /// The sending worker.
    pub sender: WorkerId,
    /// The tick at which this should be dispatched.
    pub tick: u64,
    /// The channel to send over.
    pub channel: Channel,
    /// The directive's target as written (worker name or group keyword).
    pub target: String,
    /// Email subject; `None` for chat.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// Carbon-copied targets (email only).
    pub cc: Vec<String>,
    /// Blind carbon-copied targets (email only).
    pub bcc: Vec<String>,
    /// Resolved thread root, if this continues a thread.
    pub thread_id: Option<MessageId>,
    /// The message this replies to, if any.
    pub reply_to: Option<MessageId>,
}

/// A message delivered to a worker's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The recipient worker.
    pub recipient: WorkerId,
    /// The sending worker.
    pub sender: WorkerId,
    /// The channel the message arrived on.
    pub channel: Channel,
    /// The delivery identifier, used when replying.
    pub message_id: MessageId,
    /// Email subject; `None` for chat.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// The tick the message was received.
    pub received_tick: u64,
    /// Whether the message asks for a reply; such messages surface first.
    pub needs_reply: bool,
    /// The tick a reply was sent, once one has been.
    pub replied_tick: Option<u64>,
}

/// A finalized message accepted by the delivery collaborator.
///
/// This is the simulator's own append-only record of what left the system;
/// the collaborator owns content storage and actual delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedMessage {
    /// Identifier returned by the delivery collaborator.
    pub id: MessageId,
    /// The tick the message was dispatched.
    pub tick: u64,
    /// The channel it was sent over.
    pub channel: Channel,
    /// The sending worker.
    pub sender: WorkerId,
    /// Resolved recipient addresses (to + cc + bcc), sorted.
    pub recipients: Vec<String>,
    /// Email subject; `None` for chat.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
    /// The thread this message belongs to, if threaded.
    pub thread_id: Option<MessageId>,
    /// The message this replied to, if any.
    pub reply_to: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// Participation and plans
// ---------------------------------------------------------------------------

/// One worker's communication volume for one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipationStat {
    /// The worker.
    pub worker_id: WorkerId,
    /// The simulated day index (0-based).
    pub day_index: u64,
    /// Emails sent this day.
    pub email_count: u32,
    /// Chat messages sent this day.
    pub chat_count: u32,
    /// Multiplicative send-probability modifier computed from team volume.
    pub probability_modifier: f64,
}

/// A worker's plan text for one simulated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPlan {
    /// The worker.
    pub worker_id: WorkerId,
    /// The simulated day index (0-based).
    pub day_index: u64,
    /// The tick the plan was generated.
    pub generated_tick: u64,
    /// The plan prose, including any embedded send directives.
    pub plan_text: String,
    /// Whether this plan came from the deterministic fallback template.
    pub from_fallback: bool,
}

// ---------------------------------------------------------------------------
// Clock state
// ---------------------------------------------------------------------------

/// Durable record of the simulation clock.
///
/// Singleton; mutated only by the tick scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    /// Current tick (one tick = one simulated minute).
    pub current_tick: u64,
    /// Whether the simulation is running.
    pub running: bool,
    /// Whether background auto-advance is enabled.
    pub auto_advance: bool,
}

// ---------------------------------------------------------------------------
// End-of-tick delta
// ---------------------------------------------------------------------------

/// Everything a completed tick changed, handed to the persistence boundary
/// as one unit.
///
/// The store must apply the whole delta atomically: either the tick counter
/// advances together with all of these effects, or none of them are visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickDelta {
    /// The tick these effects are attributed to.
    pub tick: u64,
    /// The clock state after this tick.
    pub clock: ClockState,
    /// Workers whose status changed this tick (full rows).
    pub workers: Vec<Worker>,
    /// Events generated or applied this tick.
    pub events: Vec<SimEvent>,
    /// Chat rooms created or archived this tick (full rows).
    pub rooms: Vec<ChatRoom>,
    /// Plans generated this tick.
    pub plans: Vec<WorkerPlan>,
    /// The full pending-communication set after this tick.
    pub pending: Vec<ScheduledCommunication>,
    /// Messages dispatched this tick (append-only).
    pub dispatched: Vec<DispatchedMessage>,
    /// The full post-tick inbound queue per worker.
    pub queues: BTreeMap<WorkerId, Vec<InboundMessage>>,
    /// Participation rows touched this tick.
    pub stats: Vec<ParticipationStat>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn project_window_is_inclusive() {
        let project = Project {
            id: ProjectId::new(),
            name: String::from("alpha"),
            summary: String::new(),
            start_week: 2,
            duration_weeks: 3,
            plan_text: None,
        };
        assert_eq!(project.end_week(), 4);
        assert!(!project.is_active_in(1));
        assert!(project.is_active_in(2));
        assert!(project.is_active_in(3));
        assert!(project.is_active_in(4));
        assert!(!project.is_active_in(5));
    }

    #[test]
    fn one_week_project_active_one_week() {
        let project = Project {
            id: ProjectId::new(),
            name: String::from("spike"),
            summary: String::new(),
            start_week: 7,
            duration_weeks: 1,
            plan_text: None,
        };
        assert_eq!(project.end_week(), 7);
        assert!(project.is_active_in(7));
        assert!(!project.is_active_in(8));
    }

    #[test]
    fn event_payload_roundtrip() {
        let event = SimEvent {
            id: EventId::new(),
            event_type: SimEventType::ClientChange,
            target_worker_ids: vec![WorkerId::new()],
            project_id: Some(ProjectId::new()),
            at_tick: 540,
            payload: serde_json::json!({ "expected_extra_minutes": 180 }),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn clock_state_defaults_stopped() {
        let clock = ClockState::default();
        assert_eq!(clock.current_tick, 0);
        assert!(!clock.running);
        assert!(!clock.auto_advance);
    }
}
