//! Enumeration types for the Cadre organization simulator.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Worker status
// ---------------------------------------------------------------------------

/// The mutable availability status of a worker.
///
/// Statuses other than [`WorkerStatus::Working`] and
/// [`WorkerStatus::Overtime`] are usually temporary and carry an expiry tick
/// on the worker record; the tick pipeline clears them once expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Regular working hours.
    Working,
    /// Temporarily away from the desk (meetings, errands).
    Away,
    /// Outside working hours.
    OffDuty,
    /// Working beyond regular hours.
    Overtime,
    /// On sick leave, typically set by a sick-leave event.
    SickLeave,
    /// On planned vacation.
    Vacation,
}

impl WorkerStatus {
    /// Whether a worker in this status participates in planning this tick.
    ///
    /// Sick and vacationing workers still receive a planning call so they
    /// can hand off or defer work; off-duty workers do not plan at all.
    pub const fn plans(self) -> bool {
        !matches!(self, Self::OffDuty)
    }
}

// ---------------------------------------------------------------------------
// Communication channel
// ---------------------------------------------------------------------------

/// The channel a communication travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Asynchronous email with subject, cc, and bcc support.
    Email,
    /// Instant chat message, direct or to a group room.
    Chat,
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// The kind of a simulation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimEventType {
    /// A worker calls in sick; sets a temporary status override.
    SickLeave,
    /// A client requests a scope change on a project; targets the
    /// department head and is scoped to that project's collaborators.
    ClientChange,
    /// An operator-injected event with free-form payload.
    Custom,
}

// ---------------------------------------------------------------------------
// Lifecycle phases
// ---------------------------------------------------------------------------

/// The lifecycle phase of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Not yet started (no projects loaded).
    Idle,
    /// Ticks may advance.
    Running,
    /// Auto-advance halted; state retained; can resume.
    Paused,
    /// Run finalized; end-of-run report emitted.
    Stopped,
    /// Transient state while artifacts are being cleared.
    Resetting,
}

// ---------------------------------------------------------------------------
// Dispatch suppression
// ---------------------------------------------------------------------------

/// Why a scheduled communication was suppressed rather than dispatched.
///
/// Suppressions are expected behavior, not errors; they are logged at
/// debug level and counted in the dispatch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// An identical message (same channel, sender, recipient set, subject,
    /// and body) was already dispatched this tick.
    Duplicate,
    /// The sender contacted this recipient on this channel too recently.
    Cooldown,
    /// The directive's target could not be resolved to a known address.
    InvalidRecipient,
    /// The participation balancer gated the send for an over-active sender.
    Balanced,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_snake_case_serde() {
        let json = serde_json::to_string(&WorkerStatus::SickLeave).unwrap_or_default();
        assert_eq!(json, "\"sick_leave\"");
        let back: Result<WorkerStatus, _> = serde_json::from_str("\"off_duty\"");
        assert_eq!(back.ok(), Some(WorkerStatus::OffDuty));
    }

    #[test]
    fn event_type_snake_case_serde() {
        let json = serde_json::to_string(&SimEventType::ClientChange).unwrap_or_default();
        assert_eq!(json, "\"client_change\"");
    }

    #[test]
    fn off_duty_workers_do_not_plan() {
        assert!(WorkerStatus::Working.plans());
        assert!(WorkerStatus::SickLeave.plans());
        assert!(WorkerStatus::Vacation.plans());
        assert!(!WorkerStatus::OffDuty.plans());
    }

    #[test]
    fn channel_display() {
        assert_eq!(Channel::Email.to_string(), "email");
        assert_eq!(Channel::Chat.to_string(), "chat");
    }
}
