//! Simulation lifecycle states and transitions.
//!
//! The lifecycle runs `Idle -> Running -> {Paused, Stopped}`, with
//! `Resetting` as a transient state during reset operations. Auto-pause
//! is evaluated after every advance: once no project is active and none
//! is upcoming, auto-advance stops on its own.

use cadre_types::LifecyclePhase;
use tracing::info;

use crate::projects::ProjectManager;

/// Errors from lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The requested transition is not valid from the current phase.
    #[error("invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// The current phase.
        from: LifecyclePhase,
        /// The requested phase.
        to: LifecyclePhase,
    },
}

/// Lifecycle state machine.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    phase: LifecyclePhase,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    /// Start in [`LifecyclePhase::Idle`].
    pub const fn new() -> Self {
        Self {
            phase: LifecyclePhase::Idle,
        }
    }

    /// The current phase.
    pub const fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Whether ticks may be advanced.
    pub const fn is_running(&self) -> bool {
        matches!(self.phase, LifecyclePhase::Running)
    }

    /// Transition to `Running`.
    ///
    /// Valid from `Idle` (a fresh start), `Paused` (resume), and
    /// `Resetting` (restart after reset).
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] from `Running` or
    /// `Stopped`.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            LifecyclePhase::Running,
            matches!(
                self.phase,
                LifecyclePhase::Idle | LifecyclePhase::Paused | LifecyclePhase::Resetting
            ),
        )
    }

    /// Transition to `Paused`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless `Running`.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            LifecyclePhase::Paused,
            matches!(self.phase, LifecyclePhase::Running),
        )
    }

    /// Transition to `Stopped`. Valid from any phase except `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when already stopped.
    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            LifecyclePhase::Stopped,
            !matches!(self.phase, LifecyclePhase::Stopped),
        )
    }

    /// Enter the transient `Resetting` phase. Valid from any phase.
    pub fn begin_reset(&mut self) {
        info!(from = ?self.phase, "lifecycle entering reset");
        self.phase = LifecyclePhase::Resetting;
    }

    /// Leave `Resetting` back to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless `Resetting`.
    pub fn finish_reset(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            LifecyclePhase::Idle,
            matches!(self.phase, LifecyclePhase::Resetting),
        )
    }

    /// Whether auto-advance should stop: true iff no project is active
    /// during `week` and no project starts after it.
    pub fn evaluate_auto_pause(&self, week: u32, projects: &ProjectManager) -> bool {
        projects.active_projects_for_week(week).is_empty() && !projects.has_future_project(week)
    }

    fn transition(&mut self, to: LifecyclePhase, valid: bool) -> Result<(), LifecycleError> {
        if !valid {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        info!(from = ?self.phase, to = ?to, "lifecycle transition");
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cadre_types::{Project, ProjectId};

    fn project(start_week: u32, duration_weeks: u32) -> Project {
        Project {
            id: ProjectId::new(),
            name: "p".to_owned(),
            summary: String::new(),
            start_week,
            duration_weeks,
            plan_text: None,
        }
    }

    #[test]
    fn normal_run_sequence() {
        let mut lc = LifecycleController::new();
        assert_eq!(lc.phase(), LifecyclePhase::Idle);
        lc.start().unwrap();
        assert!(lc.is_running());
        lc.pause().unwrap();
        lc.start().unwrap();
        lc.stop().unwrap();
        assert_eq!(lc.phase(), LifecyclePhase::Stopped);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut lc = LifecycleController::new();
        assert!(lc.pause().is_err());
        lc.start().unwrap();
        assert!(lc.start().is_err());
        lc.stop().unwrap();
        assert!(lc.stop().is_err());
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut lc = LifecycleController::new();
        lc.start().unwrap();
        lc.begin_reset();
        assert_eq!(lc.phase(), LifecyclePhase::Resetting);
        lc.finish_reset().unwrap();
        assert_eq!(lc.phase(), LifecyclePhase::Idle);
    }

    #[test]
    fn auto_pause_waits_for_future_projects() {
        let lc = LifecycleController::new();
        let mut pm = ProjectManager::new();
        pm.store(project(1, 2), Vec::new());
        pm.store(project(3, 2), Vec::new());

        // Week 3: the second project is active.
        assert!(!lc.evaluate_auto_pause(3, &pm));
        // Week 5: nothing active, nothing upcoming.
        assert!(lc.evaluate_auto_pause(5, &pm));
    }

    #[test]
    fn gap_week_does_not_auto_pause() {
        let lc = LifecycleController::new();
        let mut pm = ProjectManager::new();
        pm.store(project(1, 1), Vec::new());
        pm.store(project(4, 1), Vec::new());

        // Week 2 and 3 are idle, but a project is still upcoming.
        assert!(!lc.evaluate_auto_pause(2, &pm));
        assert!(!lc.evaluate_auto_pause(3, &pm));
        assert!(lc.evaluate_auto_pause(5, &pm));
    }
}
