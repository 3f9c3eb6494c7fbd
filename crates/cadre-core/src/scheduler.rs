//! Advance mutual exclusion and auto-advance control state.
//!
//! One advance runs at a time. A concurrent attempt fails fast with
//! `Busy` rather than queuing; the auto-advance timer uses the same
//! non-blocking attempt and skips a firing (with a warning) when the
//! previous tick has not finished. All control fields are atomics shared
//! between the tick task and the control surface, so the hot path takes
//! no locks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Summary of one `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Tick before the advance.
    pub start_tick: u64,
    /// Tick after the advance.
    pub end_tick: u64,
    /// Ticks actually executed.
    pub ticks_advanced: u64,
    /// Messages dispatched across the advance.
    pub dispatched: u64,
    /// Communications suppressed across the advance.
    pub suppressed: u64,
    /// Plans generated across the advance.
    pub plans_generated: u64,
    /// Whether auto-pause engaged at the end of the advance.
    pub auto_paused: bool,
}

/// Shared control state for the tick loop.
///
/// Wrapped in `Arc` by the simulation handle and shared with the
/// auto-advance task and the control surface.
#[derive(Debug, Default)]
pub struct ControlState {
    /// Whether an advance is currently in flight.
    busy: AtomicBool,
    /// Whether the auto-advance timer should keep firing.
    auto_running: AtomicBool,
    /// Auto-advance period in milliseconds (runtime-adjustable).
    auto_interval_ms: AtomicU64,
    /// Generation counter; stale auto tasks exit when it moves.
    auto_generation: AtomicU64,
}

impl ControlState {
    /// Fresh control state with auto-advance off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the single advance slot.
    ///
    /// Returns `None` when another advance is in flight. The returned
    /// guard releases the slot on drop, including on error paths.
    pub fn try_begin_advance(&self) -> Option<AdvanceGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(AdvanceGuard { control: self })
    }

    /// Whether an advance is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Turn the auto-advance timer on and return the generation token
    /// identifying this run of the timer.
    pub fn start_auto(&self, interval_ms: u64) -> u64 {
        self.auto_interval_ms
            .store(interval_ms.max(1), Ordering::Release);
        self.auto_running.store(true, Ordering::Release);
        self.auto_generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }

    /// Turn the auto-advance timer off. Any in-flight tick finishes; the
    /// timer stops before its next firing.
    pub fn stop_auto(&self) {
        self.auto_running.store(false, Ordering::Release);
    }

    /// Whether the auto task for `generation` should keep firing.
    pub fn auto_live(&self, generation: u64) -> bool {
        self.auto_running.load(Ordering::Acquire)
            && self.auto_generation.load(Ordering::Acquire) == generation
    }

    /// Whether any auto-advance timer is on.
    pub fn auto_running(&self) -> bool {
        self.auto_running.load(Ordering::Acquire)
    }

    /// Current auto-advance period.
    pub fn auto_interval_ms(&self) -> u64 {
        self.auto_interval_ms.load(Ordering::Acquire).max(1)
    }
}

/// RAII guard for the advance slot.
pub struct AdvanceGuard<'a> {
    control: &'a ControlState,
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.control.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_guard_at_a_time() {
        let control = ControlState::new();
        let guard = control.try_begin_advance();
        assert!(guard.is_some());
        assert!(control.try_begin_advance().is_none());
        assert!(control.is_busy());

        drop(guard);
        assert!(!control.is_busy());
        assert!(control.try_begin_advance().is_some());
    }

    #[test]
    fn guard_releases_on_early_drop() {
        let control = ControlState::new();
        {
            let _guard = control.try_begin_advance();
        }
        assert!(!control.is_busy());
    }

    #[test]
    fn auto_flags_toggle() {
        let control = ControlState::new();
        assert!(!control.auto_running());

        let generation = control.start_auto(250);
        assert!(control.auto_running());
        assert!(control.auto_live(generation));
        assert_eq!(control.auto_interval_ms(), 250);

        control.stop_auto();
        assert!(!control.auto_running());
        assert!(!control.auto_live(generation));
    }

    #[test]
    fn restart_invalidates_old_generation() {
        let control = ControlState::new();
        let first = control.start_auto(100);
        let second = control.start_auto(100);
        assert!(!control.auto_live(first));
        assert!(control.auto_live(second));
    }
}
