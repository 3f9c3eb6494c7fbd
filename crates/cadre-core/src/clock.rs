//! Simulation clock and calendar derivations.
//!
//! The clock is the single source of truth for all temporal state in the
//! simulation. One tick is one simulated minute. Day, week, and
//! minute-of-day are derived from the tick counter and the calendar
//! configuration -- never stored independently.
//!
//! # Design Principles
//!
//! - All temporal derivations use checked arithmetic (no silent overflow).
//! - The tick counter is monotonic; it only moves backwards through an
//!   explicit reset.

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid calendar configuration (e.g. zero ticks per day).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Simulation clock tracking the current tick and calendar position.
///
/// The clock advances once per tick. Day index, week number, and
/// minute-of-day are computed from the tick counter and the calendar
/// shape from [`TimeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// Current tick number (0-indexed).
    tick: u64,

    /// Ticks per simulated day.
    ticks_per_day: u64,

    /// Working days per simulated week.
    days_per_week: u64,
}

impl SimClock {
    /// Create a clock at tick 0 from the calendar configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if either calendar dimension
    /// is zero.
    pub fn new(config: &TimeConfig) -> Result<Self, ClockError> {
        Self::from_parts(0, config.ticks_per_day, config.days_per_week)
    }

    /// Create a clock from explicit parameters (state restoration and
    /// tests).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if either calendar dimension
    /// is zero.
    pub fn from_parts(tick: u64, ticks_per_day: u64, days_per_week: u64) -> Result<Self, ClockError> {
        if ticks_per_day == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "ticks_per_day must be at least 1".to_owned(),
            });
        }
        if days_per_week == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "days_per_week must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick,
            ticks_per_day,
            days_per_week,
        })
    }

    /// Current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Ticks per simulated day.
    pub const fn ticks_per_day(&self) -> u64 {
        self.ticks_per_day
    }

    /// Advance the clock by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Rewind to tick 0. Only reachable through an explicit reset.
    pub const fn reset(&mut self) {
        self.tick = 0;
    }

    /// Simulated day index (0-based).
    ///
    /// The constructor guarantees both calendar dimensions are nonzero,
    /// so the divisions here cannot panic.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn day_index(&self) -> u64 {
        self.tick / self.ticks_per_day
    }

    /// Minute within the current day (0-based).
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn minute_of_day(&self) -> u64 {
        self.tick % self.ticks_per_day
    }

    /// Whether this tick is the first minute of a day.
    pub const fn is_day_start(&self) -> bool {
        self.minute_of_day() == 0
    }

    /// Week number (1-based), used for project timeline evaluation.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn week(&self) -> u32 {
        let week0 = self.day_index() / self.days_per_week;
        // A run does not survive anywhere near u32::MAX weeks.
        #[allow(clippy::cast_possible_truncation)]
        let week0 = week0 as u32;
        week0.saturating_add(1)
    }

    /// Day within the current week (0-based).
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn day_of_week(&self) -> u64 {
        self.day_index() % self.days_per_week
    }

    /// The `HH:MM` rendering of the current minute, for prompts and logs.
    pub fn clock_time(&self) -> String {
        let minute = self.minute_of_day();
        format!("{:02}:{:02}", minute / 60, minute % 60)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn clock_at(tick: u64) -> SimClock {
        SimClock::from_parts(tick, 1440, 5).unwrap()
    }

    #[test]
    fn starts_at_tick_zero() {
        let config = TimeConfig::default();
        let clock = SimClock::new(&config).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.week(), 1);
        assert!(clock.is_day_start());
    }

    #[test]
    fn advance_increments() {
        let mut clock = clock_at(0);
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(SimClock::from_parts(0, 0, 5).is_err());
        assert!(SimClock::from_parts(0, 1440, 0).is_err());
    }

    #[test]
    fn day_and_minute_derivations() {
        let clock = clock_at(1500);
        assert_eq!(clock.day_index(), 1);
        assert_eq!(clock.minute_of_day(), 60);
        assert_eq!(clock.clock_time(), "01:00");
        assert!(!clock.is_day_start());
    }

    #[test]
    fn week_is_one_based() {
        // Day 0-4 -> week 1; day 5 -> week 2.
        assert_eq!(clock_at(0).week(), 1);
        assert_eq!(clock_at(1440 * 4).week(), 1);
        assert_eq!(clock_at(1440 * 5).week(), 2);
        assert_eq!(clock_at(1440 * 10).week(), 3);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut clock = SimClock::from_parts(u64::MAX, 1440, 5).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = clock_at(9000);
        clock.reset();
        assert_eq!(clock.tick(), 0);
    }
}
