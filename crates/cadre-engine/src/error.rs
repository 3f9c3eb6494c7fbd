//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and run execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cadre_core::config::ConfigError,
    },

    /// Clock restoration failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: cadre_core::clock::ClockError,
    },

    /// The tick pipeline or a lifecycle transition failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: cadre_core::tick::TickError,
    },

    /// A database operation failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: cadre_db::DbError,
    },

    /// The planner could not be constructed.
    #[error("planner error: {source}")]
    Planner {
        /// The underlying planner error.
        #[from]
        source: cadre_planner::PlannerError,
    },

    /// Signal handling or another OS interaction failed.
    #[error("io error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: std::io::Error,
    },
}
