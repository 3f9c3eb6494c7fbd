//! Error types for the planner.
//!
//! Uses `thiserror` for typed errors that surface through the planning
//! pipeline: template rendering, LLM calls, response extraction.

/// Errors that can occur while generating a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Failed to load or render a prompt template.
    #[error("template error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Backend(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
