//! LLM-backed plan generation for the Cadre organization simulator.
//!
//! Implements [`cadre_core::planning::PlanSource`] over HTTP LLM
//! backends: prompts are rendered from on-disk `minijinja` templates,
//! sent to an OpenAI-compatible or Anthropic endpoint, and the returned
//! prose becomes the worker's plan for the day. Directive scanning,
//! timeouts, and fallback plans all happen upstream in `cadre-core`.
//!
//! # Modules
//!
//! - [`llm`]: backend enum dispatch over `reqwest`
//! - [`prompt`]: template loading, rendering, and context building
//! - [`source`]: the [`LlmPlanSource`] glue
//! - [`error`]: the [`PlannerError`] type

pub mod error;
pub mod llm;
pub mod prompt;
pub mod source;

pub use error::PlannerError;
pub use llm::{Completion, PlannerBackend, create_backend};
pub use prompt::{PromptEngine, RenderedPrompt, planning_context};
pub use source::LlmPlanSource;
