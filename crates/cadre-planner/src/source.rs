//! The LLM-backed [`PlanSource`] implementation.
//!
//! One planning call renders the worker's briefing, sends it to the
//! configured backend, and returns the plan prose. Timeouts and fallback
//! plans are the coordinator's job; this source only reports failure.

use cadre_core::config::LlmConfig;
use cadre_core::planning::{GeneratedPlan, PlanRequest, PlanSource, PlanSourceError};
use tracing::debug;

use crate::error::PlannerError;
use crate::llm::{PlannerBackend, create_backend};
use crate::prompt::{PromptEngine, planning_context};

/// A plan source that renders prompts and calls an LLM backend.
pub struct LlmPlanSource {
    engine: PromptEngine,
    backend: PlannerBackend,
}

impl LlmPlanSource {
    /// Create a source from LLM configuration, loading templates from
    /// the configured directory.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Template`] if a template is missing or
    /// malformed.
    pub fn new(config: &LlmConfig) -> Result<Self, PlannerError> {
        let engine = PromptEngine::new(&config.templates_dir)?;
        let backend = create_backend(config);
        Ok(Self { engine, backend })
    }

    /// Human-readable backend name for logging.
    pub const fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl PlanSource for LlmPlanSource {
    async fn generate(&self, request: &PlanRequest) -> Result<GeneratedPlan, PlanSourceError> {
        let context = planning_context(request);
        let prompt = self.engine.render(&context).map_err(|e| match e {
            PlannerError::Template(message) => PlanSourceError::Template(message),
            other => PlanSourceError::Backend(other.to_string()),
        })?;

        let completion = self
            .backend
            .complete(&prompt)
            .await
            .map_err(|e| PlanSourceError::Backend(e.to_string()))?;

        debug!(
            worker = %request.worker.name,
            backend = self.backend.name(),
            tokens = ?completion.tokens_used,
            "Generated plan"
        );

        Ok(GeneratedPlan {
            text: completion.text,
            tokens_used: completion.tokens_used,
        })
    }
}
