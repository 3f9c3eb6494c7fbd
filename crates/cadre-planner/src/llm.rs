//! LLM backend abstraction and implementations.
//!
//! Defines an enum-based dispatch for LLM backends, avoiding the
//! dyn-compatibility issues with async trait methods. Concrete
//! implementations exist for OpenAI-compatible APIs and the Anthropic
//! Messages API. All backends communicate over HTTP via `reqwest`.
//!
//! The planner does not care which model is behind the API. It sends a
//! prompt and expects plan prose back, optionally carrying embedded
//! send directives that the communication hub scans afterwards.

use cadre_core::config::{BackendType, LlmConfig};

use crate::error::PlannerError;
use crate::prompt::RenderedPrompt;

// ---------------------------------------------------------------------------
// Unified backend enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// A completion returned by a backend.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The plan prose.
    pub text: String,
    /// Total tokens the backend reported consuming, when known.
    pub tokens_used: Option<u32>,
}

/// An LLM backend that can process a prompt and return plan prose.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum PlannerBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl PlannerBackend {
    /// Send a prompt to the LLM and return the completion.
    ///
    /// Dispatches to the concrete backend implementation.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Backend`] if the HTTP call fails or the
    /// response cannot be extracted.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, PlannerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Send a prompt and return the completion.
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, PlannerError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.7,
            "max_tokens": self.max_tokens
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PlannerError::Backend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(PlannerError::Backend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PlannerError::Backend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_completion(&json)
    }
}

/// Extract text and usage from an `OpenAI` chat completions response.
fn extract_openai_completion(json: &serde_json::Value) -> Result<Completion, PlannerError> {
    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            PlannerError::Backend(
                "OpenAI response missing choices[0].message.content".to_owned(),
            )
        })?;

    let tokens_used = json
        .get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(serde_json::Value::as_u64)
        .and_then(|t| u32::try_from(t).ok());

    Ok(Completion { text, tokens_used })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from `OpenAI`:
/// - Uses `x-api-key` header instead of `Authorization: Bearer`
/// - Messages array does not include system (system is a top-level field)
/// - Response structure differs: `content[0].text`
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Send a prompt and return the completion.
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, PlannerError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PlannerError::Backend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(PlannerError::Backend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PlannerError::Backend(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_completion(&json)
    }
}

/// Extract text and usage from an Anthropic Messages API response.
fn extract_anthropic_completion(json: &serde_json::Value) -> Result<Completion, PlannerError> {
    let text = json
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            PlannerError::Backend("Anthropic response missing content[0].text".to_owned())
        })?;

    let usage = json.get("usage");
    let tokens_used = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(serde_json::Value::as_u64)
        .zip(
            usage
                .and_then(|u| u.get("output_tokens"))
                .and_then(serde_json::Value::as_u64),
        )
        .map(|(input, output)| input.saturating_add(output))
        .and_then(|t| u32::try_from(t).ok());

    Ok(Completion { text, tokens_used })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
///
/// Dispatches to [`OpenAiBackend`] or [`AnthropicBackend`] based on the
/// configured [`BackendType`].
pub fn create_backend(config: &LlmConfig) -> PlannerBackend {
    match config.backend {
        BackendType::OpenAi => PlannerBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => PlannerBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extract_openai_completion_with_usage() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "09:00 standup.\nEmail at 09:30 to Grace Park: notes ready."
                }
            }],
            "usage": {"prompt_tokens": 310, "completion_tokens": 90, "total_tokens": 400}
        });
        let completion = extract_openai_completion(&json).unwrap();
        assert!(completion.text.contains("standup"));
        assert_eq!(completion.tokens_used, Some(400));
    }

    #[test]
    fn extract_openai_completion_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        assert!(extract_openai_completion(&json).is_err());
    }

    #[test]
    fn extract_anthropic_completion_sums_usage() {
        let json = serde_json::json!({
            "content": [{
                "type": "text",
                "text": "Morning: deep work on atlas."
            }],
            "usage": {"input_tokens": 250, "output_tokens": 75}
        });
        let completion = extract_anthropic_completion(&json).unwrap();
        assert!(completion.text.contains("atlas"));
        assert_eq!(completion.tokens_used, Some(325));
    }

    #[test]
    fn extract_anthropic_completion_missing_content() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_completion(&json).is_err());
    }

    #[test]
    fn anthropic_usage_is_optional() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "Plan."}]
        });
        let completion = extract_anthropic_completion(&json).unwrap();
        assert_eq!(completion.tokens_used, None);
    }

    #[test]
    fn create_backend_dispatches_correctly() {
        let openai = LlmConfig {
            backend: BackendType::OpenAi,
            ..LlmConfig::default()
        };
        assert_eq!(create_backend(&openai).name(), "openai-compatible");

        let anthropic = LlmConfig {
            backend: BackendType::Anthropic,
            ..openai
        };
        assert_eq!(create_backend(&anthropic).name(), "anthropic");
    }
}
