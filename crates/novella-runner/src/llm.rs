//! LLM backends and the text oracle built on them.
//!
//! Backends use enum dispatch over an OpenAI-compatible chat completions
//! client and an Anthropic Messages client, both over `reqwest`.
//! [`OracleClient`] wraps a backend with a per-request timeout and bounded
//! retry; once the retries are spent the failure is handed to the
//! simulation as failure text, never as an error.

use std::time::Duration;

use novella_core::config::LlmConfig;
use novella_core::oracle::{TextOracle, failure_text};
use rand::Rng;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend that turns a prompt into response text.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt to the LLM and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::LlmBackend`] if the HTTP call fails or the
    /// response cannot be extracted.
    pub async fn complete(&self, prompt: &str) -> Result<String, RunnerError> {
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

/// Sampling settings shared by both backends.
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f64,
    max_tokens: u32,
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    sampling: Sampling,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig, llm: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            sampling: Sampling {
                temperature: llm.temperature,
                max_tokens: llm.max_tokens,
            },
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, RunnerError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::LlmBackend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Authenticates with `x-api-key` and reads the reply from
/// `content[0].text`.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    sampling: Sampling,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig, llm: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            sampling: Sampling {
                temperature: llm.temperature,
                max_tokens: llm.max_tokens,
            },
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, RunnerError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "messages": [
                {"role": "user", "content": prompt}
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
            .map_err(|e| RunnerError::LlmBackend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::LlmBackend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            RunnerError::LlmBackend(format!("Anthropic response parse failed: {e}"))
        })?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend("Anthropic response missing content[0].text".to_owned())
        })
}

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig, llm: &LlmConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config, llm)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config, llm)),
    }
}

// ---------------------------------------------------------------------------
// Oracle client
// ---------------------------------------------------------------------------

/// [`TextOracle`] over an [`LlmBackend`] with timeout and bounded retry.
pub struct OracleClient {
    backend: LlmBackend,
    request_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OracleClient {
    /// Wrap `backend` with the retry budget from `llm`.
    pub const fn new(backend: LlmBackend, llm: &LlmConfig) -> Self {
        Self {
            backend,
            request_timeout: Duration::from_millis(llm.request_timeout_ms),
            max_retries: llm.max_retries,
            retry_backoff: Duration::from_millis(llm.retry_backoff_ms),
        }
    }

    /// Human-readable name of the wrapped backend.
    pub const fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// One call under the request timeout.
    async fn attempt(&self, prompt: &str) -> Result<String, RunnerError> {
        match timeout(self.request_timeout, self.backend.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(RunnerError::Timeout {
                timeout_ms: self.request_timeout.as_millis(),
            }),
        }
    }
}

impl TextOracle for OracleClient {
    async fn generate(&self, prompt: &str) -> String {
        let mut attempt = 0_u32;
        loop {
            match self.attempt(prompt).await {
                Ok(text) => {
                    debug!(
                        backend = self.backend.name(),
                        attempt,
                        response_len = text.len(),
                        "LLM call succeeded"
                    );
                    return text;
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = retry_delay(self.retry_backoff, attempt);
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => {
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        error = %e,
                        "LLM call failed, giving up"
                    );
                    return failure_text(e);
                }
            }
        }
    }
}

/// Exponential backoff for `attempt` (0-based) plus up to 50% jitter.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2_u32.saturating_pow(attempt));
    let half_ms = exponential.as_millis().checked_div(2).unwrap_or_default();
    let jitter_cap = u64::try_from(half_ms).unwrap_or(u64::MAX);
    let jitter_ms = if jitter_cap == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_cap)
    };
    exponential.saturating_add(Duration::from_millis(jitter_ms))
}
