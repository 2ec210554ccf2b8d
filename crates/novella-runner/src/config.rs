//! Backend configuration for the runner.
//!
//! Credentials and the backend choice come from environment variables so
//! they never end up in `novella.yaml`. Everything else (paths, retry
//! budget, logging) lives in the YAML file named by `NOVELLA_CONFIG`.

use std::path::PathBuf;

use crate::error::RunnerError;

/// Default path of the simulation config file.
const DEFAULT_CONFIG_PATH: &str = "novella.yaml";

/// Runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the simulation config file.
    pub config_path: PathBuf,
    /// LLM backend configuration.
    pub backend: LlmBackendConfig,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as accepted in `LLM_BACKEND`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self, RunnerError> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `LLM_BACKEND` -- backend type (`openai`, `deepseek`, `ollama`, `anthropic`)
    /// - `LLM_API_URL` -- API base URL
    /// - `LLM_API_KEY` -- API key
    /// - `LLM_MODEL` -- model name
    ///
    /// Optional variables:
    /// - `NOVELLA_CONFIG` -- path to the simulation config (default `novella.yaml`)
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] when a required variable is missing
    /// or the backend type is unknown.
    pub fn from_env() -> Result<Self, RunnerError> {
        let backend_type = BackendType::parse(&env_var("LLM_BACKEND")?)?;
        let backend = LlmBackendConfig {
            backend_type,
            api_url: env_var("LLM_API_URL")?,
            api_key: env_var("LLM_API_KEY")?,
            model: env_var("LLM_MODEL")?,
        };
        let config_path = std::env::var("NOVELLA_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())
            .into();

        Ok(Self {
            config_path,
            backend,
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, RunnerError> {
    std::env::var(name)
        .map_err(|e| RunnerError::Config(format!("missing required env var {name}: {e}")))
}
