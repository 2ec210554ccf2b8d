//! Error types for the runner.
//!
//! Backend failures never reach the simulation as errors; the oracle client
//! turns them into failure text after its last attempt. What remains here
//! is configuration trouble and the per-attempt backend errors it logs.

/// Errors that can occur while configuring or calling an LLM backend.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The backend did not answer within the request timeout.
    #[error("LLM backend timed out after {timeout_ms} ms")]
    Timeout {
        /// The timeout that expired.
        timeout_ms: u128,
    },

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),
}
