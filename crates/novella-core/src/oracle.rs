//! The text-generation seam.
//!
//! Every collaborator that needs natural language goes through a
//! [`TextOracle`]. Generation is a black box that always answers with text:
//! a failed request comes back as text starting with [`FAILURE_PREFIX`]
//! rather than as an error, so callers decide per site whether a failure is
//! degraded output or fatal.

use std::future::Future;

use serde::Serialize;
use tracing::debug;

use crate::prompt::{PromptEngine, PromptError, Template};

/// Prefix carried by every failure response.
pub const FAILURE_PREFIX: &str = "generation failed:";

/// Fallible text generation.
///
/// Implementations must be shareable across the concurrent proposal tasks
/// of a round, hence the `Sync` bound and the `Send` future.
pub trait TextOracle: Sync {
    /// Generate a response for `prompt`.
    ///
    /// Never fails; failures are reported as text prefixed with
    /// [`FAILURE_PREFIX`].
    fn generate(&self, prompt: &str) -> impl Future<Output = String> + Send;
}

/// Format a failure response for `reason`.
pub fn failure_text(reason: impl core::fmt::Display) -> String {
    format!("{FAILURE_PREFIX} {reason}")
}

/// Whether `text` is a failure response.
pub fn is_failure(text: &str) -> bool {
    text.trim_start().starts_with(FAILURE_PREFIX)
}

/// An oracle paired with the prompt templates it is asked through.
///
/// The oracle-backed collaborators all hold one of these; it is two shared
/// borrows and therefore `Copy`.
#[derive(Debug)]
pub struct OracleContext<'a, O> {
    /// The text oracle.
    pub oracle: &'a O,
    /// The prompt templates.
    pub prompts: &'a PromptEngine,
}

impl<O> Clone for OracleContext<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O> Copy for OracleContext<'_, O> {}

impl<'a, O: TextOracle> OracleContext<'a, O> {
    /// Pair an oracle with a prompt engine.
    pub const fn new(oracle: &'a O, prompts: &'a PromptEngine) -> Self {
        Self { oracle, prompts }
    }

    /// Render `template` with `context` and ask the oracle.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] if the template fails to render. Generation
    /// failures are returned as failure text, not as errors.
    pub async fn ask<C: Serialize>(
        &self,
        template: Template,
        context: &C,
    ) -> Result<String, PromptError> {
        let prompt = self.prompts.render(template, context)?;
        debug!(
            template = template.name(),
            prompt_chars = prompt.chars().count(),
            "asking text oracle"
        );
        Ok(self.oracle.generate(&prompt).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_text_is_recognized() {
        let text = failure_text("connection reset");
        assert_eq!(text, "generation failed: connection reset");
        assert!(is_failure(&text));
        assert!(is_failure("  generation failed: timeout"));
    }

    #[test]
    fn ordinary_text_is_not_failure() {
        assert!(!is_failure("Goal: reach the tower"));
        assert!(!is_failure(""));
        assert!(!is_failure("the generation failed to impress"));
    }
}
