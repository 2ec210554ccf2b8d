//! Proposal and decision types exchanged between the round stages.
//!
//! A [`Proposal`] is one actor's goal and plan for a round. The merger folds
//! every proposal of a round into one [`Decision`]; the selector later picks
//! the best decision of a scene out of its round history.

use serde::{Deserialize, Serialize};

/// One actor's goal and plan for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Name of the proposing actor.
    pub actor: String,
    /// The goal the actor settled on. Empty when generation failed.
    pub goal: String,
    /// The actor's plan. Empty when generation failed.
    pub plan: String,
}

/// Where a decision came from.
///
/// Serialized as the fixed `merged` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// The merger's reduction of a full round of proposals.
    Merged,
}

impl core::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Merged => f.write_str("merged"),
        }
    }
}

/// A goal and plan the whole cast acts on.
///
/// Either field may be empty when the text oracle produced nothing usable;
/// consumers treat an empty field as unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Origin of the decision.
    pub source: DecisionSource,
    /// Merged goal text.
    pub goal: String,
    /// Merged plan text.
    pub plan: String,
}

impl Decision {
    /// A decision produced by the merger.
    pub fn merged(goal: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            source: DecisionSource::Merged,
            goal: goal.into(),
            plan: plan.into(),
        }
    }

    /// The goal, or `None` when unspecified.
    pub fn goal(&self) -> Option<&str> {
        non_blank(&self.goal)
    }

    /// The plan, or `None` when unspecified.
    pub fn plan(&self) -> Option<&str> {
        non_blank(&self.plan)
    }

    /// Whether both fields are unspecified.
    pub fn is_unspecified(&self) -> bool {
        self.goal().is_none() && self.plan().is_none()
    }
}

fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merged_decision_carries_sentinel_source() {
        let decision = Decision::merged("hold the line", "Mara bars the door.");
        assert_eq!(decision.source, DecisionSource::Merged);
        assert_eq!(decision.source.to_string(), "merged");
    }

    #[test]
    fn blank_fields_read_as_unspecified() {
        let decision = Decision::merged("  ", "");
        assert_eq!(decision.goal(), None);
        assert_eq!(decision.plan(), None);
        assert!(decision.is_unspecified());

        let partial = Decision::merged("", "Ivo lights the lamp.");
        assert!(!partial.is_unspecified());
        assert_eq!(partial.plan(), Some("Ivo lights the lamp."));
    }

    #[test]
    fn decision_serializes_with_merged_label() {
        let json = serde_json::to_value(Decision::merged("g", "p")).unwrap();
        assert_eq!(json["source"], "merged");
    }
}
