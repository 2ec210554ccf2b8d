//! Proposal merging.
//!
//! The [`Merger`] asks the oracle once per round to fold every proposal
//! into a single goal and plan. The response is free text; [`MergeParser`]
//! pulls the two fields out of it line by line and never fails. A response
//! it cannot read yields a decision with empty fields.

use novella_types::{Decision, Proposal, SceneId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::prompt::Template;

#[derive(Debug, Serialize)]
struct MergePrompt<'a> {
    proposals: &'a [Proposal],
}

/// Folds a round of proposals into one decision.
#[derive(Debug)]
pub struct Merger<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<'a, O: TextOracle> Merger<'a, O> {
    /// A merger that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }

    /// Merge `proposals` into one decision with the `merged` source.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::EmptyProposals`] for an empty slice and
    /// [`SimulationError::Prompt`] if the prompt cannot be rendered.
    pub async fn merge(
        &self,
        scene_id: &SceneId,
        proposals: &[Proposal],
    ) -> Result<Decision, SimulationError> {
        if proposals.is_empty() {
            return Err(SimulationError::EmptyProposals);
        }

        let response = self.ctx.ask(Template::Merge, &MergePrompt { proposals }).await?;
        if is_failure(&response) {
            warn!(
                scene_id = %scene_id,
                response = %response,
                "merge generation failed, decision left unspecified"
            );
            return Ok(Decision::merged("", ""));
        }

        let decision = MergeParser::parse(&response);
        if decision.goal().is_none() {
            warn!(scene_id = %scene_id, "merge response carried no goal");
        }
        if decision.plan().is_none() {
            warn!(scene_id = %scene_id, "merge response carried no plan");
        }
        debug!(
            scene_id = %scene_id,
            proposals = proposals.len(),
            "proposals merged"
        );
        Ok(decision)
    }
}

/// Extracts the merged goal and plan from a merge response.
///
/// Rules:
/// - a line is a goal line when it contains `goal:`, and a plan line when it
///   contains `plan:` (ASCII case-insensitive); leading `*`, `_`, `#`, `-`
///   and spaces are ignored, so `**Goal:** ...` is read as well;
/// - a line carrying both markers is a goal line;
/// - the field is the trimmed text after the marker; when that is empty the
///   next non-blank, non-marker line is taken instead;
/// - when a marker occurs on several lines the last occurrence wins;
/// - a missing marker leaves the field empty.
#[derive(Debug, Clone, Copy)]
pub struct MergeParser;

impl MergeParser {
    const GOAL: &str = "goal:";
    const PLAN: &str = "plan:";

    /// Parse `response` into a merged decision.
    pub fn parse(response: &str) -> Decision {
        let lines: Vec<&str> = response.lines().collect();
        let mut goal = String::new();
        let mut plan = String::new();

        for (index, line) in lines.iter().enumerate() {
            let following = lines.get(index.saturating_add(1)..).unwrap_or_default();
            if let Some(value) = Self::field(line, Self::GOAL, following) {
                goal = value;
            } else if let Some(value) = Self::field(line, Self::PLAN, following) {
                plan = value;
            }
        }

        Decision::merged(goal, plan)
    }

    /// The field value if `line` carries `marker`.
    fn field(line: &str, marker: &str, following: &[&str]) -> Option<String> {
        let lowered = line.to_ascii_lowercase();
        let position = lowered.find(marker)?;
        // ASCII lowering keeps byte offsets, so the position indexes `line`.
        let after = line.get(position.saturating_add(marker.len())..)?;
        let value = clean(after);
        if !value.is_empty() {
            return Some(value.to_owned());
        }
        let continuation = following
            .iter()
            .map(|next| clean(next))
            .find(|next| !next.is_empty())
            .filter(|next| !Self::is_marker_line(next))
            .unwrap_or_default();
        Some(continuation.to_owned())
    }

    fn is_marker_line(line: &str) -> bool {
        let lowered = line.to_ascii_lowercase();
        lowered.contains(Self::GOAL) || lowered.contains(Self::PLAN)
    }
}

/// Trim whitespace and markdown emphasis around a field.
fn clean(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '#' | '-' | '>'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use novella_types::DecisionSource;

    use super::*;
    use crate::oracle::failure_text;
    use crate::prompt::PromptEngine;

    #[test]
    fn parses_both_markers() {
        let decision = MergeParser::parse(
            "Goal: Restore the lamp together\nPlan: Mara climbs the stairs while Ivo holds the door.",
        );
        assert_eq!(decision.source, DecisionSource::Merged);
        assert_eq!(decision.goal, "Restore the lamp together");
        assert_eq!(decision.plan, "Mara climbs the stairs while Ivo holds the door.");
    }

    #[test]
    fn missing_goal_marker_yields_empty_goal() {
        let decision = MergeParser::parse("Some preamble\nPlan: Ivo lights the fire.");
        assert_eq!(decision.goal, "");
        assert_eq!(decision.plan, "Ivo lights the fire.");
    }

    #[test]
    fn no_markers_yield_unspecified_decision() {
        let decision = MergeParser::parse("I would rather not merge these.");
        assert!(decision.is_unspecified());
    }

    #[test]
    fn last_occurrence_wins() {
        let decision = MergeParser::parse(
            "Goal: first draft\nPlan: first plan\nRevised:\nGoal: final goal\nPlan: final plan",
        );
        assert_eq!(decision.goal, "final goal");
        assert_eq!(decision.plan, "final plan");
    }

    #[test]
    fn line_with_both_markers_counts_as_goal() {
        let decision = MergeParser::parse("Goal: escape, plan: run\nPlan: Mara runs.");
        assert_eq!(decision.goal, "escape, plan: run");
        assert_eq!(decision.plan, "Mara runs.");
    }

    #[test]
    fn tolerates_case_and_emphasis() {
        let decision = MergeParser::parse("**GOAL:** hold the tower\n- **plan:** Ivo bars the door.");
        assert_eq!(decision.goal, "hold the tower");
        assert_eq!(decision.plan, "Ivo bars the door.");
    }

    #[test]
    fn empty_marker_takes_next_line() {
        let decision = MergeParser::parse("Goal:\n  Reach the lamp room\n\nPlan:\nPlan: Mara climbs.");
        assert_eq!(decision.goal, "Reach the lamp room");
        assert_eq!(decision.plan, "Mara climbs.");
    }

    struct Counting {
        calls: AtomicUsize,
        reply: String,
    }

    impl TextOracle for Counting {
        async fn generate(&self, _prompt: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn proposals() -> Vec<Proposal> {
        vec![
            Proposal {
                actor: "Mara".to_owned(),
                goal: "fix the lamp".to_owned(),
                plan: "climb".to_owned(),
            },
            Proposal {
                actor: "Ivo".to_owned(),
                goal: "guard".to_owned(),
                plan: "hold the door".to_owned(),
            },
        ]
    }

    #[tokio::test]
    async fn merge_calls_oracle_once() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Counting {
            calls: AtomicUsize::new(0),
            reply: "Goal: g\nPlan: p".to_owned(),
        };
        let merger = Merger::new(OracleContext::new(&oracle, &prompts));
        let decision = merger
            .merge(&SceneId::new("scene_001"), &proposals())
            .await
            .unwrap();
        assert_eq!(decision, Decision::merged("g", "p"));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_proposals_fail_fast() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Counting {
            calls: AtomicUsize::new(0),
            reply: String::new(),
        };
        let merger = Merger::new(OracleContext::new(&oracle, &prompts));
        let result = merger.merge(&SceneId::new("scene_001"), &[]).await;
        assert!(matches!(result, Err(SimulationError::EmptyProposals)));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_text_yields_unspecified_decision() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Counting {
            calls: AtomicUsize::new(0),
            reply: failure_text("rate limited"),
        };
        let merger = Merger::new(OracleContext::new(&oracle, &prompts));
        let decision = merger
            .merge(&SceneId::new("scene_001"), &proposals())
            .await
            .unwrap();
        assert!(decision.is_unspecified());
        assert_eq!(decision.source, DecisionSource::Merged);
    }
}
