//! Best-decision selection.
//!
//! After a scene's rounds, the selector ranks the accumulated decision
//! history and returns the best entry. The engine only consumes the winner;
//! how it is ranked is up to the [`DecisionSelector`] implementation.

use std::future::Future;

use novella_types::{Background, Decision};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::prompt::Template;

/// The winner of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Score of the winner; higher is better.
    pub score: u32,
    /// Position of the winner in the decision history.
    pub index: usize,
    /// The winning decision.
    pub decision: Decision,
}

/// Ranks a scene's decision history.
pub trait DecisionSelector {
    /// Pick the best of `decisions`.
    ///
    /// Implementations must be deterministic for identical inputs and
    /// oracle answers, and must fail with
    /// [`SimulationError::EmptyDecisionHistory`] on an empty history.
    fn select(
        &self,
        decisions: &[Decision],
        background: &Background,
    ) -> impl Future<Output = Result<Selection, SimulationError>>;
}

/// The answer a predicate counts as good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    /// A "yes" scores a point.
    #[default]
    Yes,
    /// A "no" scores a point.
    No,
}

/// One yes/no quality question asked about every candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// The question.
    pub question: String,
    /// Which answer scores a point.
    #[serde(default)]
    pub expect: Expected,
}

impl Predicate {
    /// A predicate where "yes" scores.
    pub fn yes(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expect: Expected::Yes,
        }
    }

    /// A predicate where "no" scores.
    pub fn no(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expect: Expected::No,
        }
    }
}

/// The general text-quality predicates.
pub fn default_predicates() -> Vec<Predicate> {
    vec![
        Predicate::yes("Is the text fluent and easy to read?"),
        Predicate::no("Does the text contain any grammatical or spelling errors?"),
        Predicate::yes("Is the structure of the text clear and logical?"),
        Predicate::yes("Does the text provide sufficient and complete information?"),
        Predicate::yes("Is the text objective and free from bias?"),
    ]
}

#[derive(Debug, Serialize)]
struct PredicatePrompt<'a> {
    predicate: &'a str,
    decision: &'a Decision,
}

/// Scores each candidate by the number of predicates it satisfies.
///
/// Every predicate is asked once per candidate. The highest score wins;
/// ties go to the earliest candidate.
#[derive(Debug)]
pub struct PredicateSelector<'a, O> {
    ctx: OracleContext<'a, O>,
    predicates: &'a [Predicate],
}

impl<'a, O: TextOracle> PredicateSelector<'a, O> {
    /// A selector asking `predicates` through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>, predicates: &'a [Predicate]) -> Self {
        Self { ctx, predicates }
    }

    async fn score(&self, decision: &Decision) -> Result<u32, SimulationError> {
        let mut score = 0_u32;
        for predicate in self.predicates {
            let prompt = PredicatePrompt {
                predicate: &predicate.question,
                decision,
            };
            let answer = self.ctx.ask(Template::Predicate, &prompt).await?;
            if is_failure(&answer) {
                warn!(question = %predicate.question, "predicate generation failed, scoring zero");
                continue;
            }
            if parse_answer(&answer) == Some(predicate.expect) {
                score = score.saturating_add(1);
            }
        }
        Ok(score)
    }
}

impl<O: TextOracle> DecisionSelector for PredicateSelector<'_, O> {
    async fn select(
        &self,
        decisions: &[Decision],
        background: &Background,
    ) -> Result<Selection, SimulationError> {
        let mut best: Option<Selection> = None;
        for (index, decision) in decisions.iter().enumerate() {
            let score = self.score(decision).await?;
            debug!(
                scene_id = %background.world.scene_id,
                candidate = index,
                score,
                "decision scored"
            );
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Selection {
                    score,
                    index,
                    decision: decision.clone(),
                });
            }
        }
        best.ok_or_else(|| SimulationError::EmptyDecisionHistory {
            scene_id: background.world.scene_id.clone(),
        })
    }
}

/// Read a yes/no answer from the first word of `text`.
fn parse_answer(text: &str) -> Option<Expected> {
    let first = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|word| !word.is_empty())?
        .to_ascii_lowercase();
    match first.as_str() {
        "yes" | "true" => Some(Expected::Yes),
        "no" | "false" => Some(Expected::No),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use novella_types::{SceneGoal, SceneId, WorldState};

    use super::*;
    use crate::prompt::PromptEngine;

    /// Says "yes" to fluency for plans mentioning `good`, "no" to the
    /// error question for everything, and "no" otherwise.
    struct Judge;

    impl TextOracle for Judge {
        async fn generate(&self, prompt: &str) -> String {
            if prompt.contains("grammatical") {
                return "No.".to_owned();
            }
            if prompt.contains("fluent") && prompt.contains("good") {
                return "Yes, it reads well.".to_owned();
            }
            "no".to_owned()
        }
    }

    fn background() -> Background {
        Background {
            world: WorldState {
                scene_id: SceneId::new("scene_003"),
                location: "Lighthouse".to_owned(),
                event: String::new(),
                weather: String::new(),
                atmosphere: String::new(),
                writing_style: String::new(),
                recent_events: Vec::new(),
                involved_characters: Vec::new(),
                long_term_goal: String::new(),
                scene_goal: SceneGoal::pending("Restore the lamp"),
            },
            actors: Vec::new(),
        }
    }

    #[test]
    fn answers_read_first_word() {
        assert_eq!(parse_answer("Yes."), Some(Expected::Yes));
        assert_eq!(parse_answer("**No**, it does not."), Some(Expected::No));
        assert_eq!(parse_answer("Perhaps"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[test]
    fn default_predicates_cover_five_questions() {
        let predicates = default_predicates();
        assert_eq!(predicates.len(), 5);
        assert_eq!(
            predicates.iter().filter(|p| p.expect == Expected::No).count(),
            1
        );
    }

    #[tokio::test]
    async fn highest_score_wins() {
        let prompts = PromptEngine::builtin().unwrap();
        let predicates = default_predicates();
        let selector = PredicateSelector::new(OracleContext::new(&Judge, &prompts), &predicates);
        let decisions = vec![
            Decision::merged("a", "plain"),
            Decision::merged("b", "good plan"),
            Decision::merged("c", "plain again"),
        ];

        let selection = selector.select(&decisions, &background()).await.unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.score, 2);
        assert_eq!(selection.decision.goal, "b");
    }

    #[tokio::test]
    async fn ties_go_to_earliest() {
        let prompts = PromptEngine::builtin().unwrap();
        let predicates = default_predicates();
        let selector = PredicateSelector::new(OracleContext::new(&Judge, &prompts), &predicates);
        let decisions = vec![Decision::merged("a", "plain"), Decision::merged("b", "plain")];

        let selection = selector.select(&decisions, &background()).await.unwrap();
        assert_eq!(selection.index, 0);
        assert_eq!(selection.score, 1);
    }

    #[tokio::test]
    async fn empty_history_fails_fast() {
        let prompts = PromptEngine::builtin().unwrap();
        let predicates = default_predicates();
        let selector = PredicateSelector::new(OracleContext::new(&Judge, &prompts), &predicates);

        let result = selector.select(&[], &background()).await;
        assert!(matches!(
            result,
            Err(SimulationError::EmptyDecisionHistory { .. })
        ));
    }
}
