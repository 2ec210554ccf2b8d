//! Goal and plan proposals for a single actor.
//!
//! Both operations are soft: a generation failure comes back as failure
//! text and is handed to the caller unchanged. Neither operation mutates
//! the actor; goal-stack updates are the orchestrator's job.

use novella_types::{Actor, Decision, WorldState};
use serde::Serialize;

use crate::oracle::{OracleContext, TextOracle};
use crate::prompt::{PromptError, Template};

/// How many of the most recent memory fragments a goal prompt sees.
pub const RECENT_MEMORY_WINDOW: usize = 2;

/// Fixed identity attributes rendered into every actor prompt.
#[derive(Debug, Serialize)]
struct Identity<'a> {
    name: &'a str,
    personality: &'a str,
    role: &'a str,
    profession: &'a str,
    health_status: &'a str,
}

impl<'a> From<&'a Actor> for Identity<'a> {
    fn from(actor: &'a Actor) -> Self {
        Self {
            name: &actor.name,
            personality: &actor.personality,
            role: &actor.role,
            profession: &actor.profession,
            health_status: &actor.health_status,
        }
    }
}

#[derive(Debug, Serialize)]
struct GoalPrompt<'a> {
    actor: Identity<'a>,
    memory: &'a [String],
    world: &'a WorldState,
    prior: Option<&'a Decision>,
}

#[derive(Debug, Serialize)]
struct PlanPrompt<'a> {
    actor: Identity<'a>,
    goals: &'a [String],
    memory: &'a [String],
    world: &'a WorldState,
    prior: Option<&'a Decision>,
}

/// Ask the oracle for `actor`'s goal in `world`.
///
/// The prompt carries the actor's identity, the last
/// [`RECENT_MEMORY_WINDOW`] memory fragments, every descriptive field of
/// the scene and, after the first round, the previous merged decision.
///
/// # Errors
///
/// Returns [`PromptError`] only if the prompt cannot be rendered.
pub async fn propose_goal<O: TextOracle>(
    ctx: OracleContext<'_, O>,
    actor: &Actor,
    world: &WorldState,
    prior: Option<&Decision>,
) -> Result<String, PromptError> {
    let prompt = GoalPrompt {
        actor: Identity::from(actor),
        memory: actor.recent_memory(RECENT_MEMORY_WINDOW),
        world,
        prior,
    };
    ctx.ask(Template::Goal, &prompt).await
}

/// Ask the oracle for `actor`'s plan in `world`.
///
/// `goals` is the goal stack as it stands once this round's goal has been
/// folded in. Without a prior decision the actor plans from the scene
/// alone; with one, the prompt asks for a plan that differs from it.
///
/// # Errors
///
/// Returns [`PromptError`] only if the prompt cannot be rendered.
pub async fn propose_plan<O: TextOracle>(
    ctx: OracleContext<'_, O>,
    actor: &Actor,
    goals: &[String],
    world: &WorldState,
    prior: Option<&Decision>,
) -> Result<String, PromptError> {
    let prompt = PlanPrompt {
        actor: Identity::from(actor),
        goals,
        memory: &actor.memory,
        world,
        prior,
    };
    ctx.ask(Template::Plan, &prompt).await
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::sync::Mutex;

    use novella_types::{SceneGoal, SceneId};

    use super::*;
    use crate::prompt::PromptEngine;

    /// Records every prompt and answers with a fixed string.
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    impl TextOracle for Recorder {
        async fn generate(&self, prompt: &str) -> String {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_owned());
            }
            "reach the lamp room".to_owned()
        }
    }

    impl Recorder {
        fn last(&self) -> String {
            self.prompts
                .lock()
                .ok()
                .and_then(|p| p.last().cloned())
                .unwrap_or_default()
        }
    }

    fn world() -> WorldState {
        WorldState {
            scene_id: SceneId::new("scene_003"),
            location: "Lighthouse".to_owned(),
            event: "A storm cuts the island off".to_owned(),
            weather: "Gale".to_owned(),
            atmosphere: "Tense".to_owned(),
            writing_style: "Gothic".to_owned(),
            recent_events: vec!["The ferry sank".to_owned()],
            involved_characters: vec!["Mara".to_owned()],
            long_term_goal: "Uncover the keeper's secret".to_owned(),
            scene_goal: SceneGoal::pending("Restore the lamp"),
        }
    }

    fn mara() -> Actor {
        let mut actor = Actor::new("Mara");
        actor.personality = "stubborn".to_owned();
        actor.remember("first memory");
        actor.remember("second memory");
        actor.remember("third memory");
        actor
    }

    #[tokio::test]
    async fn goal_prompt_sees_two_latest_memories() {
        let prompts = PromptEngine::builtin().expect("built-in templates load");
        let oracle = Recorder::default();
        let ctx = OracleContext::new(&oracle, &prompts);

        let goal = propose_goal(ctx, &mara(), &world(), None).await;
        assert_eq!(goal.ok().as_deref(), Some("reach the lamp room"));

        let prompt = oracle.last();
        assert!(prompt.contains("Mara"));
        assert!(prompt.contains("stubborn"));
        assert!(prompt.contains("Restore the lamp"));
        assert!(prompt.contains("second memory"));
        assert!(prompt.contains("third memory"));
        assert!(!prompt.contains("first memory"));
        assert!(prompt.contains("no previous decision"));
    }

    #[tokio::test]
    async fn goal_prompt_includes_prior_decision() {
        let prompts = PromptEngine::builtin().expect("built-in templates load");
        let oracle = Recorder::default();
        let ctx = OracleContext::new(&oracle, &prompts);
        let prior = Decision::merged("hold the tower", "Mara bars the door.");

        let _ = propose_goal(ctx, &mara(), &world(), Some(&prior)).await;
        let prompt = oracle.last();
        assert!(prompt.contains("hold the tower"));
        assert!(prompt.contains("Mara bars the door."));
    }

    #[tokio::test]
    async fn plan_prompt_sees_whole_memory_and_goal_stack() {
        let prompts = PromptEngine::builtin().expect("built-in templates load");
        let oracle = Recorder::default();
        let ctx = OracleContext::new(&oracle, &prompts);
        let goals = vec!["survive".to_owned(), "reach the lamp room".to_owned()];

        let _ = propose_plan(ctx, &mara(), &goals, &world(), None).await;
        let first = oracle.last();
        assert!(first.contains("first memory"));
        assert!(first.contains("survive; reach the lamp room"));
        assert!(!first.contains("as different from the previous decision"));

        let prior = Decision::merged("hold the tower", "Mara bars the door.");
        let _ = propose_plan(ctx, &mara(), &goals, &world(), Some(&prior)).await;
        let next = oracle.last();
        assert!(next.contains("Mara bars the door."));
        assert!(next.contains("as different from the previous decision"));
    }
}
