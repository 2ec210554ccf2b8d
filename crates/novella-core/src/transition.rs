//! Scene completion and scene advancement.
//!
//! A scene is either active or complete, and only ever moves from active to
//! complete. The judgment is external: a [`CompletionJudge`] reads the best
//! decision against the scene and the outline. When it says complete, the
//! [`GoalTransitioner`] flips the flag and asks a [`SceneSynthesizer`] for
//! the successor scene, whose key is the current number plus one.

use std::future::Future;

use novella_types::{Decision, Outline, SceneDraft, SceneGoal, SceneId, WorldState};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::parse::{Verdict, parse_json};
use crate::prompt::Template;

/// Decides whether a decision completes its scene's goal.
pub trait CompletionJudge {
    /// Whether `decision` achieves the scene goal of `world`.
    ///
    /// Fails with [`SimulationError::InvalidVerdict`] when the judgment is
    /// neither complete nor incomplete.
    fn is_scene_complete(
        &self,
        decision: &Decision,
        world: &WorldState,
        outline: &Outline,
    ) -> impl Future<Output = Result<bool, SimulationError>>;
}

/// Produces the scene that follows a completed one.
pub trait SceneSynthesizer {
    /// Build the scene keyed `next_id` from the completed `world`.
    ///
    /// The returned scene must carry `next_id` and a pending scene goal.
    fn synthesize(
        &self,
        next_id: &SceneId,
        world: &WorldState,
        decision: &Decision,
        outline: &Outline,
    ) -> impl Future<Output = Result<WorldState, SimulationError>>;
}

#[derive(Debug, Serialize)]
struct JudgePrompt<'a> {
    decision: &'a Decision,
    world: &'a WorldState,
    outline: &'a Outline,
}

#[derive(Debug, Serialize)]
struct NextScenePrompt<'a> {
    next_scene_id: &'a SceneId,
    world: &'a WorldState,
    decision: &'a Decision,
    outline: &'a Outline,
}

/// [`CompletionJudge`] asking the text oracle.
#[derive(Debug)]
pub struct OracleCompletionJudge<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<'a, O: TextOracle> OracleCompletionJudge<'a, O> {
    /// A judge that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }
}

impl<O: TextOracle> CompletionJudge for OracleCompletionJudge<'_, O> {
    async fn is_scene_complete(
        &self,
        decision: &Decision,
        world: &WorldState,
        outline: &Outline,
    ) -> Result<bool, SimulationError> {
        let prompt = JudgePrompt {
            decision,
            world,
            outline,
        };
        let response = self.ctx.ask(Template::SceneJudge, &prompt).await?;
        Verdict::parse(&response)
            .map(Verdict::is_complete)
            .ok_or_else(|| SimulationError::InvalidVerdict {
                collaborator: "scene judge",
                scene_id: world.scene_id.clone(),
                response,
            })
    }
}

/// [`SceneSynthesizer`] asking the text oracle for a JSON scene.
#[derive(Debug)]
pub struct OracleSceneSynthesizer<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<'a, O: TextOracle> OracleSceneSynthesizer<'a, O> {
    /// A synthesizer that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }
}

impl<O: TextOracle> SceneSynthesizer for OracleSceneSynthesizer<'_, O> {
    async fn synthesize(
        &self,
        next_id: &SceneId,
        world: &WorldState,
        decision: &Decision,
        outline: &Outline,
    ) -> Result<WorldState, SimulationError> {
        let prompt = NextScenePrompt {
            next_scene_id: next_id,
            world,
            decision,
            outline,
        };
        let response = self.ctx.ask(Template::NextScene, &prompt).await?;
        if is_failure(&response) {
            return Err(SimulationError::MalformedScene {
                scene_id: world.scene_id.clone(),
                reason: response,
            });
        }
        let draft: SceneDraft =
            parse_json(&response).map_err(|e| SimulationError::MalformedScene {
                scene_id: world.scene_id.clone(),
                reason: format!("response is not a scene: {e}"),
            })?;
        Ok(WorldState::from_draft(next_id.clone(), draft))
    }
}

/// What a transition did to the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The scene stays active.
    Continued,
    /// The scene completed and a successor was derived.
    Advanced {
        /// The new, pending scene.
        next: Box<WorldState>,
    },
}

/// Applies completion judgments and derives successor scenes.
#[derive(Debug)]
pub struct GoalTransitioner<'a, J, S> {
    judge: &'a J,
    synthesizer: &'a S,
}

impl<'a, J: CompletionJudge, S: SceneSynthesizer> GoalTransitioner<'a, J, S> {
    /// A transitioner using `judge` and `synthesizer`.
    pub const fn new(judge: &'a J, synthesizer: &'a S) -> Self {
        Self { judge, synthesizer }
    }

    /// Judge `world` against `decision` and advance it when complete.
    ///
    /// A scene that is already complete skips the judgment. The flag is
    /// flipped on `world` in place; it never goes back to pending.
    ///
    /// # Errors
    ///
    /// Fails when the judgment is invalid, when the scene key has no digits
    /// or cannot be advanced, or when the successor is malformed.
    pub async fn apply(
        &self,
        world: &mut WorldState,
        decision: &Decision,
        outline: &Outline,
    ) -> Result<Transition, SimulationError> {
        if !world.is_scene_complete() {
            let complete = self.judge.is_scene_complete(decision, world, outline).await?;
            if !complete {
                info!(scene_id = %world.scene_id, "scene goal still pending");
                return Ok(Transition::Continued);
            }
            world.mark_scene_complete();
        }

        let next_id = world.scene_id.next()?;
        info!(
            scene_id = %world.scene_id,
            next_scene_id = %next_id,
            "scene goal complete, advancing"
        );
        let mut next = self
            .synthesizer
            .synthesize(&next_id, world, decision, outline)
            .await?;

        if next.scene_id != next_id {
            return Err(SimulationError::MalformedScene {
                scene_id: world.scene_id.clone(),
                reason: format!("successor keyed {} instead of {next_id}", next.scene_id),
            });
        }
        if next.is_scene_complete() {
            warn!(
                scene_id = %next.scene_id,
                "synthesized scene arrived complete, resetting its goal to pending"
            );
            next.scene_goal = SceneGoal::pending(next.scene_goal.description);
        }
        Ok(Transition::Advanced {
            next: Box::new(next),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::prompt::PromptEngine;

    struct Scripted {
        verdict: &'static str,
        scene: &'static str,
        judged: AtomicUsize,
    }

    impl Scripted {
        const fn new(verdict: &'static str, scene: &'static str) -> Self {
            Self {
                verdict,
                scene,
                judged: AtomicUsize::new(0),
            }
        }
    }

    impl TextOracle for Scripted {
        async fn generate(&self, prompt: &str) -> String {
            if prompt.contains("The new scene is") {
                return self.scene.to_owned();
            }
            self.judged.fetch_add(1, Ordering::SeqCst);
            self.verdict.to_owned()
        }
    }

    fn world(key: &str) -> WorldState {
        WorldState {
            scene_id: SceneId::new(key),
            location: "Lighthouse".to_owned(),
            event: "Storm".to_owned(),
            weather: String::new(),
            atmosphere: String::new(),
            writing_style: String::new(),
            recent_events: Vec::new(),
            involved_characters: Vec::new(),
            long_term_goal: "Uncover the secret".to_owned(),
            scene_goal: SceneGoal::pending("Restore the lamp"),
        }
    }

    fn outline() -> Outline {
        Outline::new("The lamp burns again")
    }

    const NEXT_SCENE: &str = "```json\n{\"location\": \"Harbour\", \"event\": \"Dawn\", \"scene_goal\": {\"description\": \"Find a boat\", \"status\": \"complete\"},}\n```";

    #[tokio::test]
    async fn incomplete_verdict_keeps_scene_active() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("incomplete", NEXT_SCENE);
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("scene_003");
        let decision = Decision::merged("g", "p");
        let result = transitioner.apply(&mut current, &decision, &outline()).await.unwrap();
        assert_eq!(result, Transition::Continued);
        assert!(!current.is_scene_complete());
    }

    #[tokio::test]
    async fn complete_verdict_advances_to_next_number() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("Complete", NEXT_SCENE);
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("scene_003");
        let decision = Decision::merged("g", "p");
        let result = transitioner.apply(&mut current, &decision, &outline()).await.unwrap();

        assert!(current.is_scene_complete());
        let Transition::Advanced { next } = result else {
            panic!("expected an advanced transition");
        };
        assert_eq!(next.scene_id.as_str(), "scene_004");
        assert_eq!(next.location, "Harbour");
        assert!(!next.is_scene_complete());
    }

    #[tokio::test]
    async fn already_complete_scene_skips_judgment() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("incomplete", NEXT_SCENE);
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("scene_009");
        current.mark_scene_complete();
        let result = transitioner
            .apply(&mut current, &Decision::merged("g", "p"), &outline())
            .await
            .unwrap();
        assert!(matches!(result, Transition::Advanced { ref next } if next.scene_id.as_str() == "scene_010"));
        assert_eq!(oracle.judged.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_verdict_is_fatal() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("probably", NEXT_SCENE);
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("scene_003");
        let result = transitioner
            .apply(&mut current, &Decision::merged("g", "p"), &outline())
            .await;
        assert!(matches!(
            result,
            Err(SimulationError::InvalidVerdict { collaborator: "scene judge", .. })
        ));
        assert!(!current.is_scene_complete());
    }

    #[tokio::test]
    async fn key_without_digits_is_fatal() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("complete", NEXT_SCENE);
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("prologue");
        let result = transitioner
            .apply(&mut current, &Decision::merged("g", "p"), &outline())
            .await;
        assert!(matches!(result, Err(SimulationError::SceneId { .. })));
    }

    #[tokio::test]
    async fn unparseable_successor_is_malformed() {
        let prompts = PromptEngine::builtin().unwrap();
        let oracle = Scripted::new("complete", "I could not think of a scene.");
        let ctx = OracleContext::new(&oracle, &prompts);
        let (judge, synth) = (OracleCompletionJudge::new(ctx), OracleSceneSynthesizer::new(ctx));
        let transitioner = GoalTransitioner::new(&judge, &synth);

        let mut current = world("scene_003");
        let result = transitioner
            .apply(&mut current, &Decision::merged("g", "p"), &outline())
            .await;
        assert!(matches!(result, Err(SimulationError::MalformedScene { .. })));
    }
}
