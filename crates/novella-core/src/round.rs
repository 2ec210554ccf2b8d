//! Concurrent proposal collection.
//!
//! A round fans out to every actor involved in the scene. Each actor's goal
//! and plan are generated on a shared borrow, all actors run concurrently
//! behind one join barrier, and goal-stack updates are returned rather than
//! applied. The caller applies them with [`RoundProposals::apply_goals`]
//! once the round has completed, so an abandoned round leaves the cast
//! untouched.

use futures::future::join_all;
use novella_types::{Actor, Decision, GoalUpdate, Proposal, SceneId, WorldState};
use tracing::{debug, warn};

use crate::actor::{propose_goal, propose_plan};
use crate::cast::Cast;
use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::prompt::PromptError;

/// The outcome of one proposal round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundProposals {
    /// One proposal per participating actor, in cast order.
    pub proposals: Vec<Proposal>,
    /// How the new goals enter the goal stacks.
    pub update: GoalUpdate,
}

impl RoundProposals {
    /// Fold each proposal's goal into its actor's goal stack.
    ///
    /// Empty goals are folded in too, so the stack shape follows the goal
    /// policy regardless of generation failures.
    pub fn apply_goals(&self, cast: &mut Cast) {
        for proposal in &self.proposals {
            if let Some(actor) = cast.get_mut(&proposal.actor) {
                actor.apply_goal(proposal.goal.clone(), self.update);
            }
        }
    }
}

/// One round of concurrent proposal generation.
#[derive(Debug)]
pub struct ProposalRound<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<O> Clone for ProposalRound<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O> Copy for ProposalRound<'_, O> {}

impl<'a, O: TextOracle> ProposalRound<'a, O> {
    /// A round that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }

    /// Collect one proposal from every actor involved in `world`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NoParticipants`] when no cast member is
    /// involved in the scene, or [`SimulationError::Prompt`] when a prompt
    /// fails to render.
    pub async fn collect(
        &self,
        cast: &Cast,
        world: &WorldState,
        prior: Option<&Decision>,
        update: GoalUpdate,
    ) -> Result<RoundProposals, SimulationError> {
        let participants = participants(cast, world);
        if participants.is_empty() {
            return Err(SimulationError::NoParticipants {
                scene_id: world.scene_id.clone(),
            });
        }

        let tasks = participants
            .into_iter()
            .map(|actor| self.propose(actor, world, prior, update));
        let proposals = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            scene_id = %world.scene_id,
            proposals = proposals.len(),
            "proposal round collected"
        );
        Ok(RoundProposals { proposals, update })
    }

    /// Generate one actor's goal, then its plan against the provisional
    /// goal stack.
    async fn propose(
        &self,
        actor: &Actor,
        world: &WorldState,
        prior: Option<&Decision>,
        update: GoalUpdate,
    ) -> Result<Proposal, PromptError> {
        let goal = propose_goal(self.ctx, actor, world, prior).await?;
        let goal = usable(goal, &world.scene_id, &actor.name, "goal");
        let goals = actor.goals_with(&goal, update);
        let plan = propose_plan(self.ctx, actor, &goals, world, prior).await?;
        let plan = usable(plan, &world.scene_id, &actor.name, "plan");
        Ok(Proposal {
            actor: actor.name.clone(),
            goal,
            plan,
        })
    }
}

/// Actors taking part in `world`, in cast order.
///
/// Names in `involved_characters` with no matching actor are logged and
/// skipped.
fn participants<'c>(cast: &'c Cast, world: &WorldState) -> Vec<&'c Actor> {
    for name in &world.involved_characters {
        if cast.get(name).is_none() {
            warn!(
                scene_id = %world.scene_id,
                actor = %name,
                "scene names an actor that is not in the cast, skipping"
            );
        }
    }
    cast.actors()
        .iter()
        .filter(|actor| world.involves(&actor.name))
        .collect()
}

/// Replace failure text with an empty field.
fn usable(text: String, scene_id: &SceneId, actor: &str, field: &'static str) -> String {
    if is_failure(&text) {
        warn!(
            scene_id = %scene_id,
            actor,
            field,
            response = %text,
            "generation failed, recording empty field"
        );
        return String::new();
    }
    text.trim().to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use novella_types::SceneGoal;

    use super::*;
    use crate::oracle::failure_text;
    use crate::prompt::PromptEngine;

    /// Answers goal prompts with `goal-<actor>` and plan prompts with
    /// `plan-<actor>`, failing for the actor named `Broken`.
    struct ByActor;

    impl TextOracle for ByActor {
        async fn generate(&self, prompt: &str) -> String {
            let actor = ["Mara", "Ivo", "Broken"]
                .into_iter()
                .find(|name| prompt.contains(&format!("You are {name},")))
                .unwrap_or("unknown");
            if actor == "Broken" {
                return failure_text("timeout");
            }
            if prompt.contains("Output format:") {
                format!("plan-{actor}")
            } else {
                format!("goal-{actor}")
            }
        }
    }

    fn world(involved: &[&str]) -> WorldState {
        WorldState {
            scene_id: SceneId::new("scene_003"),
            location: "Lighthouse".to_owned(),
            event: String::new(),
            weather: String::new(),
            atmosphere: String::new(),
            writing_style: String::new(),
            recent_events: Vec::new(),
            involved_characters: involved.iter().map(|s| (*s).to_owned()).collect(),
            long_term_goal: String::new(),
            scene_goal: SceneGoal::pending("Restore the lamp"),
        }
    }

    fn cast(names: &[&str]) -> Cast {
        Cast::new(names.iter().map(|n| Actor::new(*n)).collect()).unwrap()
    }

    #[tokio::test]
    async fn one_proposal_per_actor_in_cast_order() {
        let prompts = PromptEngine::builtin().unwrap();
        let round = ProposalRound::new(OracleContext::new(&ByActor, &prompts));
        let cast = cast(&["Mara", "Ivo"]);

        let result = round
            .collect(&cast, &world(&["Ivo", "Mara"]), None, GoalUpdate::Append)
            .await
            .unwrap();
        let names: Vec<_> = result.proposals.iter().map(|p| p.actor.as_str()).collect();
        assert_eq!(names, ["Mara", "Ivo"]);
        assert_eq!(result.proposals[0].goal, "goal-Mara");
        assert_eq!(result.proposals[1].plan, "plan-Ivo");
    }

    #[tokio::test]
    async fn collecting_does_not_touch_goal_stacks() {
        let prompts = PromptEngine::builtin().unwrap();
        let round = ProposalRound::new(OracleContext::new(&ByActor, &prompts));
        let mut cast = cast(&["Mara", "Ivo"]);

        let result = round
            .collect(&cast, &world(&[]), None, GoalUpdate::Append)
            .await
            .unwrap();
        assert!(cast.actors().iter().all(|a| a.goals.is_empty()));

        result.apply_goals(&mut cast);
        assert_eq!(cast.get("Mara").unwrap().goals, vec!["goal-Mara"]);
        assert_eq!(cast.get("Ivo").unwrap().goals, vec!["goal-Ivo"]);
    }

    #[tokio::test]
    async fn unknown_and_uninvolved_actors_are_skipped() {
        let prompts = PromptEngine::builtin().unwrap();
        let round = ProposalRound::new(OracleContext::new(&ByActor, &prompts));
        let cast = cast(&["Mara", "Ivo"]);

        let result = round
            .collect(&cast, &world(&["Mara", "Ghost"]), None, GoalUpdate::Replace)
            .await
            .unwrap();
        assert_eq!(result.proposals.len(), 1);
        assert_eq!(result.proposals[0].actor, "Mara");
    }

    #[tokio::test]
    async fn no_participants_fails_fast() {
        let prompts = PromptEngine::builtin().unwrap();
        let round = ProposalRound::new(OracleContext::new(&ByActor, &prompts));
        let cast = cast(&["Mara"]);

        let result = round
            .collect(&cast, &world(&["Ghost"]), None, GoalUpdate::Append)
            .await;
        assert!(matches!(result, Err(SimulationError::NoParticipants { .. })));
    }

    #[tokio::test]
    async fn failure_text_becomes_empty_fields() {
        let prompts = PromptEngine::builtin().unwrap();
        let round = ProposalRound::new(OracleContext::new(&ByActor, &prompts));
        let cast = cast(&["Mara", "Broken"]);

        let result = round
            .collect(&cast, &world(&[]), None, GoalUpdate::Append)
            .await
            .unwrap();
        assert_eq!(result.proposals.len(), 2);
        assert_eq!(result.proposals[1].actor, "Broken");
        assert!(result.proposals[1].goal.is_empty());
        assert!(result.proposals[1].plan.is_empty());
        assert_eq!(result.proposals[0].goal, "goal-Mara");
    }
}
