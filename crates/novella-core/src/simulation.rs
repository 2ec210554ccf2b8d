//! The outer simulation loop.
//!
//! One iteration works on one scene:
//!
//! 1. load the scene and the cast;
//! 2. run `num_rounds` proposal rounds, merging each and carrying the merged
//!    decision into the next round;
//! 3. select the best decision of the scene and log its plan as an event;
//! 4. render a chapter and update the actors;
//! 5. judge the scene goal, persist the scene and, if it completed, derive
//!    and persist the next one;
//! 6. outside the grace period, ask whether the narrative has ended.
//!
//! The loop repeats until the narrative ends, a stop is requested or a
//! budget runs out. Every generation stage races the stop signal; a stage
//! abandoned by a stop leaves nothing applied or persisted.

use std::future::Future;

use novella_types::{Background, Decision, Outline, RunId, SceneId, WorldState};
use tracing::{debug, info, warn};

use crate::cast::Cast;
use crate::config::SimulationSection;
use crate::control::{EndReason, RunControl};
use crate::error::SimulationError;
use crate::merge::Merger;
use crate::narrative::{ChapterSink, NarrativeRenderer, OracleNarrator};
use crate::oracle::{OracleContext, TextOracle};
use crate::policy::{GoalPolicy, TerminationPolicy};
use crate::round::ProposalRound;
use crate::selector::{DecisionSelector, Predicate, PredicateSelector};
use crate::store::{ActorStore, SceneStore};
use crate::termination::{OracleTermination, TerminationOracle};
use crate::transition::{
    CompletionJudge, GoalTransitioner, OracleCompletionJudge, OracleSceneSynthesizer,
    SceneSynthesizer, Transition,
};
use crate::update::{ActorUpdater, OracleActorUpdater};

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// The judgment and side-effect collaborators of a run.
#[derive(Debug)]
pub struct Collaborators<Sel, Judge, Synth, Term, Upd, Narr> {
    /// Picks the best decision of a scene.
    pub selector: Sel,
    /// Judges scene-goal completion.
    pub judge: Judge,
    /// Derives successor scenes.
    pub synthesizer: Synth,
    /// Judges the narrative ending.
    pub termination: Term,
    /// Revises actors after a scene.
    pub updater: Upd,
    /// Renders and persists chapters.
    pub narrator: Narr,
}

/// The collaborators backed by a single text oracle.
pub type OracleCollaborators<'a, O, K> = Collaborators<
    PredicateSelector<'a, O>,
    OracleCompletionJudge<'a, O>,
    OracleSceneSynthesizer<'a, O>,
    OracleTermination<'a, O>,
    OracleActorUpdater<'a, O>,
    OracleNarrator<'a, O, K>,
>;

impl<'a, O: TextOracle, K: ChapterSink> OracleCollaborators<'a, O, K> {
    /// Every collaborator asking through `ctx`, chapters written to `sink`.
    pub const fn from_oracle(
        ctx: OracleContext<'a, O>,
        predicates: &'a [Predicate],
        sink: &'a K,
    ) -> Self {
        Self {
            selector: PredicateSelector::new(ctx, predicates),
            judge: OracleCompletionJudge::new(ctx),
            synthesizer: OracleSceneSynthesizer::new(ctx),
            termination: OracleTermination::new(ctx),
            updater: OracleActorUpdater::new(ctx),
            narrator: OracleNarrator::new(ctx, sink),
        }
    }
}

impl<Sel, Judge, Synth, Term, Upd, Narr> Collaborators<Sel, Judge, Synth, Term, Upd, Narr> {
    /// Replace the decision selector.
    pub fn with_selector<S2>(self, selector: S2) -> Collaborators<S2, Judge, Synth, Term, Upd, Narr> {
        Collaborators {
            selector,
            judge: self.judge,
            synthesizer: self.synthesizer,
            termination: self.termination,
            updater: self.updater,
            narrator: self.narrator,
        }
    }

    /// Replace the scene-completion judge.
    pub fn with_judge<J2>(self, judge: J2) -> Collaborators<Sel, J2, Synth, Term, Upd, Narr> {
        Collaborators {
            selector: self.selector,
            judge,
            synthesizer: self.synthesizer,
            termination: self.termination,
            updater: self.updater,
            narrator: self.narrator,
        }
    }

    /// Replace the scene synthesizer.
    pub fn with_synthesizer<Y2>(self, synthesizer: Y2) -> Collaborators<Sel, Judge, Y2, Term, Upd, Narr> {
        Collaborators {
            selector: self.selector,
            judge: self.judge,
            synthesizer,
            termination: self.termination,
            updater: self.updater,
            narrator: self.narrator,
        }
    }

    /// Replace the ending judgment.
    pub fn with_termination<T2>(self, termination: T2) -> Collaborators<Sel, Judge, Synth, T2, Upd, Narr> {
        Collaborators {
            selector: self.selector,
            judge: self.judge,
            synthesizer: self.synthesizer,
            termination,
            updater: self.updater,
            narrator: self.narrator,
        }
    }

    /// Replace the actor updater.
    pub fn with_updater<U2>(self, updater: U2) -> Collaborators<Sel, Judge, Synth, Term, U2, Narr> {
        Collaborators {
            selector: self.selector,
            judge: self.judge,
            synthesizer: self.synthesizer,
            termination: self.termination,
            updater,
            narrator: self.narrator,
        }
    }

    /// Replace the narrative renderer.
    pub fn with_narrator<N2>(self, narrator: N2) -> Collaborators<Sel, Judge, Synth, Term, Upd, N2> {
        Collaborators {
            selector: self.selector,
            judge: self.judge,
            synthesizer: self.synthesizer,
            termination: self.termination,
            updater: self.updater,
            narrator,
        }
    }
}

/// The persistence collaborators of a run.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    /// Scene persistence.
    pub scenes: &'a dyn SceneStore,
    /// Actor persistence.
    pub actors: &'a dyn ActorStore,
}

/// Loop settings taken from the `simulation` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Proposal rounds per scene.
    pub num_rounds: u32,
    /// Goal-stack policy.
    pub goal_policy: GoalPolicy,
    /// Ending-judgment policy.
    pub termination: TerminationPolicy,
    /// Scene to start from; the latest stored scene when `None`.
    pub start_scene: Option<SceneId>,
}

impl LoopSettings {
    /// Settings from the simulation section.
    pub fn from_config(simulation: &SimulationSection) -> Self {
        Self {
            num_rounds: simulation.num_rounds,
            goal_policy: simulation.goal_policy,
            termination: simulation.termination_policy(),
            start_scene: simulation.start_scene.clone(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&SimulationSection::default())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one outer iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneReport {
    /// Zero-based iteration number.
    pub iteration: u64,
    /// The scene the iteration worked on.
    pub scene_id: SceneId,
    /// Every merged decision, one per round, in round order.
    pub decisions: Vec<Decision>,
    /// Position of the best decision in `decisions`.
    pub best_index: usize,
    /// Score the selector gave the best decision.
    pub best_score: u32,
    /// The best decision.
    pub best: Decision,
    /// Number of the chapter written, if any.
    pub chapter: Option<u32>,
    /// Number of actors the post-scene update changed.
    pub actors_updated: usize,
    /// Whether the scene goal is complete after the transition.
    pub scene_completed: bool,
    /// The successor scene, when the scene completed.
    pub next_scene: Option<SceneId>,
    /// Whether the ending judgment was asked this iteration.
    pub ending_consulted: bool,
    /// Whether the ending judgment reported the narrative complete.
    pub narrative_complete: bool,
}

/// The result of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Why the run ended.
    pub end_reason: EndReason,
    /// Completed iterations.
    pub iterations: u64,
    /// The scene the next iteration would have worked on.
    pub final_scene: SceneId,
    /// One report per completed iteration.
    pub reports: Vec<SceneReport>,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Drives scenes until the narrative ends, a stop is requested, or a budget
/// runs out.
pub struct SimulationLoop<'a, O, Sel, Judge, Synth, Term, Upd, Narr> {
    ctx: OracleContext<'a, O>,
    collaborators: Collaborators<Sel, Judge, Synth, Term, Upd, Narr>,
    stores: Stores<'a>,
    outline: &'a Outline,
    control: &'a RunControl,
    settings: LoopSettings,
}

impl<'a, O, Sel, Judge, Synth, Term, Upd, Narr> SimulationLoop<'a, O, Sel, Judge, Synth, Term, Upd, Narr>
where
    O: TextOracle,
    Sel: DecisionSelector,
    Judge: CompletionJudge,
    Synth: SceneSynthesizer,
    Term: TerminationOracle,
    Upd: ActorUpdater,
    Narr: NarrativeRenderer,
{
    /// Assemble a loop. `ctx` drives the proposal rounds and merges.
    pub const fn new(
        ctx: OracleContext<'a, O>,
        collaborators: Collaborators<Sel, Judge, Synth, Term, Upd, Narr>,
        stores: Stores<'a>,
        outline: &'a Outline,
        control: &'a RunControl,
        settings: LoopSettings,
    ) -> Self {
        Self {
            ctx,
            collaborators,
            stores,
            outline,
            control,
            settings,
        }
    }

    /// Run iterations until the loop ends.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`SimulationError`]; degraded generation
    /// never ends the run.
    pub async fn run(&self) -> Result<RunOutcome, SimulationError> {
        self.outline.validate()?;

        let run_id = RunId::new();
        let mut scene_id = match &self.settings.start_scene {
            Some(id) => id.clone(),
            None => self
                .stores
                .scenes
                .latest()
                .map_err(|e| SimulationError::store("scene", e))?,
        };
        info!(
            run_id = %run_id,
            scene_id = %scene_id,
            num_rounds = self.settings.num_rounds,
            started_at = %self.control.started_at(),
            "simulation started"
        );

        let mut reports = Vec::new();
        let mut iterations = 0_u64;
        let end_reason = loop {
            if let Some(reason) = self.control.end_reason_before(iterations) {
                break reason;
            }
            let Some(report) = self.iterate(run_id, iterations, &scene_id).await? else {
                break EndReason::Stopped;
            };
            iterations = iterations.saturating_add(1);
            if let Some(next) = &report.next_scene {
                scene_id = next.clone();
            }
            let narrative_complete = report.narrative_complete;
            reports.push(report);
            if narrative_complete {
                break EndReason::NarrativeComplete;
            }
        };

        info!(
            run_id = %run_id,
            end_reason = %end_reason,
            iterations,
            final_scene = %scene_id,
            "simulation ended"
        );
        Ok(RunOutcome {
            run_id,
            end_reason,
            iterations,
            final_scene: scene_id,
            reports,
        })
    }

    /// Run one iteration on `scene_id`. `None` when a stop abandoned it.
    #[allow(clippy::too_many_lines)]
    async fn iterate(
        &self,
        run_id: RunId,
        iteration: u64,
        scene_id: &SceneId,
    ) -> Result<Option<SceneReport>, SimulationError> {
        let Collaborators {
            selector,
            judge,
            synthesizer,
            termination,
            updater,
            narrator,
        } = &self.collaborators;

        let mut world = self
            .stores
            .scenes
            .load(scene_id)
            .map_err(|e| SimulationError::store("scene", e))?;
        let actors = self
            .stores
            .actors
            .load_all()
            .map_err(|e| SimulationError::store("actor", e))?;
        let mut cast = Cast::new(actors)?;
        info!(
            run_id = %run_id,
            iteration,
            scene_id = %world.scene_id,
            actors = cast.len(),
            "iteration started"
        );

        let Some(decisions) = self.run_rounds(&mut cast, &world).await? else {
            return Ok(None);
        };

        // Selection
        let background = Background {
            world: world.clone(),
            actors: cast.actors().to_vec(),
        };
        let Some(selection) = self.guarded(selector.select(&decisions, &background)).await? else {
            return Ok(None);
        };
        let best = selection.decision;
        info!(
            scene_id = %world.scene_id,
            best_index = selection.index,
            score = selection.score,
            source = %best.source,
            "best decision selected"
        );
        match best.plan() {
            Some(plan) => world.record_event(plan),
            None => warn!(scene_id = %world.scene_id, "best decision has no plan, no event recorded"),
        }

        // Narrative and actor update
        let background = Background {
            world: world.clone(),
            actors: cast.actors().to_vec(),
        };
        let Some(chapter) = self.guarded(narrator.render(&best, &background)).await? else {
            return Ok(None);
        };
        let Some(actors_updated) = self
            .guarded(updater.update(&mut cast, &best, &world))
            .await?
        else {
            return Ok(None);
        };
        self.stores
            .actors
            .save_all(cast.actors())
            .map_err(|e| SimulationError::store("actor", e))?;

        // Transition
        let transitioner = GoalTransitioner::new(judge, synthesizer);
        let Some(transition) = self
            .guarded(transitioner.apply(&mut world, &best, self.outline))
            .await?
        else {
            return Ok(None);
        };
        self.stores
            .scenes
            .save(&world)
            .map_err(|e| SimulationError::store("scene", e))?;
        let next_scene = match transition {
            Transition::Continued => None,
            Transition::Advanced { next } => {
                self.stores
                    .scenes
                    .save(&next)
                    .map_err(|e| SimulationError::store("scene", e))?;
                info!(scene_id = %world.scene_id, next_scene_id = %next.scene_id, "next scene saved");
                Some(next.scene_id)
            }
        };

        // Termination
        let ending_consulted = self.settings.termination.should_consult(iteration);
        let narrative_complete = if ending_consulted {
            let Some(complete) = self
                .guarded(termination.is_narrative_complete(self.outline, &world, &best))
                .await?
            else {
                return Ok(None);
            };
            complete
        } else {
            debug!(iteration, "ending judgment skipped during grace iterations");
            false
        };

        Ok(Some(SceneReport {
            iteration,
            scene_id: world.scene_id.clone(),
            decisions,
            best_index: selection.index,
            best_score: selection.score,
            best,
            chapter,
            actors_updated,
            scene_completed: world.is_scene_complete(),
            next_scene,
            ending_consulted,
            narrative_complete,
        }))
    }

    /// Run the proposal rounds of a scene. `None` when a stop abandoned them.
    ///
    /// Goal updates are applied to `cast` only after a round's merge has
    /// completed.
    async fn run_rounds(
        &self,
        cast: &mut Cast,
        world: &WorldState,
    ) -> Result<Option<Vec<Decision>>, SimulationError> {
        let round = ProposalRound::new(self.ctx);
        let merger = Merger::new(self.ctx);
        let mut decisions: Vec<Decision> = Vec::new();
        let mut prior: Option<Decision> = None;
        for round_number in 1..=self.settings.num_rounds {
            let update = self.settings.goal_policy.for_round(round_number);
            let Some(proposals) = self
                .guarded(round.collect(cast, world, prior.as_ref(), update))
                .await?
            else {
                return Ok(None);
            };
            let Some(decision) = self
                .guarded(merger.merge(&world.scene_id, &proposals.proposals))
                .await?
            else {
                return Ok(None);
            };
            proposals.apply_goals(cast);
            info!(
                scene_id = %world.scene_id,
                round = round_number,
                proposals = proposals.proposals.len(),
                goal = %decision.goal,
                "round merged"
            );
            decisions.push(decision.clone());
            prior = Some(decision);
        }
        Ok(Some(decisions))
    }

    /// Race `stage` against the stop signal. `None` when the stop won.
    async fn guarded<T>(
        &self,
        stage: impl Future<Output = Result<T, SimulationError>>,
    ) -> Result<Option<T>, SimulationError> {
        tokio::select! {
            biased;
            () = self.control.stopped() => {
                info!("stop requested, abandoning in-flight stage");
                Ok(None)
            }
            result = stage => result.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use novella_types::GoalUpdate;

    use super::*;

    #[test]
    fn settings_follow_the_simulation_section() {
        let section = SimulationSection {
            num_rounds: 5,
            start_scene: Some(SceneId::new("scene_007")),
            termination_grace_iterations: 2,
            ..SimulationSection::default()
        };
        let settings = LoopSettings::from_config(&section);
        assert_eq!(settings.num_rounds, 5);
        assert_eq!(settings.start_scene, Some(SceneId::new("scene_007")));
        assert!(!settings.termination.should_consult(1));
        assert!(settings.termination.should_consult(2));
        assert_eq!(settings.goal_policy.for_round(1), GoalUpdate::Append);
        assert_eq!(settings.goal_policy.for_round(2), GoalUpdate::Replace);
    }

    #[test]
    fn builders_swap_one_collaborator_and_keep_the_rest() {
        let base = Collaborators {
            selector: "selector".to_owned(),
            judge: "judge".to_owned(),
            synthesizer: "synthesizer".to_owned(),
            termination: "termination".to_owned(),
            updater: "updater".to_owned(),
            narrator: "narrator".to_owned(),
        };

        let partial = base.with_judge(vec!["strict judge"]).with_narrator(7_u32);
        assert_eq!(partial.selector, "selector");
        assert_eq!(partial.judge, vec!["strict judge"]);
        assert_eq!(partial.synthesizer, "synthesizer");
        assert_eq!(partial.termination, "termination");
        assert_eq!(partial.updater, "updater");
        assert_eq!(partial.narrator, 7);

        let swapped = partial
            .with_selector(1_u8)
            .with_synthesizer(3_u8)
            .with_termination(4_u8)
            .with_updater(5_u8);
        assert_eq!(
            (swapped.selector, swapped.synthesizer, swapped.termination, swapped.updater),
            (1, 3, 4, 5)
        );
        assert_eq!(swapped.judge, vec!["strict judge"]);
        assert_eq!(swapped.narrator, 7);
    }
}
