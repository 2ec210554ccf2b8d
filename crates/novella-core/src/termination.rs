//! Narrative-ending judgment.
//!
//! Separate from the scene judgment in [`crate::transition`]: a scene can
//! complete without the narrative ending, and the ending is judged against
//! the outline rather than the scene goal.

use std::future::Future;

use novella_types::{Decision, Outline, WorldState};
use serde::Serialize;
use tracing::info;

use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle};
use crate::parse::Verdict;
use crate::prompt::Template;

/// Decides whether the whole narrative has reached its ending.
pub trait TerminationOracle {
    /// Whether `outline`'s ending has been reached given `world` and the
    /// iteration's best `decision`.
    ///
    /// Fails with [`SimulationError::InvalidVerdict`] for any answer other
    /// than complete or incomplete.
    fn is_narrative_complete(
        &self,
        outline: &Outline,
        world: &WorldState,
        decision: &Decision,
    ) -> impl Future<Output = Result<bool, SimulationError>>;
}

#[derive(Debug, Serialize)]
struct EndingPrompt<'a> {
    outline: &'a Outline,
    world: &'a WorldState,
    decision: &'a Decision,
}

/// [`TerminationOracle`] asking the text oracle.
#[derive(Debug)]
pub struct OracleTermination<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<'a, O: TextOracle> OracleTermination<'a, O> {
    /// A termination oracle that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }
}

impl<O: TextOracle> TerminationOracle for OracleTermination<'_, O> {
    async fn is_narrative_complete(
        &self,
        outline: &Outline,
        world: &WorldState,
        decision: &Decision,
    ) -> Result<bool, SimulationError> {
        let prompt = EndingPrompt {
            outline,
            world,
            decision,
        };
        let response = self.ctx.ask(Template::EndingJudge, &prompt).await?;
        let verdict = Verdict::parse(&response).ok_or_else(|| SimulationError::InvalidVerdict {
            collaborator: "ending judge",
            scene_id: world.scene_id.clone(),
            response,
        })?;
        info!(
            scene_id = %world.scene_id,
            complete = verdict.is_complete(),
            "narrative ending judged"
        );
        Ok(verdict.is_complete())
    }
}
