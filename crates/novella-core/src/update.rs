//! Post-scene actor updates.
//!
//! Once a scene's best decision is known, each actor's health status, role
//! and memory are revised to reflect it. Updates for different actors are
//! independent and generated concurrently; a response that cannot be read
//! leaves that actor unchanged.

use std::future::Future;

use futures::future::join_all;
use novella_types::{Actor, Decision, WorldState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cast::Cast;
use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::parse::parse_json;
use crate::prompt::Template;

/// Revises actors after a scene.
pub trait ActorUpdater {
    /// Update every actor in `cast` from `decision`, whether or not it
    /// took part in `world`.
    ///
    /// Returns how many actors were changed.
    fn update(
        &self,
        cast: &mut Cast,
        decision: &Decision,
        world: &WorldState,
    ) -> impl Future<Output = Result<usize, SimulationError>>;
}

/// The fields an update may replace. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActorPatch {
    /// New health status.
    #[serde(default)]
    pub health_status: Option<String>,
    /// New narrative role.
    #[serde(default)]
    pub role: Option<String>,
    /// The full replacement memory.
    #[serde(default)]
    pub memory: Option<Vec<String>>,
}

impl ActorPatch {
    /// Apply the patch to `actor`.
    pub fn apply(self, actor: &mut Actor) {
        if let Some(health_status) = self.health_status {
            actor.health_status = health_status;
        }
        if let Some(role) = self.role {
            actor.role = role;
        }
        if let Some(memory) = self.memory {
            actor.memory = memory;
        }
    }

    /// Whether the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.health_status.is_none() && self.role.is_none() && self.memory.is_none()
    }
}

#[derive(Debug, Serialize)]
struct UpdatePrompt<'a> {
    actor: &'a Actor,
    decision: &'a Decision,
    world: &'a WorldState,
}

/// [`ActorUpdater`] asking the text oracle for a JSON patch per actor.
#[derive(Debug)]
pub struct OracleActorUpdater<'a, O> {
    ctx: OracleContext<'a, O>,
}

impl<'a, O: TextOracle> OracleActorUpdater<'a, O> {
    /// An updater that asks through `ctx`.
    pub const fn new(ctx: OracleContext<'a, O>) -> Self {
        Self { ctx }
    }

    async fn patch_for(
        &self,
        actor: &Actor,
        decision: &Decision,
        world: &WorldState,
    ) -> Result<(String, Option<ActorPatch>), SimulationError> {
        let prompt = UpdatePrompt {
            actor,
            decision,
            world,
        };
        let response = self.ctx.ask(Template::ActorUpdate, &prompt).await?;
        if is_failure(&response) {
            warn!(
                scene_id = %world.scene_id,
                actor = %actor.name,
                response = %response,
                "actor update generation failed, leaving actor unchanged"
            );
            return Ok((actor.name.clone(), None));
        }
        match parse_json::<ActorPatch>(&response) {
            Ok(patch) => Ok((actor.name.clone(), Some(patch))),
            Err(e) => {
                warn!(
                    scene_id = %world.scene_id,
                    actor = %actor.name,
                    error = %e,
                    "actor update unreadable, leaving actor unchanged"
                );
                Ok((actor.name.clone(), None))
            }
        }
    }
}

impl<O: TextOracle> ActorUpdater for OracleActorUpdater<'_, O> {
    async fn update(
        &self,
        cast: &mut Cast,
        decision: &Decision,
        world: &WorldState,
    ) -> Result<usize, SimulationError> {
        let patches = {
            let tasks = cast
                .actors()
                .iter()
                .map(|actor| self.patch_for(actor, decision, world));
            join_all(tasks).await
        };

        let mut updated = 0_usize;
        for result in patches {
            let (name, patch) = result?;
            let Some(patch) = patch.filter(|p| !p.is_empty()) else {
                continue;
            };
            if let Some(actor) = cast.get_mut(&name) {
                patch.apply(actor);
                updated = updated.saturating_add(1);
            }
        }
        info!(scene_id = %world.scene_id, updated, "actors updated");
        Ok(updated)
    }
}
