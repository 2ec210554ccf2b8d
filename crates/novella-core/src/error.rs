//! Errors that abort a simulation run.
//!
//! Degraded generation (failure text, unparseable merge output) never shows
//! up here; it is logged and carried forward as empty fields. Everything in
//! [`SimulationError`] is fatal for the run and names the collaborator and,
//! where one exists, the scene it failed on.

use novella_types::{OutlineError, SceneId, SceneIdError};

use crate::cast::CastError;
use crate::prompt::PromptError;
use crate::store::StoreError;

/// Fatal errors raised by the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A prompt template could not be rendered.
    #[error("prompt error: {source}")]
    Prompt {
        /// The underlying template error.
        #[from]
        source: PromptError,
    },

    /// The loaded actors do not form a valid cast.
    #[error("cast error: {source}")]
    Cast {
        /// The underlying cast validation error.
        #[from]
        source: CastError,
    },

    /// A scene key could not be advanced.
    #[error("scene identifier error: {source}")]
    SceneId {
        /// The underlying identifier error.
        #[from]
        source: SceneIdError,
    },

    /// The outline is missing a field the engine depends on.
    #[error("outline error: {source}")]
    Outline {
        /// The underlying outline error.
        #[from]
        source: OutlineError,
    },

    /// A persistence collaborator failed.
    #[error("{collaborator} store failed: {source}")]
    Store {
        /// Which store failed (`scene`, `actor`, `chapter`).
        collaborator: &'static str,
        /// The underlying store error.
        source: StoreError,
    },

    /// No actor in the cast takes part in the scene.
    #[error("no actor in the cast takes part in scene {scene_id}")]
    NoParticipants {
        /// The scene without participants.
        scene_id: SceneId,
    },

    /// The merger was handed an empty proposal set.
    #[error("cannot merge an empty proposal set")]
    EmptyProposals,

    /// The selector was handed an empty decision history.
    #[error("no decisions to select from for scene {scene_id}")]
    EmptyDecisionHistory {
        /// The scene whose history was empty.
        scene_id: SceneId,
    },

    /// A judgment collaborator answered outside its two recognized verdicts.
    #[error("{collaborator} returned an invalid verdict for scene {scene_id}: {response:?}")]
    InvalidVerdict {
        /// Which judgment failed (`scene judge`, `ending judge`).
        collaborator: &'static str,
        /// The scene being judged.
        scene_id: SceneId,
        /// The raw response.
        response: String,
    },

    /// A synthesized successor scene could not be used.
    #[error("malformed successor for scene {scene_id}: {reason}")]
    MalformedScene {
        /// The scene being succeeded.
        scene_id: SceneId,
        /// Why the synthesized scene was rejected.
        reason: String,
    },
}

impl SimulationError {
    /// Wrap a store error with the name of the failing store.
    pub const fn store(collaborator: &'static str, source: StoreError) -> Self {
        Self::Store {
            collaborator,
            source,
        }
    }
}
