//! Persistence seams for scenes and actors.
//!
//! The engine never touches the filesystem itself. It loads and saves
//! through these traits; the runner provides JSON-file implementations and
//! tests provide in-memory ones.

use std::path::PathBuf;

use novella_types::{Actor, SceneId, WorldState};

/// Errors raised by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file held malformed JSON or a record missing required fields.
    #[error("malformed record in {path}: {source}")]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A record was readable but unusable.
    #[error("invalid record: {reason}")]
    Invalid {
        /// What was wrong with it.
        reason: String,
    },
}

/// Loads and saves scenes by key.
pub trait SceneStore {
    /// Load the scene keyed `id`.
    fn load(&self, id: &SceneId) -> Result<WorldState, StoreError>;

    /// The key with the highest number among the stored scenes.
    fn latest(&self) -> Result<SceneId, StoreError>;

    /// Save `world` under its own key, replacing any previous version.
    fn save(&self, world: &WorldState) -> Result<(), StoreError>;
}

/// Loads and saves the full actor set.
pub trait ActorStore {
    /// Load every actor, in registration order.
    fn load_all(&self) -> Result<Vec<Actor>, StoreError>;

    /// Persist every actor in `actors`.
    fn save_all(&self, actors: &[Actor]) -> Result<(), StoreError>;
}
