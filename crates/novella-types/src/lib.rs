//! Shared type definitions for the Novella simulation.
//!
//! This crate is the single source of truth for the records that flow
//! between the orchestration engine and its collaborators. Everything here
//! is plain data with `serde` derives; no I/O and no text generation.
//!
//! # Modules
//!
//! - [`ids`] -- Scene identifiers (`scene_###`) and run identifiers
//! - [`structs`] -- Actors, world states, scene goals, outlines, background snapshots
//! - [`proposals`] -- Per-actor proposals and merged decisions
//! - [`error`] -- Validation errors for identifiers and outlines

pub mod error;
pub mod ids;
pub mod proposals;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use error::{OutlineError, SceneIdError};
pub use ids::{RunId, SceneId};
pub use proposals::{Decision, DecisionSource, Proposal};
pub use structs::{
    Actor, Background, DraftGoal, Ending, GoalStatus, GoalUpdate, Outline, SceneDraft, SceneGoal,
    WorldState,
};
