//! Round orchestration and scene transitions for the Novella simulation.
//!
//! This crate owns the loop that turns a cast of actors and a scene into a
//! sequence of scenes:
//!
//! 1. **Propose** -- every involved actor proposes a goal and a plan,
//!    concurrently, against the same world state.
//! 2. **Merge** -- the round's proposals are folded into one decision.
//! 3. **Select** -- after a fixed number of rounds, the best decision of the
//!    scene is chosen.
//! 4. **Apply** -- the decision is rendered into prose and folded into the
//!    actors' state.
//! 5. **Transition** -- a completion judgment may close the scene and derive
//!    the next one.
//! 6. **Terminate** -- from the second iteration on, an ending judgment may
//!    stop the run.
//!
//! Text generation is injected through the [`TextOracle`] trait; persistence
//! through the traits in [`store`] and [`narrative`].
//!
//! # Modules
//!
//! - [`actor`] -- Goal and plan proposals for a single actor.
//! - [`cast`] -- The validated, ordered set of actors.
//! - [`config`] -- Configuration loading from `novella.yaml`.
//! - [`control`] -- Stop requests and run budgets.
//! - [`error`] -- [`SimulationError`].
//! - [`merge`] -- Proposal merging and merge-response parsing.
//! - [`narrative`] -- Chapter rendering and the chapter sink seam.
//! - [`oracle`] -- The [`TextOracle`] seam and failure-text conventions.
//! - [`parse`] -- JSON and verdict extraction from generated text.
//! - [`policy`] -- Goal-stack and termination policies.
//! - [`prompt`] -- Prompt templates.
//! - [`round`] -- Concurrent proposal collection.
//! - [`selector`] -- Best-decision selection.
//! - [`simulation`] -- The outer simulation loop.
//! - [`store`] -- Scene and actor persistence seams.
//! - [`termination`] -- Narrative-ending judgment.
//! - [`transition`] -- Scene completion and scene advancement.
//! - [`update`] -- Post-scene actor updates.
//!
//! [`TextOracle`]: oracle::TextOracle
//! [`SimulationError`]: error::SimulationError

pub mod actor;
pub mod cast;
pub mod config;
pub mod control;
pub mod error;
pub mod merge;
pub mod narrative;
pub mod oracle;
pub mod parse;
pub mod policy;
pub mod prompt;
pub mod round;
pub mod selector;
pub mod simulation;
pub mod store;
pub mod termination;
pub mod transition;
pub mod update;
