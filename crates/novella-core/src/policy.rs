//! Named round policies.
//!
//! Two orderings of the simulation depend on position: how a new goal enters
//! an actor's goal stack (first round versus later rounds) and when the
//! narrative-ending judgment may first be consulted. Both are plain values
//! here so tests and configuration can exercise each independently.

use novella_types::GoalUpdate;
use serde::Deserialize;

/// How generated goals enter the goal stack, by round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GoalPolicy {
    /// Update applied in round 1 of a scene.
    #[serde(default = "default_first_round")]
    pub first_round: GoalUpdate,
    /// Update applied in every round after the first.
    #[serde(default = "default_later_rounds")]
    pub later_rounds: GoalUpdate,
}

impl GoalPolicy {
    /// The update to apply in `round` (1-based).
    pub const fn for_round(&self, round: u32) -> GoalUpdate {
        if round <= 1 {
            self.first_round
        } else {
            self.later_rounds
        }
    }
}

impl Default for GoalPolicy {
    fn default() -> Self {
        Self {
            first_round: default_first_round(),
            later_rounds: default_later_rounds(),
        }
    }
}

/// When the narrative-ending judgment may be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Number of leading outer iterations that never consult the judgment.
    pub grace_iterations: u64,
}

impl TerminationPolicy {
    /// Whether the judgment runs after iteration `iteration` (0-based).
    pub const fn should_consult(&self, iteration: u64) -> bool {
        iteration >= self.grace_iterations
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            grace_iterations: 1,
        }
    }
}

const fn default_first_round() -> GoalUpdate {
    GoalUpdate::Append
}

const fn default_later_rounds() -> GoalUpdate {
    GoalUpdate::Replace
}
