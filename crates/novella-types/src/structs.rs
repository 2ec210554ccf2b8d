//! Core records: actors, world states, outlines and background snapshots.
//!
//! All text fields are opaque to the engine. They are carried into prompts
//! and persisted as-is; the engine only reasons about identifiers, the goal
//! stack, the memory order, and the scene completion flag.

use serde::{Deserialize, Serialize};

use crate::error::OutlineError;
use crate::ids::SceneId;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// How a freshly generated goal is folded into an actor's goal stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalUpdate {
    /// Push the goal on top of the existing stack.
    Append,
    /// Discard the stack and keep only the new goal.
    Replace,
}

/// An independent narrative participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Unique name within the simulation.
    pub name: String,
    /// Personality description.
    #[serde(default)]
    pub personality: String,
    /// Narrative role (protagonist, antagonist, mentor...).
    #[serde(default)]
    pub role: String,
    /// Profession or occupation.
    #[serde(default)]
    pub profession: String,
    /// Current health status.
    #[serde(default)]
    pub health_status: String,
    /// Memory fragments, oldest first.
    #[serde(default)]
    pub memory: Vec<String>,
    /// Goal stack, oldest first.
    #[serde(default)]
    pub goals: Vec<String>,
}

impl Actor {
    /// Create an actor with the given name and empty attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            personality: String::new(),
            role: String::new(),
            profession: String::new(),
            health_status: String::new(),
            memory: Vec::new(),
            goals: Vec::new(),
        }
    }

    /// The most recent `count` memory fragments, oldest first.
    ///
    /// Returns the whole memory when it holds fewer than `count` fragments.
    pub fn recent_memory(&self, count: usize) -> &[String] {
        let skip = self.memory.len().saturating_sub(count);
        self.memory.get(skip..).unwrap_or_default()
    }

    /// Append a memory fragment.
    pub fn remember(&mut self, fragment: impl Into<String>) {
        self.memory.push(fragment.into());
    }

    /// The goal stack as it would look after folding in `goal`.
    pub fn goals_with(&self, goal: &str, update: GoalUpdate) -> Vec<String> {
        match update {
            GoalUpdate::Append => {
                let mut goals = self.goals.clone();
                goals.push(goal.to_owned());
                goals
            }
            GoalUpdate::Replace => vec![goal.to_owned()],
        }
    }

    /// Fold a new goal into the goal stack.
    pub fn apply_goal(&mut self, goal: String, update: GoalUpdate) {
        match update {
            GoalUpdate::Append => self.goals.push(goal),
            GoalUpdate::Replace => self.goals = vec![goal],
        }
    }
}

// ---------------------------------------------------------------------------
// Scene goal
// ---------------------------------------------------------------------------

/// Completion state of a scene goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// The scene is still active.
    #[default]
    Pending,
    /// The scene's purpose has been achieved.
    Complete,
}

/// The scene-local goal: the reason the scene exists.
///
/// The status is private so that the only transition available is
/// [`SceneGoal::mark_complete`]; a complete goal never becomes pending again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGoal {
    /// What has to happen for the scene to be complete.
    pub description: String,
    #[serde(default)]
    status: GoalStatus,
}

impl SceneGoal {
    /// A new, pending scene goal.
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: GoalStatus::Pending,
        }
    }

    /// Current status.
    pub const fn status(&self) -> GoalStatus {
        self.status
    }

    /// Whether the goal has been achieved.
    pub fn is_complete(&self) -> bool {
        self.status == GoalStatus::Complete
    }

    /// Mark the goal achieved. Idempotent.
    pub fn mark_complete(&mut self) {
        self.status = GoalStatus::Complete;
    }
}

// ---------------------------------------------------------------------------
// World state
// ---------------------------------------------------------------------------

/// The shared scene context every actor observes during a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Scene key, e.g. `scene_003`.
    pub scene_id: SceneId,
    /// Where the scene takes place.
    pub location: String,
    /// The event currently unfolding.
    #[serde(default)]
    pub event: String,
    /// Weather description.
    #[serde(default)]
    pub weather: String,
    /// Mood of the scene.
    #[serde(default)]
    pub atmosphere: String,
    /// Writing-style tag for rendered prose.
    #[serde(default)]
    pub writing_style: String,
    /// Recent events, oldest first.
    #[serde(default)]
    pub recent_events: Vec<String>,
    /// Names of the actors taking part in the scene.
    #[serde(default)]
    pub involved_characters: Vec<String>,
    /// The whole-narrative goal.
    #[serde(default)]
    pub long_term_goal: String,
    /// The scene-local goal with its completion flag.
    pub scene_goal: SceneGoal,
}

impl WorldState {
    /// Whether the scene goal has been achieved.
    pub fn is_scene_complete(&self) -> bool {
        self.scene_goal.is_complete()
    }

    /// Flip the scene goal to complete. There is no inverse operation.
    pub fn mark_scene_complete(&mut self) {
        self.scene_goal.mark_complete();
    }

    /// Append an entry to the recent-event log.
    pub fn record_event(&mut self, event: impl Into<String>) {
        self.recent_events.push(event.into());
    }

    /// Whether `name` takes part in this scene.
    ///
    /// An empty participant list means every actor takes part.
    pub fn involves(&self, name: &str) -> bool {
        self.involved_characters.is_empty() || self.involved_characters.iter().any(|n| n == name)
    }

    /// Stamp a synthesized scene with its key and a fresh, pending goal.
    pub fn from_draft(scene_id: SceneId, draft: SceneDraft) -> Self {
        Self {
            scene_id,
            location: draft.location,
            event: draft.event,
            weather: draft.weather,
            atmosphere: draft.atmosphere,
            writing_style: draft.writing_style,
            recent_events: draft.recent_events,
            involved_characters: draft.involved_characters,
            long_term_goal: draft.long_term_goal,
            scene_goal: SceneGoal::pending(draft.scene_goal.description),
        }
    }
}

/// The shape a generated scene is parsed into.
///
/// Carries every [`WorldState`] field except the key and the completion flag,
/// both of which are owned by the engine. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SceneDraft {
    /// Where the scene takes place.
    pub location: String,
    /// The event currently unfolding.
    #[serde(default)]
    pub event: String,
    /// Weather description.
    #[serde(default)]
    pub weather: String,
    /// Mood of the scene.
    #[serde(default)]
    pub atmosphere: String,
    /// Writing-style tag.
    #[serde(default)]
    pub writing_style: String,
    /// Recent events, oldest first.
    #[serde(default)]
    pub recent_events: Vec<String>,
    /// Names of participating actors.
    #[serde(default)]
    pub involved_characters: Vec<String>,
    /// The whole-narrative goal.
    #[serde(default)]
    pub long_term_goal: String,
    /// The new scene's goal; any status in the draft is discarded.
    pub scene_goal: DraftGoal,
}

/// Scene goal as it appears in a generated draft.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftGoal {
    /// What has to happen for the new scene to be complete.
    pub description: String,
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// The ending the whole narrative is driving towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ending {
    /// Prose description of the ending.
    pub description: String,
    /// Any further fields, passed through to prompts.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The narrative outline.
///
/// Only `ending.description` is interpreted; every other field is preserved
/// for prompt rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    /// The target ending.
    pub ending: Ending,
    /// Title, acts, themes and anything else the outline carries.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Ending {
    /// An ending with only a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Outline {
    /// An outline carrying nothing but its ending.
    pub fn new(ending: impl Into<String>) -> Self {
        Self {
            ending: Ending::new(ending),
            extra: serde_json::Map::new(),
        }
    }

    /// Check the fields the engine depends on.
    ///
    /// # Errors
    ///
    /// Returns [`OutlineError::EmptyEnding`] if the ending description is blank.
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.ending.description.trim().is_empty() {
            return Err(OutlineError::EmptyEnding);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

/// Snapshot of the world and every actor, handed to the renderer and selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Background {
    /// The scene as it stands after the rounds.
    pub world: WorldState,
    /// Every actor in registration order.
    pub actors: Vec<Actor>,
}
