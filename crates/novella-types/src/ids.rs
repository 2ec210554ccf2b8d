//! Identifier types.
//!
//! Scenes are keyed by human-readable strings of the form `scene_###`. The
//! numeric suffix is the scene counter: a completed scene is succeeded by the
//! scene whose counter is one higher, zero-padded to [`SCENE_NUMBER_WIDTH`].
//! Keys that do not follow the prefix convention are still accepted as long
//! as they embed an integer; the first run of digits is the counter.
//!
//! Runs are keyed by a UUID v7 so log lines from one run can be correlated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SceneIdError;

/// Prefix of every scene key produced by the engine.
pub const SCENE_PREFIX: &str = "scene_";

/// Zero-padding width of the scene counter.
pub const SCENE_NUMBER_WIDTH: usize = 3;

/// Key of one scene (one world state's lifespan).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Wrap an existing scene key verbatim.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build the canonical key for a scene counter, e.g. `4` -> `scene_004`.
    pub fn from_number(number: u32) -> Self {
        Self(format!(
            "{SCENE_PREFIX}{number:0width$}",
            width = SCENE_NUMBER_WIDTH
        ))
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the scene counter: the first run of ASCII digits in the key.
    ///
    /// # Errors
    ///
    /// Returns [`SceneIdError::NoDigits`] when the key has no digits and
    /// [`SceneIdError::Overflow`] when the digits do not fit in a `u32`.
    pub fn number(&self) -> Result<u32, SceneIdError> {
        let start = self
            .0
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| SceneIdError::NoDigits {
                key: self.0.clone(),
            })?;
        let rest = self.0.get(start..).unwrap_or_default();
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest.get(..end)
            .unwrap_or_default()
            .parse::<u32>()
            .map_err(|_parse| SceneIdError::Overflow {
                key: self.0.clone(),
            })
    }

    /// The key of the scene that follows this one.
    ///
    /// # Errors
    ///
    /// Propagates [`SceneId::number`] failures, and returns
    /// [`SceneIdError::Overflow`] if the counter cannot be incremented.
    pub fn next(&self) -> Result<Self, SceneIdError> {
        let next = self
            .number()?
            .checked_add(1)
            .ok_or_else(|| SceneIdError::Overflow {
                key: self.0.clone(),
            })?;
        Ok(Self::from_number(next))
    }
}

impl core::fmt::Display for SceneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Unique identifier for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
