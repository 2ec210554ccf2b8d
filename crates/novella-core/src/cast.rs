//! The validated set of actors taking part in a run.

use std::collections::HashSet;

use novella_types::Actor;

/// Errors from assembling a cast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastError {
    /// No actors were loaded.
    #[error("the cast is empty")]
    Empty,

    /// Two actors share a name.
    #[error("duplicate actor name: {name}")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },
}

/// A non-empty set of actors with unique names, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cast {
    actors: Vec<Actor>,
}

impl Cast {
    /// Validate and wrap `actors`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::Empty`] for no actors and
    /// [`CastError::DuplicateName`] when a name repeats.
    pub fn new(actors: Vec<Actor>) -> Result<Self, CastError> {
        if actors.is_empty() {
            return Err(CastError::Empty);
        }
        let mut seen = HashSet::with_capacity(actors.len());
        for actor in &actors {
            if !seen.insert(actor.name.as_str()) {
                return Err(CastError::DuplicateName {
                    name: actor.name.clone(),
                });
            }
        }
        Ok(Self { actors })
    }

    /// Every actor, in registration order.
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Look up an actor by name.
    pub fn get(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.name == name)
    }

    /// Look up an actor by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.name == name)
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Always `false`; a cast is never empty.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
