//! Prompt template loading and rendering via `minijinja`.
//!
//! Every prompt the engine sends is a template. The built-in set is compiled
//! into the crate; an optional directory can override any of them by file
//! name so operators can tune prompts without recompiling.

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use tracing::info;

/// Errors from loading or rendering prompt templates.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// An override file exists but could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        /// The override file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A template failed to compile or render.
    #[error("template {name} failed: {source}")]
    Template {
        /// Template name.
        name: &'static str,
        /// The underlying template error.
        source: minijinja::Error,
    },
}

/// Every prompt the engine renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// An actor's goal for the current round.
    Goal,
    /// An actor's plan for the current round.
    Plan,
    /// Folding a round of proposals into one decision.
    Merge,
    /// One yes/no quality question about a candidate decision.
    Predicate,
    /// Whether the best decision completes the scene goal.
    SceneJudge,
    /// Synthesizing the successor scene.
    NextScene,
    /// Whether the narrative ending has been reached.
    EndingJudge,
    /// Post-scene update of one actor.
    ActorUpdate,
    /// A chapter of prose for the scene.
    Narrative,
}

impl Template {
    /// All templates, in a stable order.
    pub const ALL: [Self; 9] = [
        Self::Goal,
        Self::Plan,
        Self::Merge,
        Self::Predicate,
        Self::SceneJudge,
        Self::NextScene,
        Self::EndingJudge,
        Self::ActorUpdate,
        Self::Narrative,
    ];

    /// Registered template name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Plan => "plan",
            Self::Merge => "merge",
            Self::Predicate => "predicate",
            Self::SceneJudge => "scene_judge",
            Self::NextScene => "next_scene",
            Self::EndingJudge => "ending_judge",
            Self::ActorUpdate => "actor_update",
            Self::Narrative => "narrative",
        }
    }

    /// File name looked up in an override directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Goal => "goal.j2",
            Self::Plan => "plan.j2",
            Self::Merge => "merge.j2",
            Self::Predicate => "predicate.j2",
            Self::SceneJudge => "scene_judge.j2",
            Self::NextScene => "next_scene.j2",
            Self::EndingJudge => "ending_judge.j2",
            Self::ActorUpdate => "actor_update.j2",
            Self::Narrative => "narrative.j2",
        }
    }

    const fn builtin_source(self) -> &'static str {
        match self {
            Self::Goal => include_str!("../templates/goal.j2"),
            Self::Plan => include_str!("../templates/plan.j2"),
            Self::Merge => include_str!("../templates/merge.j2"),
            Self::Predicate => include_str!("../templates/predicate.j2"),
            Self::SceneJudge => include_str!("../templates/scene_judge.j2"),
            Self::NextScene => include_str!("../templates/next_scene.j2"),
            Self::EndingJudge => include_str!("../templates/ending_judge.j2"),
            Self::ActorUpdate => include_str!("../templates/actor_update.j2"),
            Self::Narrative => include_str!("../templates/narrative.j2"),
        }
    }
}

/// Manages prompt template loading and rendering.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// A prompt engine with only the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if a built-in template fails to
    /// compile.
    pub fn builtin() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        for template in Template::ALL {
            env.add_template(template.name(), template.builtin_source())
                .map_err(|source| PromptError::Template {
                    name: template.name(),
                    source,
                })?;
        }
        Ok(Self { env })
    }

    /// The built-in templates, with any file in `dir` named after a template
    /// replacing it.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] if an override cannot be read or compiled.
    pub fn with_overrides(dir: &Path) -> Result<Self, PromptError> {
        let mut engine = Self::builtin()?;
        for template in Template::ALL {
            let path = dir.join(template.file_name());
            if !path.is_file() {
                continue;
            }
            let source = load_template(&path)?;
            engine
                .env
                .add_template_owned(template.name(), source)
                .map_err(|source| PromptError::Template {
                    name: template.name(),
                    source,
                })?;
            info!(template = template.name(), path = %path.display(), "prompt template overridden");
        }
        Ok(engine)
    }

    /// Render `template` with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn render<C: Serialize>(&self, template: Template, context: &C) -> Result<String, PromptError> {
        let to_error = |source| PromptError::Template {
            name: template.name(),
            source,
        };
        self.env
            .get_template(template.name())
            .map_err(to_error)?
            .render(context)
            .map_err(to_error)
    }
}

/// Read a template file from disk.
fn load_template(path: &Path) -> Result<String, PromptError> {
    std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}
