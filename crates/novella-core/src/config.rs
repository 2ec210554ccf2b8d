//! Configuration loading and typed config structures.
//!
//! The configuration lives in `novella.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure and a loader that
//! reads and validates the file. Every section and field is optional and
//! falls back to the defaults below.

use std::path::{Path, PathBuf};

use novella_types::SceneId;
use serde::Deserialize;

use crate::policy::{GoalPolicy, TerminationPolicy};
use crate::prompt::{PromptEngine, PromptError};
use crate::selector::{Predicate, default_predicates};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Round and loop settings.
    #[serde(default)]
    pub simulation: SimulationSection,

    /// Where scenes, actors, the outline and chapters live.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Text-generation client settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Prompt template settings.
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Decision selection settings.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `NOVELLA_RESOURCES_DIR` overrides `paths.resources_dir` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.paths.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.num_rounds == 0 {
            return Err(ConfigError::Invalid {
                reason: "simulation.num_rounds must be at least 1".to_owned(),
            });
        }
        if self.llm.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "llm.request_timeout_ms must be at least 1".to_owned(),
            });
        }
        if self.selection.predicates.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "selection.predicates must not be empty".to_owned(),
            });
        }
        if self
            .selection
            .predicates
            .iter()
            .any(|p| p.question.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                reason: "selection.predicates must not contain blank questions".to_owned(),
            });
        }
        Ok(())
    }
}

/// Round and loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSection {
    /// Proposal rounds per scene before selection.
    #[serde(default = "default_num_rounds")]
    pub num_rounds: u32,

    /// Maximum outer iterations (0 = unlimited).
    #[serde(default)]
    pub max_iterations: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Scene to start from; the latest stored scene when absent.
    #[serde(default)]
    pub start_scene: Option<SceneId>,

    /// Leading iterations that never consult the ending judgment.
    #[serde(default = "default_termination_grace_iterations")]
    pub termination_grace_iterations: u64,

    /// How generated goals enter actors' goal stacks.
    #[serde(default)]
    pub goal_policy: GoalPolicy,
}

impl SimulationSection {
    /// The termination policy these settings describe.
    pub const fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            grace_iterations: self.termination_grace_iterations,
        }
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            num_rounds: default_num_rounds(),
            max_iterations: 0,
            max_real_time_seconds: 0,
            start_scene: None,
            termination_grace_iterations: default_termination_grace_iterations(),
            goal_policy: GoalPolicy::default(),
        }
    }
}

/// Resource locations. Relative entries resolve against `resources_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathsConfig {
    /// Root of every resource directory.
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,

    /// Scene files (`scene_###.json`).
    #[serde(default = "default_environment_dir")]
    pub environment_dir: PathBuf,

    /// Actor files (`*.json`).
    #[serde(default = "default_character_dir")]
    pub character_dir: PathBuf,

    /// The outline file.
    #[serde(default = "default_outline_file")]
    pub outline_file: PathBuf,

    /// Rendered chapters (`<n>.txt`).
    #[serde(default = "default_novel_dir")]
    pub novel_dir: PathBuf,
}

impl PathsConfig {
    /// Override the resource root with `NOVELLA_RESOURCES_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NOVELLA_RESOURCES_DIR") {
            self.resources_dir = PathBuf::from(val);
        }
    }

    /// Resolved scene directory.
    pub fn scenes(&self) -> PathBuf {
        self.resources_dir.join(&self.environment_dir)
    }

    /// Resolved actor directory.
    pub fn actors(&self) -> PathBuf {
        self.resources_dir.join(&self.character_dir)
    }

    /// Resolved outline file.
    pub fn outline(&self) -> PathBuf {
        self.resources_dir.join(&self.outline_file)
    }

    /// Resolved chapter directory.
    pub fn novel(&self) -> PathBuf {
        self.resources_dir.join(&self.novel_dir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            resources_dir: default_resources_dir(),
            environment_dir: default_environment_dir(),
            character_dir: default_character_dir(),
            outline_file: default_outline_file(),
            novel_dir: default_novel_dir(),
        }
    }
}

/// Text-generation client settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Base backoff between retries in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Prompt template settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PromptsConfig {
    /// Directory whose `*.j2` files override the built-in templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

impl PromptsConfig {
    /// Build the prompt engine these settings describe.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] if a template cannot be read or compiled.
    pub fn engine(&self) -> Result<PromptEngine, PromptError> {
        match &self.templates_dir {
            Some(dir) => PromptEngine::with_overrides(dir),
            None => PromptEngine::builtin(),
        }
    }
}

/// Decision selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectionConfig {
    /// Quality questions asked about every candidate decision.
    #[serde(default = "default_predicates")]
    pub predicates: Vec<Predicate>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            predicates: default_predicates(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_num_rounds() -> u32 {
    3
}

const fn default_termination_grace_iterations() -> u64 {
    1
}

fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}

fn default_environment_dir() -> PathBuf {
    PathBuf::from("environment")
}

fn default_character_dir() -> PathBuf {
    PathBuf::from("character")
}

fn default_outline_file() -> PathBuf {
    PathBuf::from("outline").join("outline.json")
}

fn default_novel_dir() -> PathBuf {
    PathBuf::from("novel")
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_request_timeout_ms() -> u64 {
    60_000
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_tokens() -> u32 {
    2048
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use novella_types::GoalUpdate;

    use super::*;
    use crate::selector::Expected;

    #[test]
    fn default_config_matches_documented_values() {
        let config = SimulationConfig::default();
        assert_eq!(config.simulation.num_rounds, 3);
        assert_eq!(config.simulation.max_iterations, 0);
        assert_eq!(config.simulation.termination_grace_iterations, 1);
        assert_eq!(config.simulation.goal_policy, GoalPolicy::default());
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.request_timeout_ms, 60_000);
        assert_eq!(config.selection.predicates.len(), 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  num_rounds: 4
  max_iterations: 10
  max_real_time_seconds: 3600
  start_scene: "scene_002"
  termination_grace_iterations: 2
  goal_policy:
    first_round: replace
    later_rounds: append

paths:
  environment_dir: "scenes"
  novel_dir: "chapters"

llm:
  max_retries: 5
  request_timeout_ms: 1000
  retry_backoff_ms: 50
  temperature: 0.2
  max_tokens: 512

prompts:
  templates_dir: "prompts"

selection:
  predicates:
    - question: "Is the plan vivid?"
    - question: "Is the plan contradictory?"
      expect: "no"

logging:
  level: "debug"
  json: true
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok(), "full config should parse: {config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.simulation.num_rounds, 4);
        assert_eq!(config.simulation.max_iterations, 10);
        assert_eq!(
            config.simulation.start_scene.as_ref().map(SceneId::as_str),
            Some("scene_002")
        );
        assert_eq!(config.simulation.termination_policy().grace_iterations, 2);
        assert_eq!(config.simulation.goal_policy.first_round, GoalUpdate::Replace);
        assert_eq!(config.simulation.goal_policy.later_rounds, GoalUpdate::Append);
        assert!(config.paths.scenes().ends_with("scenes"));
        assert!(config.paths.novel().ends_with("chapters"));
        assert_eq!(config.llm.max_retries, 5);
        assert!((config.llm.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.prompts.templates_dir, Some(PathBuf::from("prompts")));
        assert_eq!(config.selection.predicates.len(), 2);
        assert_eq!(
            config.selection.predicates.last().map(|p| p.expect),
            Some(Expected::No)
        );
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "simulation:\n  num_rounds: 1\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        // Rounds are overridden
        assert_eq!(config.simulation.num_rounds, 1);
        // Everything else uses defaults
        assert_eq!(config.simulation.termination_grace_iterations, 1);
        assert_eq!(config.llm.max_tokens, 2048);
        assert!(config.paths.outline().ends_with("outline/outline.json"));
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn zero_rounds_are_rejected() {
        let result = SimulationConfig::parse("simulation:\n  num_rounds: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let result = SimulationConfig::parse("llm:\n  request_timeout_ms: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { reason }) if reason.contains("request_timeout_ms")
        ));
    }

    #[test]
    fn empty_predicates_are_rejected() {
        let result = SimulationConfig::parse("selection:\n  predicates: []\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn bad_yaml_is_reported() {
        let result = SimulationConfig::parse("simulation: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("novella.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
