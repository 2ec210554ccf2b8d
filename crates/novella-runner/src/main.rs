//! Command-line entry point for the Novella simulation.
//!
//! The runner wires the engine to the outside world: it reads backend
//! credentials from the environment and everything else from
//! `novella.yaml`, builds an LLM-backed text oracle, opens the JSON-file
//! stores under the resource root, and drives the simulation loop until
//! the narrative ends, a budget runs out, or Ctrl-C requests a stop.
//!
//! # Architecture
//!
//! ```text
//! resources/ --> File stores --+
//!                              +--> SimulationLoop --> novel/<n>.txt
//! LLM API <-- OracleClient ----+
//! ```

mod config;
mod error;
mod llm;
mod store;

use anyhow::Context;
use novella_core::config::{LoggingConfig, SimulationConfig};
use novella_core::control::RunControl;
use novella_core::oracle::OracleContext;
use novella_core::simulation::{Collaborators, LoopSettings, SimulationLoop, Stores};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;
use crate::llm::{OracleClient, create_backend};
use crate::store::{FileActorStore, FileChapterSink, FileSceneStore, load_outline};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, resources, or the run itself fail.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let runner_config = RunnerConfig::from_env().context("loading runner environment")?;
    let config_missing = !runner_config.config_path.exists();
    let config = if config_missing {
        SimulationConfig::parse("").context("building default configuration")?
    } else {
        SimulationConfig::from_file(&runner_config.config_path).with_context(|| {
            format!("loading {}", runner_config.config_path.display())
        })?
    };

    init_logging(&config.logging);
    info!("novella-runner starting");
    if config_missing {
        warn!(
            path = %runner_config.config_path.display(),
            "config file not found, using defaults"
        );
    }

    // Prompt templates and text oracle
    let prompts = config.prompts.engine().context("loading prompt templates")?;
    let backend = create_backend(&runner_config.backend, &config.llm);
    let oracle = OracleClient::new(backend, &config.llm);
    info!(
        backend = oracle.backend_name(),
        model = runner_config.backend.model,
        max_retries = config.llm.max_retries,
        request_timeout_ms = config.llm.request_timeout_ms,
        "LLM backend configured"
    );
    let ctx = OracleContext::new(&oracle, &prompts);

    // Resources
    let paths = &config.paths;
    let outline = load_outline(&paths.outline()).context("loading outline")?;
    let scenes = FileSceneStore::new(paths.scenes());
    let actors = FileActorStore::new(paths.actors());
    let chapters = FileChapterSink::new(paths.novel());
    info!(
        resources_dir = %paths.resources_dir.display(),
        num_rounds = config.simulation.num_rounds,
        max_iterations = config.simulation.max_iterations,
        max_real_time_seconds = config.simulation.max_real_time_seconds,
        "resources opened"
    );

    // Loop
    let control = RunControl::from_config(&config.simulation);
    let collaborators = Collaborators::from_oracle(ctx, &config.selection.predicates, &chapters);
    let stores = Stores {
        scenes: &scenes,
        actors: &actors,
    };
    let simulation = SimulationLoop::new(
        ctx,
        collaborators,
        stores,
        &outline,
        &control,
        LoopSettings::from_config(&config.simulation),
    );

    let run = simulation.run();
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, stopping after the current stage");
            control.request_stop();
            run.await
        }
    }
    .context("simulation failed")?;

    let chapters_written = outcome.reports.iter().filter(|r| r.chapter.is_some()).count();
    info!(
        run_id = %outcome.run_id,
        end_reason = %outcome.end_reason,
        iterations = outcome.iterations,
        chapters_written,
        final_scene = %outcome.final_scene,
        "novella-runner finished"
    );
    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
