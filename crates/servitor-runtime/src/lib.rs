//! Servitor Runtime
//!
//! Binds the scheduler in `servitor-engine` to the `.act` script engine:
//! - [`ActEngine`]: compiles line-oriented `.act` scripts into actors
//! - [`run_targets`]: one actor per target, run until every actor is done

#![warn(missing_docs)]

pub mod actor;
pub mod directive;
pub mod engine;
pub mod net;

pub use actor::ActActor;
pub use directive::{ActScript, Directive};
pub use engine::{stdout_printer, ActEngine, Printer};

use servitor_engine::{RunSummary, RuntimeConfig, RuntimeResult, Supervisor};
use std::path::Path;
use std::sync::Arc;

/// Run `script` (resolved under `root`) once per target until all actors finish.
pub fn run_targets(
    config: RuntimeConfig,
    root: &Path,
    script: &str,
    targets: &[String],
) -> RuntimeResult<RunSummary> {
    run_with_engine(config, ActEngine::new(root), script, targets)
}

/// Like [`run_targets`] with a preconfigured engine.
pub fn run_with_engine(
    config: RuntimeConfig,
    engine: ActEngine,
    script: &str,
    targets: &[String],
) -> RuntimeResult<RunSummary> {
    let mut supervisor = Supervisor::new(config, Arc::new(engine))?;
    let summary = supervisor.run_to_completion(script, targets)?;
    tracing::info!(
        actors = summary.actors_spawned,
        steps = summary.steps,
        dead_letters = summary.dead_letters,
        script_errors = summary.script_errors,
        "run complete"
    );
    Ok(summary)
}
