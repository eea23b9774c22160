//! Engine binary for the Habitat simulation.
//!
//! Loads configuration, seeds the starting population, and drives the tick
//! loop until a termination condition is met or the process receives
//! Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `habitat-config.yaml` (or `HABITAT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the simulation with in-memory ports, attaching the rayon
//!    backend when `compute.parallel` is set
//! 4. Seed agents, animals, and resource nodes
//! 5. Create run control and wire Ctrl-C to a stop request
//! 6. Run the simulation loop
//! 7. Log the result

mod error;
mod spawner;

use std::sync::Arc;

use habitat_compute::RayonBackend;
use habitat_core::Simulation;
use habitat_core::config::{LoggingConfig, SimulationConfig};
use habitat_core::control::RunControl;
use habitat_core::runner::{self, TickCallback};
use habitat_core::tick::TickSummary;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Ticks between periodic progress lines.
const PROGRESS_EVERY_TICKS: u64 = 100;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = SimulationConfig::load().map_err(EngineError::from)?;
    let (config, source) = match loaded {
        Some((config, path)) => (config, Some(path)),
        None => (SimulationConfig::default(), None),
    };

    init_logging(&config.logging);
    info!("habitat-engine starting");
    match source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("config file not found, using defaults"),
    }
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        width = config.world.width,
        height = config.world.height,
        tick_delta_ms = config.world.tick_delta_ms,
        "world configured"
    );

    let control = Arc::new(RunControl::new(&config.world));
    let mut simulation = attach_backends(Simulation::new(config).map_err(EngineError::from)?);
    spawner::seed_population(&mut simulation)?;

    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("ctrl-c received, stopping after the current tick");
                    control.request_stop();
                }
                Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
            }
        });
    }

    let mut callback = ProgressCallback;
    let result = runner::run_simulation(&mut simulation, &control, &mut callback)
        .await
        .map_err(EngineError::from)?;
    runner::log_run_end(&result);

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "habitat-engine shutdown complete"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Attach the rayon backend to both batch paths when `compute.parallel`
/// is set. Must run before seeding, since attaching rebuilds the engines.
fn attach_backends(simulation: Simulation) -> Simulation {
    if !simulation.config().compute.parallel {
        info!("batch compute on cpu kernels");
        return simulation;
    }
    let simulation = simulation
        .with_needs_backend(Box::new(RayonBackend))
        .with_animal_backend(Box::new(RayonBackend));
    info!(
        needs_backend = ?simulation.needs().backend_name(),
        animal_backend = ?simulation.animal_engine().backend_name(),
        "batch compute backend attached"
    );
    simulation
}

/// Logs population counts as the run progresses.
struct ProgressCallback;

impl TickCallback for ProgressCallback {
    fn on_tick(&mut self, summary: &TickSummary, _simulation: &Simulation) {
        debug!(
            tick = summary.tick,
            events = summary.events.len(),
            deaths = summary.needs.deaths.len(),
            "tick complete"
        );
        if summary.tick.checked_rem(PROGRESS_EVERY_TICKS) == Some(0) {
            info!(
                tick = summary.tick,
                now_ms = summary.now_ms,
                agents_alive = summary.population.agents_alive,
                animals_alive = summary.population.animals_alive,
                "simulation progress"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cpu_kernels_by_default() {
        let simulation = attach_backends(Simulation::new(SimulationConfig::default()).unwrap());
        assert_eq!(simulation.needs().backend_name(), None);
        assert_eq!(simulation.animal_engine().backend_name(), None);
    }

    #[test]
    fn parallel_flag_attaches_rayon_to_both_engines() {
        let mut config = SimulationConfig::default();
        config.compute.parallel = true;
        let mut simulation = attach_backends(Simulation::new(config).unwrap());
        assert_eq!(simulation.needs().backend_name(), Some("rayon"));
        assert_eq!(simulation.animal_engine().backend_name(), Some("rayon"));

        let report = spawner::seed_population(&mut simulation).unwrap();
        let summary = simulation.tick().unwrap();
        assert_eq!(report.agents.len(), 20);
        assert_eq!(summary.population.agents_alive, 20);
    }
}
