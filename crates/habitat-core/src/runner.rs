//! Async run loop around [`Simulation::tick`].
//!
//! [`run_simulation`] drives ticks until a termination condition is met:
//!
//! - **Bounded**: stop after `max_ticks` or `max_real_time_seconds`
//! - **Pause/resume**: the loop parks between ticks while paused
//! - **Stop**: [`RunControl::request_stop`] ends the run before the next tick
//! - **Extinction**: no agent and no animal is left alive
//!
//! The loop only sleeps between ticks. Engines never run concurrently.

use std::sync::Arc;

use tracing::{info, warn};

use crate::control::{RunControl, RunEndReason};
use crate::tick::{Simulation, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct RunResult {
    /// The reason the run ended.
    pub end_reason: RunEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Called after each tick completes.
pub trait TickCallback: Send {
    /// Called with the tick's summary and the simulation after the tick.
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation);
}

/// A callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _simulation: &Simulation) {}
}

/// Run ticks until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run_simulation(
    simulation: &mut Simulation,
    control: &Arc<RunControl>,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        max_real_time_seconds = control.max_real_time_seconds(),
        tick_interval_ms = control.tick_interval_ms(),
        "simulation starting"
    );

    loop {
        if control.is_paused() {
            info!("simulation paused");
            control.wait_if_paused().await;
            info!("simulation resumed");
        }

        let stop = if control.is_stop_requested() {
            Some(RunEndReason::Stopped)
        } else if control.time_limit_reached() {
            Some(RunEndReason::MaxRealTimeReached)
        } else {
            None
        };
        if let Some(reason) = stop {
            info!(?reason, elapsed_seconds = control.elapsed_seconds(), "simulation stopping");
            return Ok(finish(control, reason, last_summary, total_ticks).await);
        }

        let summary = simulation.tick()?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&summary, simulation);

        if summary.population.agents_alive == 0 && summary.population.animals_alive == 0 {
            info!(tick = summary.tick, "nothing left alive");
            return Ok(finish(control, RunEndReason::Extinction, Some(summary), total_ticks).await);
        }

        if control.tick_limit_reached(total_ticks) {
            info!(tick = summary.tick, max_ticks = control.max_ticks(), "tick limit reached");
            return Ok(finish(control, RunEndReason::MaxTicksReached, Some(summary), total_ticks).await);
        }

        last_summary = Some(summary);

        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    }
}

async fn finish(
    control: &RunControl,
    reason: RunEndReason,
    final_summary: Option<TickSummary>,
    total_ticks: u64,
) -> RunResult {
    control.set_end_reason(reason).await;
    RunResult {
        end_reason: reason,
        final_summary,
        total_ticks,
    }
}

/// Log how a run ended.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            agents_alive = summary.population.agents_alive,
            animals_alive = summary.population.animals_alive,
            "final tick summary"
        );
    } else {
        warn!("simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habitat_types::{Biome, Position};

    use super::*;
    use crate::config::SimulationConfig;

    fn simulation(max_ticks: u64) -> (Simulation, Arc<RunControl>) {
        let mut config = SimulationConfig::default();
        config.world.max_ticks = max_ticks;
        config.world.tick_interval_ms = 0;
        let control = Arc::new(RunControl::new(&config.world));
        let mut simulation = Simulation::new(config).unwrap();
        simulation.spawn_animal("deer", Position::new(10.0, 10.0), Biome::Grassland);
        (simulation, control)
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let (mut sim, control) = simulation(5);
        let result = run_simulation(&mut sim, &control, &mut NoOpCallback).await.unwrap();

        assert_eq!(result.end_reason, RunEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(control.end_reason().await, Some(RunEndReason::MaxTicksReached));
    }

    #[tokio::test]
    async fn stop_before_first_tick() {
        let (mut sim, control) = simulation(0);
        control.request_stop();
        let result = run_simulation(&mut sim, &control, &mut NoOpCallback).await.unwrap();

        assert_eq!(result.end_reason, RunEndReason::Stopped);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn empty_world_is_extinct_after_one_tick() {
        let config = SimulationConfig::default();
        let control = Arc::new(RunControl::new(&config.world));
        let mut sim = Simulation::new(config).unwrap();
        let result = run_simulation(&mut sim, &control, &mut NoOpCallback).await.unwrap();

        assert_eq!(result.end_reason, RunEndReason::Extinction);
        assert_eq!(result.total_ticks, 1);
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation) {
                assert_eq!(summary.tick, simulation.clock().tick());
                self.count = self.count.saturating_add(1);
            }
        }

        let (mut sim, control) = simulation(3);
        let mut cb = CountCallback { count: 0 };
        let _ = run_simulation(&mut sim, &control, &mut cb).await.unwrap();

        assert_eq!(cb.count, 3);
    }
}
