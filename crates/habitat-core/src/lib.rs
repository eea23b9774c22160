//! Simulation clock, configuration, and tick orchestration for Habitat.
//!
//! This crate owns the tick cycle that drives the simulation core: it holds
//! the registries and engines from the lower crates and lends each engine
//! the slice of state it may touch, one call per tick.
//!
//! # Modules
//!
//! - [`clock`] -- [`SimClock`](clock::SimClock), tick counter and simulated
//!   milliseconds.
//! - [`config`] -- Configuration loading from `habitat-config.yaml` into
//!   strongly-typed structs.
//! - [`host`] -- [`HostState`](host::HostState), the hand-off to the host.
//! - [`tick`] -- [`Simulation`](tick::Simulation) and the tick cycle.
//! - [`control`] -- Pause, resume, and stop for a running loop.
//! - [`runner`] -- The async run loop.

pub mod clock;
pub mod config;
pub mod control;
pub mod host;
pub mod runner;
pub mod tick;

pub use tick::{Simulation, TickError, TickSummary};
