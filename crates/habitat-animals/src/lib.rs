//! Animal behavior for the Habitat simulation core.
//!
//! Animals live in the [`AnimalRegistry`](habitat_world::AnimalRegistry)
//! owned by the orchestrator. Each tick the [`AnimalEngine`] decays their
//! needs, resolves hunts and natural deaths, and runs a priority-ordered
//! state machine per animal: flee, eat, drink, mate, wander.
//!
//! # Modules
//!
//! - [`config`] -- [`AnimalConfig`] and the [`SpeciesConfig`] table
//! - [`engine`] -- [`AnimalEngine`], [`AnimalWorld`], and the per-tick driver
//! - [`behavior`] -- The per-animal state machine
//! - [`needs`] -- Needs decay and the columnar layout for the batch path
//! - [`cache`] -- TTL caches for threat and resource lookups
//! - [`genetics`] -- Gene inheritance
//! - [`terrain`] -- The [`TerrainPort`] the host implements

pub mod behavior;
pub mod cache;
pub mod config;
pub mod engine;
pub mod genetics;
pub mod needs;
pub mod terrain;

pub use cache::{CacheStats, ResourceCache, ThreatCache, TtlCache};
pub use config::{AnimalConfig, SpeciesConfig};
pub use engine::{AnimalEngine, AnimalTickReport, AnimalWorld, death_cause};
pub use genetics::{blend_genes, founder_genes};
pub use needs::NeedsColumns;
pub use terrain::{PatchTerrain, TerrainPort, UniformTerrain};

#[cfg(test)]
mod tests;
