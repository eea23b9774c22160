//! Agent needs, lifecycle, and the subsystems they reach through ports.
//!
//! This crate advances agent state each tick without touching I/O. It sits
//! between `habitat-world` (which owns the registries) and `habitat-core`
//! (which orchestrates the tick).
//!
//! # Modules
//!
//! - [`config`] -- Tunables for both engines ([`NeedsConfig`], [`LifecycleConfig`])
//! - [`error`] -- Error types for agent operations ([`AgentError`])
//! - [`needs`] -- Per-tick needs decay, consumption, and death checks ([`NeedsEngine`])
//! - [`lifecycle`] -- Aging, housing, breeding, and the death cascade ([`LifecycleEngine`])
//! - [`ports`] -- Capability traits for dependent subsystems ([`PortSet`])
//! - [`inventory`] -- Carried resources with carry capacity
//! - [`social`] -- Pairwise affinity graph
//! - [`household`] -- Household placement with capacity
//! - [`movement`] -- Movement targets
//! - [`roles`] -- Stage-based role assignment
//! - [`tasks`] -- Task queues and current activity
//! - [`genealogy`] -- Lineage tracking

pub mod config;
pub mod error;
pub mod genealogy;
pub mod household;
pub mod inventory;
pub mod lifecycle;
pub mod movement;
pub mod needs;
pub mod ports;
pub mod roles;
pub mod social;
pub mod tasks;

// Re-export primary types at crate root for convenience.
pub use config::{
    ActivityEnergy, CrossEffect, DeathThresholds, DecayRates, LifecycleConfig, NeedsConfig,
    StageMultipliers, ZoneBonus,
};
pub use error::AgentError;
pub use genealogy::GenealogyTracker;
pub use household::HouseholdRegistry;
pub use inventory::InventoryStore;
pub use lifecycle::{DeathCascade, LifecycleEngine, LifecycleTickReport, LifecycleWorld};
pub use movement::MovementTable;
pub use needs::{NeedsEngine, NeedsTickReport, NeedsWorld};
pub use ports::{
    ActivityPort, GenealogyPort, HouseholdPort, InventoryPort, MovementPort, PortSet, RolePort,
    SocialPort, TaskPort,
};
pub use roles::RoleBoard;
pub use social::SocialGraph;
pub use tasks::{ActivityBoard, TaskBoard};
