//! Shared type definitions for the Habitat simulation core.
//!
//! This crate is the single source of truth for the records, tags, and
//! snapshot projections used across the Habitat workspace. Host-facing
//! types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity, zone, and event IDs
//! - [`enums`] -- Kind tags, life stages, needs, activities, animal states
//! - [`structs`] -- Positions, needs, genes, registry records, snapshots

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ActivityKind, AnimalState, Biome, DeathCause, Diet, EntityKind, LifeStage, NeedKind,
    NeedLevel, ResourceKind, Sex, TerrainKind, ZoneKind,
};
pub use ids::{EntityId, EventId, HouseholdId, ZoneId};
pub use structs::{
    Agent, AgentSnapshot, Animal, AnimalNeeds, AnimalSnapshot, Appearance, Entity, EntitySnapshot,
    EntityStats,
    GENE_MAX, GENE_MIN, Genes, NEED_MAX, Needs, PopulationStats, Position, RegistryStats, Traits,
    Zone, clamp_need,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for host-facing types.

    #[test]
    fn export_bindings() {
        // Calling export_all writes each type (and its dependencies) to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::ZoneId::export_all();
        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::HouseholdId::export_all();

        // Enums
        let _ = crate::enums::EntityKind::export_all();
        let _ = crate::enums::Sex::export_all();
        let _ = crate::enums::LifeStage::export_all();
        let _ = crate::enums::ActivityKind::export_all();
        let _ = crate::enums::NeedKind::export_all();
        let _ = crate::enums::NeedLevel::export_all();
        let _ = crate::enums::ZoneKind::export_all();
        let _ = crate::enums::ResourceKind::export_all();
        let _ = crate::enums::TerrainKind::export_all();
        let _ = crate::enums::Biome::export_all();
        let _ = crate::enums::AnimalState::export_all();
        let _ = crate::enums::Diet::export_all();
        let _ = crate::enums::DeathCause::export_all();

        // Structs
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Needs::export_all();
        let _ = crate::structs::AnimalNeeds::export_all();
        let _ = crate::structs::Traits::export_all();
        let _ = crate::structs::Appearance::export_all();
        let _ = crate::structs::Genes::export_all();
        let _ = crate::structs::EntityStats::export_all();
        let _ = crate::structs::Entity::export_all();
        let _ = crate::structs::Agent::export_all();
        let _ = crate::structs::Animal::export_all();
        let _ = crate::structs::Zone::export_all();
        let _ = crate::structs::EntitySnapshot::export_all();
        let _ = crate::structs::AgentSnapshot::export_all();
        let _ = crate::structs::AnimalSnapshot::export_all();
        let _ = crate::structs::RegistryStats::export_all();
        let _ = crate::structs::PopulationStats::export_all();
    }
}
