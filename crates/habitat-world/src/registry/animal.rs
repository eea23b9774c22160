//! Registry of animals.
//!
//! Animal positions change every tick, so the spatial index polls them
//! rather than relying on the modified set; the dirty set here matters for
//! added and removed IDs.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use habitat_types::{
    Animal, AnimalNeeds, AnimalSnapshot, AnimalState, Biome, DeathCause, EntityId, Position,
    RegistryStats,
};

use super::{DirtySet, Record, RecordStore};
use crate::error::WorldError;

impl Record for Animal {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_alive(&self) -> bool {
        !self.dead
    }

    fn kill(&mut self) {
        self.dead = true;
        self.state = AnimalState::Dead;
        self.target_id = None;
        self.target_position = None;
        self.flee_from = None;
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn group_key(&self) -> String {
        self.species.clone()
    }
}

#[derive(Debug, Clone, Default)]
struct AnimalIndices {
    by_species: BTreeMap<String, Vec<EntityId>>,
    by_biome: BTreeMap<Biome, Vec<EntityId>>,
}

/// Owner of every [`Animal`] record.
#[derive(Debug, Clone, Default)]
pub struct AnimalRegistry {
    store: RecordStore<Animal>,
    indices: OnceCell<AnimalIndices>,
}

impl AnimalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an animal.
    pub fn get(&self, id: EntityId) -> Option<&Animal> {
        self.store.get(id)
    }

    /// Whether an animal with this ID exists (alive or dead).
    pub fn has(&self, id: EntityId) -> bool {
        self.store.has(id)
    }

    /// Whether the animal exists and is alive.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.store.get(id).is_some_and(Animal::is_alive)
    }

    /// Insert or replace an animal. Returns `true` if the ID was new.
    pub fn register(&mut self, animal: Animal) -> bool {
        self.indices.take();
        self.store.upsert(animal)
    }

    /// Delete an animal record outright.
    pub fn remove(&mut self, id: EntityId) -> Option<Animal> {
        self.indices.take();
        self.store.remove(id)
    }

    /// Flip an animal to dead without recording a cause.
    pub fn mark_dead(&mut self, id: EntityId) -> bool {
        let changed = self.store.mark_dead(id);
        if changed {
            self.indices.take();
        }
        changed
    }

    /// Flip an animal to dead and record why and when.
    pub fn mark_dead_with_cause(&mut self, id: EntityId, cause: DeathCause, now_ms: u64) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.store.update(id, |a| {
            a.cause_of_death = Some(cause);
            a.died_at_ms = Some(now_ms);
        });
        self.mark_dead(id)
    }

    /// Move an animal. `false` for unknown IDs.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> bool {
        self.store.set_position(id, position)
    }

    /// Mutate an animal in place. The closure must not kill the animal or
    /// change its species or biome; use
    /// [`mark_dead_with_cause`](Self::mark_dead_with_cause) to kill.
    pub fn update<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Animal) -> R) -> Option<R> {
        self.store.update(id, f)
    }

    /// Overwrite an animal's needs without marking it modified. Needs are
    /// not spatial, so the spatial index has no interest in them.
    pub fn write_needs(&mut self, id: EntityId, needs: AnimalNeeds) -> bool {
        self.store.update_untracked(id, |a| {
            a.needs = needs;
            a.needs.clamp_all();
        })
    }

    /// Every live animal, in ID order.
    pub fn all_alive(&self) -> impl Iterator<Item = &Animal> + Clone {
        self.store.iter_alive()
    }

    /// IDs of every live animal, in ID order.
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.store.alive_ids()
    }

    /// Live animals of one species.
    pub fn ids_of_species(&self, species: &str) -> &[EntityId] {
        self.index()
            .by_species
            .get(species)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Live animals in one biome.
    pub fn ids_in_biome(&self, biome: Biome) -> &[EntityId] {
        self.index()
            .by_biome
            .get(&biome)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of live animals of one species.
    pub fn species_count(&self, species: &str) -> usize {
        self.ids_of_species(species).len()
    }

    /// Number of live animals.
    pub fn alive_count(&self) -> usize {
        usize::try_from(self.store.stats().alive).unwrap_or(usize::MAX)
    }

    /// Cached aggregate counts, grouped by species.
    pub fn stats(&self) -> &RegistryStats {
        self.store.stats()
    }

    /// Alive-only projection for external consumers.
    pub fn export_snapshot(&self) -> Vec<AnimalSnapshot> {
        self.store
            .iter_alive()
            .map(|a| AnimalSnapshot {
                id: a.id,
                species: a.species.clone(),
                position: a.position,
                state: a.state,
                biome: a.biome,
                hunger: a.needs.hunger,
                thirst: a.needs.thirst,
            })
            .collect()
    }

    /// Insert animals whose IDs are not yet known.
    pub fn import_snapshot(&mut self, animals: impl IntoIterator<Item = Animal>) -> usize {
        self.indices.take();
        self.store.import(animals)
    }

    /// Parse a JSON array of animals and import them.
    pub fn import_snapshot_json(&mut self, json: &str) -> Result<usize, WorldError> {
        self.indices.take();
        self.store.import_json(json)
    }

    /// Take pending changes.
    pub fn take_dirty(&mut self) -> DirtySet {
        self.store.take_dirty()
    }

    /// Delete every dead animal.
    pub fn sweep_dead(&mut self) -> Vec<EntityId> {
        let swept = self.store.sweep_dead();
        if !swept.is_empty() {
            self.indices.take();
        }
        swept
    }

    /// Counter bumped when the alive membership changes.
    pub const fn membership_version(&self) -> u64 {
        self.store.membership_version()
    }

    /// Number of animals, alive or dead.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn index(&self) -> &AnimalIndices {
        self.indices.get_or_init(|| {
            let mut indices = AnimalIndices::default();
            for animal in self.store.iter_alive() {
                indices
                    .by_species
                    .entry(animal.species.clone())
                    .or_default()
                    .push(animal.id);
                indices.by_biome.entry(animal.biome).or_default().push(animal.id);
            }
            indices
        })
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::Genes;

    use super::*;

    fn rabbit(biome: Biome) -> Animal {
        Animal {
            id: EntityId::new(),
            species: "rabbit".to_owned(),
            position: Position::default(),
            state: AnimalState::Idle,
            needs: AnimalNeeds::default(),
            genes: Genes::default(),
            health: 100.0,
            age_years: 1.0,
            generation: 0,
            parent_a: None,
            parent_b: None,
            target_position: None,
            target_id: None,
            flee_from: None,
            biome,
            dead: false,
            state_timer_ms: 0,
            mate_ready_at_ms: 0,
            died_at_ms: None,
            cause_of_death: None,
        }
    }

    #[test]
    fn indices_follow_deaths() {
        let mut registry = AnimalRegistry::new();
        let a = rabbit(Biome::Grassland);
        let id = a.id;
        registry.register(a);
        registry.register(rabbit(Biome::Forest));
        assert_eq!(registry.species_count("rabbit"), 2);
        assert_eq!(registry.ids_in_biome(Biome::Grassland), &[id]);

        assert!(registry.mark_dead_with_cause(id, DeathCause::Hunted, 5));
        assert_eq!(registry.species_count("rabbit"), 1);
        assert!(registry.ids_in_biome(Biome::Grassland).is_empty());
        assert_eq!(registry.get(id).map(|a| a.state), Some(AnimalState::Dead));
    }

    #[test]
    fn write_needs_is_clamped_and_untracked() {
        let mut registry = AnimalRegistry::new();
        let a = rabbit(Biome::Grassland);
        let id = a.id;
        registry.register(a);
        let _ = registry.take_dirty();

        let needs = AnimalNeeds {
            hunger: 150.0,
            ..AnimalNeeds::default()
        };
        assert!(registry.write_needs(id, needs));
        assert!(registry.take_dirty().is_empty());
        assert!(registry.get(id).is_some_and(|a| (a.needs.hunger - 100.0).abs() < 1e-4));
    }
}
