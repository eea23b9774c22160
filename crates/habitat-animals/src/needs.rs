//! Animal needs decay.
//!
//! Hunger, thirst, and fear fall over time and reproductive urge rises.
//! Hunger and thirst scale with the size gene; urge scales with fertility.
//! The per-animal path and the batch path compute the same per-row delta
//! and apply it with the same clamp.

use habitat_compute::ColumnarStore;
use habitat_types::{Animal, AnimalNeeds, EntityId, clamp_need};
use habitat_world::AnimalRegistry;

use crate::config::SpeciesConfig;

/// Column of hunger in the batch layout.
pub const HUNGER: usize = 0;
/// Column of thirst.
pub const THIRST: usize = 1;
/// Column of fear.
pub const FEAR: usize = 2;
/// Column of reproductive urge.
pub const URGE: usize = 3;
/// Number of batch columns.
pub const COLUMN_COUNT: usize = 4;

/// Signed per-second change of each need for one animal, in column order.
pub fn need_rates(species: &SpeciesConfig, animal: &Animal) -> [f32; COLUMN_COUNT] {
    let genes = &animal.genes;
    [
        -(species.hunger_per_minute / 60.0 * genes.size),
        -(species.thirst_per_minute / 60.0 * genes.size),
        -(species.fear_decay_per_minute / 60.0),
        species.urge_per_minute / 60.0 * genes.fertility,
    ]
}

/// Apply `rates` for `seconds` to one animal's needs.
pub fn apply_rates(needs: &mut AnimalNeeds, rates: [f32; COLUMN_COUNT], seconds: f32) {
    let [hunger, thirst, fear, urge] = rates.map(|r| r * seconds);
    needs.hunger = clamp_need(needs.hunger + hunger);
    needs.thirst = clamp_need(needs.thirst + thirst);
    needs.fear = clamp_need(needs.fear + fear);
    needs.reproductive_urge = clamp_need(needs.reproductive_urge + urge);
}

const fn to_columns(needs: &AnimalNeeds) -> [f32; COLUMN_COUNT] {
    [needs.hunger, needs.thirst, needs.fear, needs.reproductive_urge]
}

/// The animal registry's needs laid out as four columns.
///
/// Rows are the live animals in ID order. Writes go through
/// [`AnimalRegistry::write_needs`], which clamps and skips unknown IDs.
#[derive(Debug)]
pub struct NeedsColumns<'a>(pub &'a mut AnimalRegistry);

impl ColumnarStore for NeedsColumns<'_> {
    fn membership_version(&self) -> u64 {
        self.0.membership_version()
    }

    fn export_rows(&self, ids: &mut Vec<EntityId>, columns: &mut [Vec<f32>]) {
        ids.clear();
        ids.extend(self.0.all_alive().map(|a| a.id));
        self.refresh_rows(ids, columns);
    }

    fn refresh_rows(&self, ids: &[EntityId], columns: &mut [Vec<f32>]) {
        for column in columns.iter_mut() {
            column.clear();
        }
        for id in ids {
            let values = self.0.get(*id).map_or([0.0; COLUMN_COUNT], |a| to_columns(&a.needs));
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }
    }

    fn import_rows(&mut self, ids: &[EntityId], columns: &[Vec<f32>]) {
        for (row, id) in ids.iter().enumerate() {
            if !self.0.is_alive(*id) {
                continue;
            }
            let cell = |c: usize| columns.get(c).and_then(|col| col.get(row)).copied();
            let (Some(hunger), Some(thirst), Some(fear), Some(reproductive_urge)) =
                (cell(HUNGER), cell(THIRST), cell(FEAR), cell(URGE))
            else {
                continue;
            };
            self.0.write_needs(*id, AnimalNeeds {
                hunger,
                thirst,
                fear,
                reproductive_urge,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use habitat_compute::BatchProcessor;
    use habitat_types::{AnimalState, Biome, Genes, Position};

    use super::*;

    fn animal(size: f32) -> Animal {
        Animal {
            id: EntityId::new(),
            species: "rabbit".to_owned(),
            position: Position::default(),
            state: AnimalState::Idle,
            needs: AnimalNeeds::default(),
            genes: Genes {
                size,
                ..Genes::default()
            },
            health: 100.0,
            age_years: 1.0,
            generation: 0,
            parent_a: None,
            parent_b: None,
            target_position: None,
            target_id: None,
            flee_from: None,
            biome: Biome::Grassland,
            dead: false,
            state_timer_ms: 0,
            mate_ready_at_ms: 0,
            died_at_ms: None,
            cause_of_death: None,
        }
    }

    #[test]
    fn larger_animals_get_hungry_faster() {
        let species = SpeciesConfig::default();
        let [small_hunger, _, _, urge] = need_rates(&species, &animal(0.5));
        let [large_hunger, ..] = need_rates(&species, &animal(1.5));
        assert!(large_hunger < small_hunger);
        assert!(urge > 0.0);
    }

    #[test]
    fn columns_round_trip_through_the_registry() {
        let mut registry = AnimalRegistry::new();
        let a = animal(1.0);
        let id = a.id;
        registry.register(a);

        let mut batch = BatchProcessor::new(COLUMN_COUNT);
        let mut columns = NeedsColumns(&mut registry);
        batch.rebuild_buffers(&columns);
        assert_eq!(batch.ids(), &[id]);
        assert!(batch.apply_column_delta(HUNGER, &[-30.0]).is_ok());
        assert!(batch.apply_column_delta(URGE, &[250.0]).is_ok());
        batch.sync_to_registry(&mut columns);

        let needs = registry.get(id).map(|a| a.needs).unwrap_or_default();
        assert!((needs.hunger - 70.0).abs() < 1e-4);
        assert!((needs.reproductive_urge - 100.0).abs() < 1e-4);
    }
}
