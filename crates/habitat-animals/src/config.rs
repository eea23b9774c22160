//! Tunables for the animal behavior engine and the species table.
//!
//! [`AnimalConfig`] deserializes from the `animals` section of
//! `habitat-config.yaml`. Omitted fields take their defaults; an omitted
//! `species` list yields the built-in rabbit, deer, fox, and wolf.

use std::collections::BTreeMap;

use habitat_types::Diet;
use serde::Deserialize;

/// One species' behavior and physiology.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    /// Species name, matched against [`Animal::species`](habitat_types::Animal::species).
    pub name: String,
    /// What the species eats.
    pub diet: Diet,
    /// Species this one flees from.
    pub predators: Vec<String>,
    /// Species this one hunts.
    pub prey: Vec<String>,
    /// Whether nearby agents count as threats.
    pub flees_humans: bool,
    /// Whether the species can graze food terrain when no resource is near.
    pub grazes: bool,
    /// Hunger lost per simulated minute.
    pub hunger_per_minute: f32,
    /// Thirst lost per simulated minute.
    pub thirst_per_minute: f32,
    /// Fear lost per simulated minute.
    pub fear_decay_per_minute: f32,
    /// Reproductive urge gained per simulated minute.
    pub urge_per_minute: f32,
    /// Movement in world units per second before the speed gene.
    pub base_speed: f32,
    /// Radius for threat, prey, and mate detection.
    pub detection_range: f32,
    /// Distance at which a hunter lands a kill.
    pub attack_range: f32,
    /// Age at which the species may mate.
    pub maturity_years: f32,
    /// Age at which the species dies of old age.
    pub max_age_years: f32,
    /// Live animals of this species above which no more are born or spawned.
    pub population_cap: usize,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            diet: Diet::Herbivore,
            predators: Vec::new(),
            prey: Vec::new(),
            flees_humans: true,
            grazes: true,
            hunger_per_minute: 4.0,
            thirst_per_minute: 6.0,
            fear_decay_per_minute: 30.0,
            urge_per_minute: 2.0,
            base_speed: 3.0,
            detection_range: 20.0,
            attack_range: 1.5,
            maturity_years: 1.0,
            max_age_years: 10.0,
            population_cap: 200,
        }
    }
}

impl SpeciesConfig {
    /// Whether animals of `species` hunt this one.
    pub fn is_hunted_by(&self, species: &str) -> bool {
        self.predators.iter().any(|p| p == species)
    }

    /// Whether this species hunts `species`.
    pub fn hunts(&self, species: &str) -> bool {
        self.prey.iter().any(|p| p == species)
    }

    /// Whether the species ever hunts.
    pub fn is_predator(&self) -> bool {
        !matches!(self.diet, Diet::Herbivore) && !self.prey.is_empty()
    }
}

/// Tunables for [`AnimalEngine`](crate::AnimalEngine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimalConfig {
    /// Live animals at or above which the batch paths run.
    pub batch_threshold: usize,
    /// Fleeing animals at or above which flee vectors go to the backend.
    pub flee_backend_threshold: usize,
    /// In batch mode, idle and wandering animals think once every this
    /// many ticks.
    pub stagger_divisor: u64,
    /// Hunger below which an animal looks for food.
    pub hunger_threshold: f32,
    /// Thirst below which an animal looks for water.
    pub thirst_threshold: f32,
    /// Reproductive urge above which an animal looks for a mate.
    pub mating_threshold: f32,
    /// Distance at which two animals can mate.
    pub mating_range: f32,
    /// Time after mating before an animal may mate again.
    pub mating_cooldown_ms: u64,
    /// Chance per think that an idle animal starts wandering.
    pub wander_chance: f64,
    /// Farthest a wander target is placed from the animal.
    pub wander_radius: f32,
    /// Lifetime of a cached threat lookup.
    pub threat_cache_ttl_ms: u64,
    /// Lifetime of a cached resource lookup.
    pub resource_cache_ttl_ms: u64,
    /// Radius searched for food and water nodes.
    pub resource_search_radius: f32,
    /// Distance at which an animal reaches its target.
    pub arrive_distance: f32,
    /// Time an animal must stay on food or water terrain before it gains.
    pub graze_dwell_ms: u64,
    /// Need restored by one dwell on food or water terrain.
    pub graze_restore: f32,
    /// Units taken from a resource node per feed.
    pub feed_units: f32,
    /// Need restored per resource unit taken.
    pub restore_per_unit: f32,
    /// Hunger a hunter regains from a kill.
    pub prey_food: f32,
    /// Real seconds per simulated year.
    pub seconds_per_year: f32,
    /// Largest random shift applied to each gene at birth.
    pub gene_mutation: f32,
    /// RNG seed.
    pub seed: u64,
    /// The species table.
    pub species: Vec<SpeciesConfig>,
}

impl Default for AnimalConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 200,
            flee_backend_threshold: 64,
            stagger_divisor: 5,
            hunger_threshold: 50.0,
            thirst_threshold: 50.0,
            mating_threshold: 80.0,
            mating_range: 3.0,
            mating_cooldown_ms: 60_000,
            wander_chance: 0.3,
            wander_radius: 15.0,
            threat_cache_ttl_ms: 500,
            resource_cache_ttl_ms: 2_000,
            resource_search_radius: 40.0,
            arrive_distance: 1.0,
            graze_dwell_ms: 3_000,
            graze_restore: 10.0,
            feed_units: 2.0,
            restore_per_unit: 10.0,
            prey_food: 60.0,
            seconds_per_year: 600.0,
            gene_mutation: 0.1,
            seed: 11,
            species: default_species(),
        }
    }
}

impl AnimalConfig {
    /// Species table keyed by name. Later entries win on duplicate names.
    pub fn species_table(&self) -> BTreeMap<String, SpeciesConfig> {
        self.species
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect()
    }
}

fn default_species() -> Vec<SpeciesConfig> {
    vec![
        SpeciesConfig {
            name: "rabbit".to_owned(),
            predators: vec!["fox".to_owned(), "wolf".to_owned()],
            base_speed: 4.0,
            max_age_years: 8.0,
            urge_per_minute: 4.0,
            ..SpeciesConfig::default()
        },
        SpeciesConfig {
            name: "deer".to_owned(),
            predators: vec!["wolf".to_owned()],
            hunger_per_minute: 3.0,
            thirst_per_minute: 4.0,
            base_speed: 5.0,
            detection_range: 25.0,
            max_age_years: 15.0,
            population_cap: 80,
            ..SpeciesConfig::default()
        },
        SpeciesConfig {
            name: "fox".to_owned(),
            diet: Diet::Omnivore,
            predators: vec!["wolf".to_owned()],
            prey: vec!["rabbit".to_owned()],
            hunger_per_minute: 3.0,
            thirst_per_minute: 4.0,
            base_speed: 4.5,
            max_age_years: 12.0,
            population_cap: 40,
            ..SpeciesConfig::default()
        },
        SpeciesConfig {
            name: "wolf".to_owned(),
            diet: Diet::Carnivore,
            prey: vec!["rabbit".to_owned(), "deer".to_owned()],
            flees_humans: false,
            grazes: false,
            hunger_per_minute: 2.5,
            thirst_per_minute: 3.0,
            base_speed: 5.5,
            detection_range: 30.0,
            attack_range: 2.0,
            maturity_years: 2.0,
            max_age_years: 14.0,
            population_cap: 20,
            ..SpeciesConfig::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_built_in_species() {
        let table = AnimalConfig::default().species_table();
        assert_eq!(table.len(), 4);
        let rabbit = table.get("rabbit");
        assert!(rabbit.is_some_and(|r| r.is_hunted_by("wolf") && !r.is_predator()));
        assert!(table.get("wolf").is_some_and(|w| w.hunts("deer") && w.is_predator()));
    }

    #[test]
    fn rabbit_decays_four_and_six_per_minute() {
        let table = AnimalConfig::default().species_table();
        let rabbit = table.get("rabbit").cloned().unwrap_or_default();
        assert!((rabbit.hunger_per_minute - 4.0).abs() < f32::EPSILON);
        assert!((rabbit.thirst_per_minute - 6.0).abs() < f32::EPSILON);
    }
}
