//! Seed population for a fresh simulation.
//!
//! At startup the spawner creates the founder agents with random names,
//! traits, and ages, hands each of them starting rations, scatters the
//! configured animal herds, and places food and water nodes. Everything is
//! drawn from one RNG seeded by `world.seed`, so a config reproduces the
//! same starting world.

use habitat_core::Simulation;
use habitat_types::{Agent, Appearance, Biome, EntityId, Position, ResourceKind, Sex, Traits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::EngineError;

/// Built-in pool of agent names. Picked without replacement.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze",
    "Iris", "Juniper", "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine",
    "Quill", "Reed", "Sage", "Thorn", "Umber", "Vale", "Wren", "Yarrow",
    "Zephyr", "Ash", "Brook", "Clay", "Dawn", "Elm", "Flint", "Gale",
    "Heath", "Ivy", "Jay", "Kale", "Lichen", "Maple", "Nyx", "Onyx",
    "Pebble", "Quartz", "Raven", "Sable", "Terra", "Urchin", "Vole",
    "Willow", "Xylem", "Yew",
];

/// Founder ages, in years.
const FOUNDER_AGE_MIN: f32 = 18.0;
const FOUNDER_AGE_MAX: f32 = 50.0;

/// What the spawner placed.
#[derive(Debug, Default)]
pub struct SeedReport {
    /// Founder agents, in spawn order.
    pub agents: Vec<EntityId>,
    /// Animals spawned across all species.
    pub animals: usize,
    /// Resource nodes placed.
    pub resource_nodes: usize,
}

/// Populate `simulation` from its `population` config section.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if the name pool is too small for the
/// requested founder count.
pub fn seed_population(simulation: &mut Simulation) -> Result<SeedReport, EngineError> {
    let config = simulation.config().clone();
    let population = &config.population;
    let (width, height) = config.world.bounds();
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    let mut report = SeedReport::default();

    let names = pick_unique_names(&mut rng, population.initial_agents)?;
    let sexes = assign_sexes(&mut rng, names.len());

    for (name, sex) in names.into_iter().zip(sexes) {
        let age_years = rng.random_range(FOUNDER_AGE_MIN..FOUNDER_AGE_MAX);
        let agent = Agent {
            id: EntityId::new(),
            name,
            position: random_position(&mut rng, width, height),
            alive: true,
            sex,
            age_years,
            life_stage: config.lifecycle.stage_for_age(age_years),
            generation: 0,
            parent_a: None,
            parent_b: None,
            traits: random_traits(&mut rng),
            appearance: Appearance {
                skin_tone: rng.random(),
                hair_tone: rng.random(),
                height: rng.random(),
            },
            social_status: rng.random_range(0.3..0.7),
            immortal: false,
            died_at_ms: None,
            cause_of_death: None,
        };
        let id = agent.id;
        let name = agent.name.clone();
        if !simulation.add_agent(agent) {
            warn!(agent_id = %id, name = %name, "founder rejected");
            continue;
        }
        if let Some(inventory) = simulation.ports_mut().inventory.as_deref_mut() {
            inventory.deposit(id, ResourceKind::Food, population.starting_rations);
            inventory.deposit(id, ResourceKind::Water, population.starting_rations);
        }
        info!(agent_id = %id, name = %name, ?sex, age_years, "spawned founder");
        report.agents.push(id);
    }

    for (species, &count) in &population.initial_animals {
        let biome = home_biome(species);
        for _ in 0..count {
            let position = random_position(&mut rng, width, height);
            if simulation.spawn_animal(species, position, biome).is_none() {
                warn!(species = %species, "species not configured, skipping herd");
                break;
            }
            report.animals = report.animals.saturating_add(1);
        }
    }

    for kind in [ResourceKind::Food, ResourceKind::Water] {
        for _ in 0..population.resource_nodes {
            let position = random_position(&mut rng, width, height);
            simulation.add_resource_node(kind, position, population.resource_amount);
            report.resource_nodes = report.resource_nodes.saturating_add(1);
        }
    }

    info!(
        agents = report.agents.len(),
        animals = report.animals,
        resource_nodes = report.resource_nodes,
        "seed population placed"
    );
    Ok(report)
}

/// Pick `count` unique names from the pool.
fn pick_unique_names(rng: &mut impl Rng, count: u32) -> Result<Vec<String>, EngineError> {
    let pool_len = NAME_POOL.len();
    let count = usize::try_from(count).map_err(|_conversion_err| EngineError::Spawner {
        message: format!("founder count {count} exceeds usize range"),
    })?;
    if count > pool_len {
        return Err(EngineError::Spawner {
            message: format!("requested {count} founders but the name pool only has {pool_len}"),
        });
    }

    // Partial Fisher-Yates over the pool indices.
    let mut indices: Vec<usize> = (0..pool_len).collect();
    for i in 0..count {
        let j = rng.random_range(i..pool_len);
        indices.swap(i, j);
    }
    Ok(indices
        .iter()
        .take(count)
        .filter_map(|&idx| NAME_POOL.get(idx))
        .map(|name| (*name).to_owned())
        .collect())
}

/// Sexes for `count` founders. Two or more always include a breeding pair.
fn assign_sexes(rng: &mut impl Rng, count: usize) -> Vec<Sex> {
    let mut sexes: Vec<Sex> = (0..count)
        .map(|_| if rng.random_bool(0.5) { Sex::Male } else { Sex::Female })
        .collect();
    if count >= 2 {
        let first_male = rng.random_bool(0.5);
        if let Some(first) = sexes.first_mut() {
            *first = if first_male { Sex::Male } else { Sex::Female };
        }
        if let Some(second) = sexes.get_mut(1) {
            *second = if first_male { Sex::Female } else { Sex::Male };
        }
    }
    sexes
}

fn random_traits(rng: &mut impl Rng) -> Traits {
    Traits {
        cooperation: rng.random(),
        aggression: rng.random(),
        diligence: rng.random(),
        curiosity: rng.random(),
        sociability: rng.random(),
        ..Traits::default()
    }
}

fn random_position(rng: &mut impl Rng, width: f32, height: f32) -> Position {
    Position::new(
        rng.random_range(0.0..width.max(1.0)),
        rng.random_range(0.0..height.max(1.0)),
    )
}

/// Biome a founder herd starts in.
fn home_biome(species: &str) -> Biome {
    match species {
        "deer" | "wolf" => Biome::Forest,
        _ => Biome::Grassland,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use habitat_core::config::SimulationConfig;

    use super::*;

    fn simulation(initial_agents: u32) -> Simulation {
        let mut config = SimulationConfig::default();
        config.population.initial_agents = initial_agents;
        config.population.resource_nodes = 2;
        Simulation::new(config).unwrap()
    }

    #[test]
    fn seeds_the_configured_population() {
        let mut sim = simulation(6);
        let report = seed_population(&mut sim).unwrap();

        assert_eq!(report.agents.len(), 6);
        assert_eq!(report.animals, 51);
        assert_eq!(report.resource_nodes, 4);
        let population = sim.population();
        assert_eq!(population.agents_alive, 6);
        assert_eq!(population.animals_alive, 51);
        assert_eq!(population.animals_by_species.get("wolf"), Some(&3));
    }

    #[test]
    fn founders_have_unique_names_and_a_breeding_pair() {
        let mut sim = simulation(12);
        let report = seed_population(&mut sim).unwrap();

        let agents: Vec<&Agent> = report.agents.iter().filter_map(|id| sim.agents().get(*id)).collect();
        let names: BTreeSet<&str> = agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), 12);
        assert!(agents.iter().any(|a| a.sex == Sex::Male));
        assert!(agents.iter().any(|a| a.sex == Sex::Female));
        assert!(agents.iter().all(|a| (FOUNDER_AGE_MIN..FOUNDER_AGE_MAX).contains(&a.age_years)));
    }

    #[test]
    fn founders_carry_starting_rations() {
        let mut sim = simulation(2);
        let report = seed_population(&mut sim).unwrap();
        let rations = sim.config().population.starting_rations;
        let inventory = sim.ports().inventory.as_deref().unwrap();
        for id in report.agents {
            assert_eq!(inventory.quantity(id, ResourceKind::Food), rations);
            assert_eq!(inventory.quantity(id, ResourceKind::Water), rations);
        }
    }

    #[test]
    fn same_seed_same_names() {
        let mut a = simulation(5);
        let mut b = simulation(5);
        let names = |sim: &Simulation, ids: &[EntityId]| -> Vec<String> {
            ids.iter().filter_map(|id| sim.agents().get(*id)).map(|a| a.name.clone()).collect()
        };
        let ra = seed_population(&mut a).unwrap();
        let rb = seed_population(&mut b).unwrap();
        assert_eq!(names(&a, &ra.agents), names(&b, &rb.agents));
    }

    #[test]
    fn unknown_species_is_skipped() {
        let mut config = SimulationConfig::default();
        config.population.initial_agents = 0;
        config.population.initial_animals = [("gryphon".to_owned(), 4), ("rabbit".to_owned(), 2)]
            .into_iter()
            .collect();
        let mut sim = Simulation::new(config).unwrap();
        let report = seed_population(&mut sim).unwrap();
        assert_eq!(report.animals, 2);
    }

    #[test]
    fn too_many_founders_is_an_error() {
        let mut sim = simulation(500);
        assert!(matches!(seed_population(&mut sim), Err(EngineError::Spawner { .. })));
    }

    #[test]
    fn small_counts_still_pair_up() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(assign_sexes(&mut rng, 0).is_empty());
        assert_eq!(assign_sexes(&mut rng, 1).len(), 1);
        let pair = assign_sexes(&mut rng, 2);
        assert_ne!(pair.first(), pair.get(1));
    }
}
