use habitat_events::{EventBus, EventEnvelope};
use habitat_types::{
    Animal, AnimalNeeds, AnimalState, Biome, DeathCause, Entity, EntityId, EntityKind, Genes,
    Position, ResourceKind, TerrainKind,
};
use habitat_world::{AnimalRegistry, EntityRegistry, SpatialConfig, SpatialIndex};

use crate::config::{AnimalConfig, SpeciesConfig};
use crate::engine::{AnimalEngine, AnimalWorld};
use crate::terrain::{TerrainPort, UniformTerrain};

const EPS: f32 = 1e-3;

struct Fixture {
    animals: AnimalRegistry,
    entities: EntityRegistry,
    spatial: SpatialIndex,
    events: EventBus,
    terrain: Box<dyn TerrainPort>,
}

impl Fixture {
    fn new(ground: TerrainKind) -> Self {
        Self {
            animals: AnimalRegistry::new(),
            entities: EntityRegistry::new(),
            spatial: SpatialIndex::new(SpatialConfig::default()),
            events: EventBus::new(),
            terrain: Box::new(UniformTerrain(ground)),
        }
    }

    /// A world view with the spatial index brought up to date, the way the
    /// orchestrator hands it out.
    fn world(&mut self) -> AnimalWorld<'_> {
        self.spatial.rebuild_if_needed(&mut self.entities, &mut self.animals);
        AnimalWorld {
            animals: &mut self.animals,
            entities: &mut self.entities,
            spatial: &mut self.spatial,
            terrain: self.terrain.as_ref(),
            events: &mut self.events,
            bounds: (100.0, 100.0),
        }
    }

    fn add(&mut self, animal: Animal) -> EntityId {
        let id = animal.id;
        self.animals.register(animal);
        id
    }

    fn get(&self, id: EntityId) -> Animal {
        self.animals.get(id).cloned().unwrap_or_else(|| animal("missing", 0.0, 0.0))
    }

    fn drained(&mut self) -> Vec<EventEnvelope> {
        self.events.drain()
    }
}

fn animal(species: &str, x: f32, y: f32) -> Animal {
    Animal {
        id: EntityId::new(),
        species: species.to_owned(),
        position: Position::new(x, y),
        state: AnimalState::Idle,
        needs: AnimalNeeds::default(),
        genes: Genes::default(),
        health: 100.0,
        age_years: 2.0,
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

fn hungry(mut a: Animal, hunger: f32) -> Animal {
    a.needs.hunger = hunger;
    a
}

fn calm() -> AnimalConfig {
    AnimalConfig {
        wander_chance: 0.0,
        ..AnimalConfig::default()
    }
}

/// Rabbits that ignore predators and agents.
fn fearless() -> AnimalConfig {
    let mut config = calm();
    for species in &mut config.species {
        if species.name == "rabbit" {
            species.predators.clear();
            species.flees_humans = false;
        }
    }
    config
}

fn count(events: &[EventEnvelope], name: &str) -> usize {
    events.iter().filter(|e| e.event.name() == name).count()
}

#[test]
fn rabbit_needs_decay_per_minute() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let id = fx.add(animal("rabbit", 50.0, 50.0));

    for tick in 1..=60_u64 {
        engine.update(1_000, tick * 1_000, &mut fx.world());
    }
    let needs = fx.get(id).needs;
    assert!((needs.hunger - 96.0).abs() < EPS, "hunger {}", needs.hunger);
    assert!((needs.thirst - 94.0).abs() < EPS, "thirst {}", needs.thirst);
    assert!((needs.reproductive_urge - 4.0).abs() < EPS);
}

#[test]
fn batch_and_per_animal_decay_agree() {
    let mut solo = Fixture::new(TerrainKind::Sand);
    let mut batched = Fixture::new(TerrainKind::Sand);
    let mut per_animal = AnimalEngine::new(calm());
    let mut batch = AnimalEngine::new(AnimalConfig {
        batch_threshold: 1,
        stagger_divisor: 1,
        ..calm()
    });

    let mut ids = Vec::new();
    for (species, x, size) in [("rabbit", 10.0, 0.6), ("deer", 30.0, 0.8), ("wolf", 50.0, 1.0), ("fox", 70.0, 1.2)] {
        let mut a = animal(species, x, 90.0);
        a.genes.size = size;
        a.needs.fear = 40.0;
        ids.push(a.id);
        solo.add(a.clone());
        batched.add(a);
    }

    for tick in 1..=5_u64 {
        let solo_report = per_animal.update(1_000, tick * 1_000, &mut solo.world());
        let batch_report = batch.update(1_000, tick * 1_000, &mut batched.world());
        assert!(!solo_report.batch);
        assert!(batch_report.batch);
    }
    for id in ids {
        let (a, b) = (solo.get(id).needs, batched.get(id).needs);
        assert!((a.hunger - b.hunger).abs() < 1e-5);
        assert!((a.thirst - b.thirst).abs() < 1e-5);
        assert!((a.fear - b.fear).abs() < 1e-5);
        assert!((a.reproductive_urge - b.reproductive_urge).abs() < 1e-5);
    }
    assert!(batch.batch_stats().relayouts >= 1);
}

#[test]
fn starving_animal_dies_once() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let id = fx.add(hungry(animal("rabbit", 50.0, 50.0), 0.01));

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(report.deaths, vec![(id, DeathCause::Starvation)]);
    assert!(!fx.animals.is_alive(id));
    assert_eq!(fx.get(id).state, AnimalState::Dead);

    let again = engine.update(1_000, 2_000, &mut fx.world());
    assert!(again.deaths.is_empty());
    assert_eq!(count(&fx.drained(), "animal_died"), 1);
}

#[test]
fn old_animals_die() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let mut elder = animal("rabbit", 50.0, 50.0);
    elder.age_years = 8.5;
    let id = fx.add(elder);

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(report.deaths, vec![(id, DeathCause::OldAge)]);
}

#[test]
fn recorded_hunts_kill_on_the_next_update() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let id = fx.add(animal("deer", 20.0, 20.0));

    engine.record_hunt(id, Some(EntityId::new()));
    engine.record_hunt(id, None);
    assert_eq!(engine.pending_hunts(), 2);

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(report.deaths, vec![(id, DeathCause::Hunted)]);
    assert_eq!(engine.pending_hunts(), 0);
    assert_eq!(fx.get(id).cause_of_death, Some(DeathCause::Hunted));
}

#[test]
fn prey_flees_from_predator() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let rabbit = fx.add(animal("rabbit", 50.0, 50.0));
    let wolf = fx.add(animal("wolf", 55.0, 50.0));

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(report.fleeing, 1);
    let fled = fx.get(rabbit);
    assert_eq!(fled.state, AnimalState::Fleeing);
    assert_eq!(fled.flee_from, Some(wolf));
    assert!((fled.needs.fear - 100.0).abs() < EPS);
    // Base speed 4 per second, directly away along x.
    assert!((fled.position.x - 46.0).abs() < EPS);
    assert!(fled.target_id.is_none());
}

#[test]
fn prey_flees_from_agents() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let deer = fx.add(animal("deer", 50.0, 50.0));
    let person = EntityId::new();
    fx.entities
        .register(Entity::new(person, EntityKind::Agent, Position::new(50.0, 45.0)));

    engine.update(1_000, 1_000, &mut fx.world());
    let fled = fx.get(deer);
    assert_eq!(fled.flee_from, Some(person));
    assert!(fled.position.y > 50.0);
}

#[test]
fn empty_threat_lookups_are_cached_until_expiry() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let rabbit = fx.add(animal("rabbit", 50.0, 50.0));

    engine.update(100, 100, &mut fx.world());
    fx.add(animal("wolf", 53.0, 50.0));

    // Inside the 500 ms TTL the cached "nothing here" still stands.
    engine.update(100, 200, &mut fx.world());
    assert_ne!(fx.get(rabbit).state, AnimalState::Fleeing);

    engine.update(500, 700, &mut fx.world());
    assert_eq!(fx.get(rabbit).state, AnimalState::Fleeing);
    assert!(engine.threat_cache_stats().hits >= 1);
}

#[test]
fn dead_threat_invalidates_the_cache() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let rabbit = fx.add(animal("rabbit", 50.0, 50.0));
    let wolf = fx.add(animal("wolf", 55.0, 50.0));

    engine.update(100, 100, &mut fx.world());
    assert_eq!(fx.get(rabbit).flee_from, Some(wolf));

    assert!(engine.kill_animal(wolf, DeathCause::Killed, 150, &mut fx.world()));
    engine.update(100, 200, &mut fx.world());
    let calmed = fx.get(rabbit);
    assert!(calmed.flee_from.is_none());
    assert_ne!(calmed.state, AnimalState::Fleeing);
    assert!(engine.threat_cache_stats().invalidations >= 1);
}

#[test]
fn hungry_predator_catches_prey_in_range() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(fearless());
    let rabbit = fx.add(animal("rabbit", 51.0, 50.0));
    let wolf = fx.add(hungry(animal("wolf", 50.0, 50.0), 30.0));

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert!(report.deaths.contains(&(rabbit, DeathCause::Predation)));
    let fed = fx.get(wolf);
    assert_eq!(fed.state, AnimalState::Eating);
    assert!(fed.needs.hunger > 85.0);
    assert_eq!(count(&fx.drained(), "animal_died"), 1);
}

#[test]
fn hungry_predator_chases_distant_prey() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(fearless());
    let rabbit = fx.add(animal("rabbit", 60.0, 50.0));
    let wolf = fx.add(hungry(animal("wolf", 50.0, 50.0), 30.0));

    engine.update(1_000, 1_000, &mut fx.world());
    let hunter = fx.get(wolf);
    assert_eq!(hunter.state, AnimalState::Hunting);
    assert_eq!(hunter.target_id, Some(rabbit));
    assert!((hunter.position.x - 55.5).abs() < EPS);
    assert!(fx.animals.is_alive(rabbit));
}

#[test]
fn herbivore_feeds_from_a_resource_node() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let deer = fx.add(hungry(animal("deer", 10.0, 10.0), 30.0));
    let node = EntityId::new();
    fx.entities.register(Entity::resource_node(
        node,
        ResourceKind::Food,
        Position::new(10.5, 10.0),
        10.0,
    ));

    engine.update(1_000, 1_000, &mut fx.world());
    let fed = fx.get(deer);
    assert_eq!(fed.state, AnimalState::Eating);
    assert_eq!(fed.target_id, Some(node));
    // 3/min decay, then 2 units at 10 each.
    assert!((fed.needs.hunger - 49.95).abs() < EPS);
    let left = fx.entities.get(node).map(|e| e.stats.amount);
    assert!(left.is_some_and(|v| (v - 8.0).abs() < EPS));
}

#[test]
fn thirsty_animal_walks_to_water() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let mut deer = animal("deer", 10.0, 10.0);
    deer.needs.thirst = 20.0;
    let deer = fx.add(deer);
    fx.entities.register(Entity::resource_node(
        EntityId::new(),
        ResourceKind::Water,
        Position::new(30.0, 10.0),
        10.0,
    ));

    engine.update(1_000, 1_000, &mut fx.world());
    let walking = fx.get(deer);
    assert_eq!(walking.state, AnimalState::SeekingWater);
    assert!((walking.position.x - 15.0).abs() < EPS);
}

#[test]
fn grazing_pays_off_after_the_dwell_time() {
    let mut fx = Fixture::new(TerrainKind::Grass);
    let mut engine = AnimalEngine::new(calm());
    let rabbit = fx.add(hungry(animal("rabbit", 50.0, 50.0), 30.0));

    for tick in 1..=3_u64 {
        engine.update(1_000, tick * 1_000, &mut fx.world());
    }
    let waiting = fx.get(rabbit);
    assert_eq!(waiting.state, AnimalState::Eating);
    assert!(waiting.needs.hunger < 30.0);

    engine.update(1_000, 4_000, &mut fx.world());
    let grazed = fx.get(rabbit).needs.hunger;
    assert!((grazed - (30.0 - 4.0 * 4.0 / 60.0 + 10.0)).abs() < EPS, "hunger {grazed}");
}

#[test]
fn ready_pair_produces_offspring() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(fearless());
    let mut mother = animal("rabbit", 50.0, 50.0);
    mother.needs.reproductive_urge = 90.0;
    mother.genes.speed = 1.4;
    mother.generation = 2;
    let mut father = animal("rabbit", 51.0, 50.0);
    father.needs.reproductive_urge = 90.0;
    father.genes.speed = 0.8;
    let (mother, father) = (fx.add(mother), fx.add(father));

    let report = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(report.births.len(), 1);
    let child = fx.get(report.births.first().copied().unwrap_or_default());
    let parents = [child.parent_a, child.parent_b];
    assert!(parents.contains(&Some(mother)) && parents.contains(&Some(father)));
    assert_eq!(child.generation, 3);
    assert!((child.genes.speed - 1.1).abs() <= 0.1 + 1e-5);

    for parent in [mother, father] {
        let p = fx.get(parent);
        assert!(p.needs.reproductive_urge < EPS);
        assert_eq!(p.mate_ready_at_ms, 61_000);
    }
    let events = fx.drained();
    assert_eq!(count(&events, "animal_reproduced"), 1);
    assert_eq!(count(&events, "animal_spawned"), 1);
}

#[test]
fn immature_animals_do_not_mate() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(fearless());
    for x in [50.0, 51.0] {
        let mut young = animal("rabbit", x, 50.0);
        young.age_years = 0.2;
        young.needs.reproductive_urge = 95.0;
        fx.add(young);
    }
    assert!(engine.update(1_000, 1_000, &mut fx.world()).births.is_empty());
}

#[test]
fn idle_animals_are_staggered_in_batch_mode() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(AnimalConfig {
        batch_threshold: 1,
        stagger_divisor: 5,
        ..fearless()
    });
    for i in 0..10_u8 {
        fx.add(animal("rabbit", 5.0 + f32::from(i) * 9.0, 50.0));
    }

    let first = engine.update(100, 100, &mut fx.world());
    assert_eq!(first.processed, 2);
    assert_eq!(first.staggered, 8);

    // Every animal gets a turn over one full rotation.
    let mut processed = first.processed;
    for tick in 2..=5_u64 {
        processed += engine.update(100, tick * 100, &mut fx.world()).processed;
    }
    assert_eq!(processed, 10);
}

#[test]
fn fleeing_is_never_staggered() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(AnimalConfig {
        batch_threshold: 1,
        stagger_divisor: 1,
        ..calm()
    });
    let rabbits: Vec<EntityId> = [45.0, 50.0, 55.0]
        .into_iter()
        .map(|y| fx.add(animal("rabbit", 50.0, y)))
        .collect();
    fx.add(animal("wolf", 60.0, 50.0));

    let first = engine.update(1_000, 1_000, &mut fx.world());
    assert_eq!(first.fleeing, 3);

    engine.config.stagger_divisor = 5;
    let second = engine.update(1_000, 2_000, &mut fx.world());
    assert_eq!(second.fleeing, 3);
    for id in rabbits {
        let r = fx.get(id);
        assert_eq!(r.state, AnimalState::Fleeing);
        assert!(r.position.x < 50.0);
    }
}

#[test]
fn spawn_respects_table_and_cap() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut config = calm();
    for species in &mut config.species {
        species.population_cap = 1;
    }
    let mut engine = AnimalEngine::new(config);

    let first = engine.spawn_animal("deer", Position::new(10.0, 10.0), Biome::Forest, &mut fx.world());
    assert!(first.is_some());
    let spawned = fx.get(first.unwrap_or_default());
    assert!(spawned.age_years >= 1.0);
    assert_eq!(spawned.biome, Biome::Forest);

    assert!(engine.spawn_animal("deer", Position::new(12.0, 10.0), Biome::Forest, &mut fx.world()).is_none());
    assert!(engine.spawn_animal("dragon", Position::new(12.0, 10.0), Biome::Forest, &mut fx.world()).is_none());
    assert_eq!(count(&fx.drained(), "animal_spawned"), 1);
}

#[test]
fn unknown_species_behave_generically() {
    let mut fx = Fixture::new(TerrainKind::Sand);
    let mut engine = AnimalEngine::new(calm());
    let id = EntityId::new();
    let mut stray = animal("capybara", 30.0, 30.0);
    stray.id = id;
    assert!(engine.register_animal(stray.clone(), &mut fx.world()));
    assert!(!engine.register_animal(stray, &mut fx.world()));

    engine.update(60_000, 60_000, &mut fx.world());
    let needs = fx.get(id).needs;
    assert!((needs.hunger - (100.0 - SpeciesConfig::default().hunger_per_minute)).abs() < EPS);
}
