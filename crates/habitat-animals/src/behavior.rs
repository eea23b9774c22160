//! The per-animal state machine.
//!
//! Each think walks a fixed priority list and stops at the first rule that
//! applies:
//!
//! 1. a predator, or an agent for species that fear them, within detection
//!    range: flee;
//! 2. hungry: hunt (predators) or forage (everyone else);
//! 3. thirsty: forage for water;
//! 4. urge above the mating threshold: find a mate;
//! 5. otherwise idle, with a chance to start wandering.
//!
//! Work happens on a copy of the animal which is written back once at the
//! end.

use habitat_events::SimEvent;
use habitat_types::{
    Animal, AnimalNeeds, AnimalState, DeathCause, Diet, EntityId, EntityKind, NEED_MAX, Position,
    ResourceKind, clamp_need,
};
use habitat_world::{AnimalRegistry, EntityRegistry, SpatialHit};
use rand::Rng;
use tracing::info;

use crate::config::SpeciesConfig;
use crate::engine::{AnimalEngine, AnimalTickReport, AnimalWorld, FleeRow, ms_to_secs, uniform};
use crate::genetics::blend_genes;

/// Switch state, resetting the state timer, or keep it and let the timer
/// run.
fn enter(animal: &mut Animal, state: AnimalState, delta_ms: u64) {
    if animal.state == state {
        animal.state_timer_ms = animal.state_timer_ms.saturating_add(delta_ms);
    } else {
        animal.state = state;
        animal.state_timer_ms = 0;
    }
}

fn restore(needs: &mut AnimalNeeds, kind: ResourceKind, amount: f32) {
    match kind {
        ResourceKind::Water => needs.thirst = clamp_need(needs.thirst + amount),
        _ => needs.hunger = clamp_need(needs.hunger + amount),
    }
}

fn is_threat(species: &SpeciesConfig, hit: &SpatialHit, animals: &AnimalRegistry, entities: &EntityRegistry) -> bool {
    match hit.kind {
        EntityKind::Animal => animals
            .get(hit.id)
            .is_some_and(|a| a.is_alive() && species.is_hunted_by(&a.species)),
        EntityKind::Agent => species.flees_humans && entities.get(hit.id).is_some_and(|e| e.alive),
        _ => false,
    }
}

/// Current position of a live threat, or `None` once it has died.
fn threat_position(id: EntityId, world: &AnimalWorld<'_>) -> Option<Position> {
    world
        .animals
        .get(id)
        .filter(|a| a.is_alive())
        .map(|a| a.position)
        .or_else(|| {
            world
                .entities
                .get(id)
                .filter(|e| e.alive && e.kind == EntityKind::Agent)
                .map(|e| e.position)
        })
}

/// Nearest live animal of a species `species` hunts.
fn find_prey(animal: &Animal, species: &SpeciesConfig, world: &mut AnimalWorld<'_>) -> Option<(EntityId, Position)> {
    let animals = &*world.animals;
    world
        .spatial
        .nearest(animal.position, species.detection_range, Some(EntityKind::Animal), |hit| {
            hit.id != animal.id
                && animals
                    .get(hit.id)
                    .is_some_and(|p| p.is_alive() && species.hunts(&p.species))
        })
        .and_then(|hit| animals.get(hit.id).map(|p| (hit.id, p.position)))
}

impl AnimalEngine {
    /// Run the state machine for one animal.
    ///
    /// With a `flee_sink`, a fleeing animal's move is queued for the flee
    /// batch instead of applied here.
    pub(crate) fn think(
        &mut self,
        id: EntityId,
        delta_ms: u64,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
        flee_sink: Option<&mut Vec<FleeRow>>,
        report: &mut AnimalTickReport,
    ) {
        let Some(mut animal) = world.animals.get(id).filter(|a| a.is_alive()).cloned() else {
            return;
        };
        let species = self.species_for(&animal.species);
        let step = species.base_speed * animal.genes.speed * ms_to_secs(delta_ms);

        if let Some((threat, threat_at)) = self.find_threat(&animal, &species, now_ms, world) {
            enter(&mut animal, AnimalState::Fleeing, delta_ms);
            animal.needs.fear = NEED_MAX;
            animal.target_id = None;
            animal.target_position = None;
            animal.flee_from = Some(threat);
            match flee_sink {
                Some(rows) => rows.push(FleeRow {
                    id,
                    from: animal.position,
                    threat: threat_at,
                    step,
                }),
                None => animal.position = clamp(animal.position.step_away(threat_at, step), world),
            }
            report.fleeing = report.fleeing.saturating_add(1);
            commit(animal, world);
            return;
        }
        animal.flee_from = None;

        let acted = (animal.needs.hunger < self.config.hunger_threshold
            && self.seek_food(&mut animal, &species, step, delta_ms, now_ms, world, report))
            || (animal.needs.thirst < self.config.thirst_threshold
                && self.forage(&mut animal, &species, ResourceKind::Water, step, delta_ms, now_ms, world))
            || self.seek_mate(&mut animal, &species, step, delta_ms, now_ms, world, report);
        if !acted {
            self.idle(&mut animal, step, delta_ms, world);
        }
        commit(animal, world);
    }

    fn find_threat(
        &mut self,
        animal: &Animal,
        species: &SpeciesConfig,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
    ) -> Option<(EntityId, Position)> {
        if species.predators.is_empty() && !species.flees_humans {
            return None;
        }
        match self.threats.get(animal.id, now_ms) {
            Some(None) => return None,
            Some(Some(threat)) => match threat_position(threat, world) {
                Some(at) => return Some((threat, at)),
                None => {
                    self.threats.invalidate(animal.id);
                }
            },
            None => {}
        }

        let hits = world
            .spatial
            .query_radius(animal.position, species.detection_range, None);
        let found = hits
            .iter()
            .find(|hit| hit.id != animal.id && is_threat(species, hit, &*world.animals, &*world.entities))
            .map(|hit| hit.id);
        world.spatial.release(hits);

        self.threats.insert(animal.id, found, now_ms);
        found.and_then(|threat| threat_position(threat, world).map(|at| (threat, at)))
    }

    #[allow(clippy::too_many_arguments)]
    fn seek_food(
        &mut self,
        animal: &mut Animal,
        species: &SpeciesConfig,
        step: f32,
        delta_ms: u64,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
        report: &mut AnimalTickReport,
    ) -> bool {
        if species.is_predator() {
            if let Some((prey, prey_at)) = find_prey(animal, species, world) {
                enter(animal, AnimalState::Hunting, delta_ms);
                animal.target_id = Some(prey);
                animal.target_position = Some(prey_at);
                if animal.position.distance(prey_at) > species.attack_range {
                    animal.position = clamp(animal.position.step_toward(prey_at, step), world);
                    return true;
                }
                if self.kill_animal(prey, DeathCause::Predation, now_ms, world) {
                    report.deaths.push((prey, DeathCause::Predation));
                    restore(&mut animal.needs, ResourceKind::Food, self.config.prey_food);
                    enter(animal, AnimalState::Eating, delta_ms);
                    info!(hunter = %animal.id, %prey, species = %animal.species, "prey caught");
                }
                animal.target_id = None;
                animal.target_position = None;
                return true;
            }
            if species.diet == Diet::Carnivore {
                self.roam(animal, AnimalState::Hunting, step, delta_ms, world);
                return true;
            }
        }
        self.forage(animal, species, ResourceKind::Food, step, delta_ms, now_ms, world)
    }

    /// Head for the nearest stocked node of `kind` and feed from it, or
    /// feed from the terrain underfoot after the dwell time, or roam.
    #[allow(clippy::too_many_arguments)]
    fn forage(
        &mut self,
        animal: &mut Animal,
        species: &SpeciesConfig,
        kind: ResourceKind,
        step: f32,
        delta_ms: u64,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
    ) -> bool {
        let (seeking, feeding) = match kind {
            ResourceKind::Water => (AnimalState::SeekingWater, AnimalState::Drinking),
            _ => (AnimalState::SeekingFood, AnimalState::Eating),
        };

        if let Some((node, node_at)) = self.find_resource(animal, kind, now_ms, world) {
            animal.target_id = Some(node);
            animal.target_position = Some(node_at);
            if animal.position.distance(node_at) > self.config.arrive_distance {
                enter(animal, seeking, delta_ms);
                animal.position = clamp(animal.position.step_toward(node_at, step), world);
                return true;
            }
            enter(animal, feeding, delta_ms);
            let taken = world.entities.take_resource(node, self.config.feed_units);
            restore(&mut animal.needs, kind, taken * self.config.restore_per_unit);
            if !world.entities.is_stocked_resource(node, kind) {
                self.resources.invalidate((animal.id, kind));
            }
            return true;
        }

        animal.target_id = None;
        let ground = world.terrain.terrain_at(animal.position);
        let suitable = match kind {
            ResourceKind::Water => ground.yields_water(),
            _ => species.grazes && ground.yields_food(),
        };
        if suitable {
            animal.target_position = None;
            enter(animal, feeding, delta_ms);
            if animal.state_timer_ms >= self.config.graze_dwell_ms {
                restore(&mut animal.needs, kind, self.config.graze_restore);
                animal.state_timer_ms = 0;
            }
        } else {
            self.roam(animal, seeking, step, delta_ms, world);
        }
        true
    }

    fn find_resource(
        &mut self,
        animal: &Animal,
        kind: ResourceKind,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
    ) -> Option<(EntityId, Position)> {
        let key = (animal.id, kind);
        match self.resources.get(key, now_ms) {
            Some(None) => return None,
            Some(Some(node)) if world.entities.is_stocked_resource(node, kind) => {
                return world.entities.get(node).map(|e| (node, e.position));
            }
            Some(Some(_)) => {
                self.resources.invalidate(key);
            }
            None => {}
        }

        let entities = &*world.entities;
        let found = world
            .spatial
            .nearest(
                animal.position,
                self.config.resource_search_radius,
                Some(EntityKind::Resource),
                |hit| entities.is_stocked_resource(hit.id, kind),
            )
            .map(|hit| hit.id);
        self.resources.insert(key, found, now_ms);
        found.and_then(|node| world.entities.get(node).map(|e| (node, e.position)))
    }

    #[allow(clippy::too_many_arguments)]
    fn seek_mate(
        &mut self,
        animal: &mut Animal,
        species: &SpeciesConfig,
        step: f32,
        delta_ms: u64,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
        report: &mut AnimalTickReport,
    ) -> bool {
        let threshold = self.config.mating_threshold;
        if !ready_to_mate(animal, species, threshold, now_ms)
            || world.animals.species_count(&animal.species) >= species.population_cap
        {
            return false;
        }

        let animals = &*world.animals;
        let mate = world
            .spatial
            .nearest(animal.position, species.detection_range, Some(EntityKind::Animal), |hit| {
                hit.id != animal.id
                    && animals.get(hit.id).is_some_and(|m| {
                        m.is_alive() && m.species == animal.species && ready_to_mate(m, species, threshold, now_ms)
                    })
            })
            .and_then(|hit| animals.get(hit.id).map(|m| (hit.id, m.position)));
        let Some((mate, mate_at)) = mate else {
            return false;
        };

        enter(animal, AnimalState::Mating, delta_ms);
        animal.target_id = Some(mate);
        animal.target_position = Some(mate_at);
        if animal.position.distance(mate_at) > self.config.mating_range {
            animal.position = clamp(animal.position.step_toward(mate_at, step), world);
            return true;
        }
        if let Some(child) = self.breed(animal, mate, now_ms, world) {
            report.births.push(child);
        }
        true
    }

    /// Produce one offspring of `mother` and `father`. Both parents' urge
    /// resets and their cooldown starts.
    fn breed(&mut self, mother: &mut Animal, father: EntityId, now_ms: u64, world: &mut AnimalWorld<'_>) -> Option<EntityId> {
        let (father_genes, father_generation) = world
            .animals
            .get(father)
            .filter(|a| a.is_alive())
            .map(|a| (a.genes, a.generation))?;
        let genes = blend_genes(&mother.genes, &father_genes, self.config.gene_mutation, &mut self.rng);
        let ready_at = now_ms.saturating_add(self.config.mating_cooldown_ms);

        mother.needs.reproductive_urge = 0.0;
        mother.mate_ready_at_ms = ready_at;
        mother.target_id = None;
        mother.target_position = None;
        enter(mother, AnimalState::Idle, 0);
        world.animals.update(father, |f| {
            f.needs.reproductive_urge = 0.0;
            f.mate_ready_at_ms = ready_at;
            if f.state == AnimalState::Mating {
                f.state = AnimalState::Idle;
                f.state_timer_ms = 0;
                f.target_id = None;
                f.target_position = None;
            }
        });

        let reach = self.config.arrive_distance;
        let offset = Position::new(
            uniform(-reach, reach, &mut self.rng),
            uniform(-reach, reach, &mut self.rng),
        );
        let generation = mother.generation.max(father_generation).saturating_add(1);
        let child = Animal {
            id: EntityId::new(),
            species: mother.species.clone(),
            position: clamp(
                Position::new(mother.position.x + offset.x, mother.position.y + offset.y),
                world,
            ),
            state: AnimalState::Idle,
            needs: AnimalNeeds::default(),
            genes,
            health: 100.0 * genes.health,
            age_years: 0.0,
            generation,
            parent_a: Some(mother.id),
            parent_b: Some(father),
            target_position: None,
            target_id: None,
            flee_from: None,
            biome: mother.biome,
            dead: false,
            state_timer_ms: 0,
            mate_ready_at_ms: 0,
            died_at_ms: None,
            cause_of_death: None,
        };
        let child_id = child.id;
        if !self.register_animal(child, world) {
            return None;
        }
        world.events.emit(SimEvent::AnimalReproduced {
            mother: mother.id,
            father,
            child: child_id,
            species: mother.species.clone(),
        });
        info!(animal_id = %child_id, mother = %mother.id, %father, species = %mother.species, generation, "animal born");
        Some(child_id)
    }

    /// Idle animals may start wandering; every other state wanders.
    fn idle(&mut self, animal: &mut Animal, step: f32, delta_ms: u64, world: &AnimalWorld<'_>) {
        animal.target_id = None;
        if animal.state == AnimalState::Idle {
            let chance = if self.config.wander_chance.is_nan() {
                0.0
            } else {
                self.config.wander_chance.clamp(0.0, 1.0)
            };
            if !self.rng.random_bool(chance) {
                enter(animal, AnimalState::Idle, delta_ms);
                return;
            }
            animal.target_position = None;
        }
        self.roam(animal, AnimalState::Wandering, step, delta_ms, world);
    }

    /// Walk toward a random point near the animal, picking a new one on
    /// arrival. Wanderers that arrive go idle.
    fn roam(&mut self, animal: &mut Animal, state: AnimalState, step: f32, delta_ms: u64, world: &AnimalWorld<'_>) {
        enter(animal, state, delta_ms);
        let arrive = self.config.arrive_distance;
        let keep = animal
            .target_position
            .filter(|t| animal.target_id.is_none() && animal.position.distance(*t) > arrive);
        let target = keep.unwrap_or_else(|| {
            let radius = self.config.wander_radius;
            let x = animal.position.x + uniform(-radius, radius, &mut self.rng);
            let y = animal.position.y + uniform(-radius, radius, &mut self.rng);
            clamp(Position::new(x, y), world)
        });
        animal.target_id = None;
        animal.position = clamp(animal.position.step_toward(target, step), world);
        if state == AnimalState::Wandering && animal.position.distance(target) <= arrive {
            animal.target_position = None;
            enter(animal, AnimalState::Idle, delta_ms);
        } else {
            animal.target_position = Some(target);
        }
    }
}

fn ready_to_mate(animal: &Animal, species: &SpeciesConfig, threshold: f32, now_ms: u64) -> bool {
    animal.needs.reproductive_urge > threshold
        && now_ms >= animal.mate_ready_at_ms
        && animal.age_years >= species.maturity_years
}

fn clamp(position: Position, world: &AnimalWorld<'_>) -> Position {
    let (width, height) = world.bounds;
    position.clamp_to(width.max(0.0), height.max(0.0))
}

fn commit(animal: Animal, world: &mut AnimalWorld<'_>) {
    let id = animal.id;
    world.animals.update(id, move |slot| *slot = animal);
}
