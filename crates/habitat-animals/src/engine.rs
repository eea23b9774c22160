//! The animal engine: needs decay, death checks, and the per-tick driver
//! for the behavior state machine.
//!
//! One update runs four phases in order. Needs decay first, on the batch
//! path at or above `batch_threshold` live animals. Queued hunts are then
//! resolved, and every live animal is aged and checked for starvation,
//! dehydration, and old age. Finally each animal thinks (see
//! [`behavior`](crate::behavior)); in batch mode idle and wandering animals
//! think on a rotating subset of ticks and fleeing moves are computed as one
//! batch.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use habitat_compute::{BatchProcessor, BatchStats, ComputeBackend, ComputeError};
use habitat_events::{EventBus, SimEvent};
use habitat_types::{Animal, AnimalNeeds, AnimalState, Biome, DeathCause, EntityId, Position};
use habitat_world::{AnimalRegistry, EntityRegistry, SpatialIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ResourceCache, ThreatCache};
use crate::config::{AnimalConfig, SpeciesConfig};
use crate::genetics::founder_genes;
use crate::needs::{COLUMN_COUNT, NeedsColumns, apply_rates, need_rates};
use crate::terrain::TerrainPort;

/// What the animal engine may touch during one update.
pub struct AnimalWorld<'a> {
    /// Animals.
    pub animals: &'a mut AnimalRegistry,
    /// Resource nodes and agent projections.
    pub entities: &'a mut EntityRegistry,
    /// Spatial index for threat, prey, mate, and resource lookups.
    pub spatial: &'a mut SpatialIndex,
    /// Terrain under each position.
    pub terrain: &'a dyn TerrainPort,
    /// Outbound events.
    pub events: &'a mut EventBus,
    /// World width and height; animals are kept inside.
    pub bounds: (f32, f32),
}

/// Outcome of one animal update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimalTickReport {
    /// Whether the batch paths ran.
    pub batch: bool,
    /// Animals that ran the state machine.
    pub processed: usize,
    /// Idle or wandering animals skipped by staggering.
    pub staggered: usize,
    /// Animals that fled this tick.
    pub fleeing: usize,
    /// Animals that died, with the cause.
    pub deaths: Vec<(EntityId, DeathCause)>,
    /// Animals born.
    pub births: Vec<EntityId>,
}

/// One fleeing animal waiting for the flee batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FleeRow {
    pub(crate) id: EntityId,
    pub(crate) from: Position,
    pub(crate) threat: Position,
    pub(crate) step: f32,
}

/// Drives every animal through needs, death, and behavior.
#[derive(Debug)]
pub struct AnimalEngine {
    pub(crate) config: AnimalConfig,
    species: BTreeMap<String, Arc<SpeciesConfig>>,
    fallback: Arc<SpeciesConfig>,
    pub(crate) rng: StdRng,
    pub(crate) batch: BatchProcessor,
    pub(crate) threats: ThreatCache,
    pub(crate) resources: ResourceCache,
    hunts: Vec<(EntityId, Option<EntityId>)>,
    tick: u64,
    reported_unknown: BTreeSet<String>,
}

impl AnimalEngine {
    /// Create a CPU-only engine with its RNG seeded from the config.
    pub fn new(config: AnimalConfig) -> Self {
        let species = config
            .species_table()
            .into_iter()
            .map(|(name, s)| (name, Arc::new(s)))
            .collect();
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            batch: BatchProcessor::new(COLUMN_COUNT),
            threats: ThreatCache::new(config.threat_cache_ttl_ms),
            resources: ResourceCache::new(config.resource_cache_ttl_ms),
            species,
            fallback: Arc::new(SpeciesConfig {
                name: "unknown".to_owned(),
                ..SpeciesConfig::default()
            }),
            config,
            hunts: Vec::new(),
            tick: 0,
            reported_unknown: BTreeSet::new(),
        }
    }

    /// Attach an accelerated backend. Batches of at least
    /// `flee_backend_threshold` rows go to it.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn ComputeBackend>) -> Self {
        let threshold = self.config.flee_backend_threshold;
        self.batch.set_backend(Some(backend), threshold);
        self
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &AnimalConfig {
        &self.config
    }

    /// Name of the attached batch backend, if any.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.batch.backend_name()
    }

    /// Configuration of a known species.
    pub fn species(&self, name: &str) -> Option<&SpeciesConfig> {
        self.species.get(name).map(Arc::as_ref)
    }

    /// Species configuration, or the generic herbivore for unknown names.
    pub(crate) fn species_for(&self, name: &str) -> Arc<SpeciesConfig> {
        Arc::clone(self.species.get(name).unwrap_or(&self.fallback))
    }

    /// Updates run so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Batch execution counters.
    pub const fn batch_stats(&self) -> BatchStats {
        self.batch.stats()
    }

    /// Threat cache counters.
    pub const fn threat_cache_stats(&self) -> CacheStats {
        self.threats.stats()
    }

    /// Resource cache counters.
    pub const fn resource_cache_stats(&self) -> CacheStats {
        self.resources.stats()
    }

    /// Queue a hunt reported from outside the core. The animal dies at the
    /// start of the next update.
    pub fn record_hunt(&mut self, animal: EntityId, hunter: Option<EntityId>) {
        self.hunts.push((animal, hunter));
    }

    /// Hunts waiting for the next update.
    pub fn pending_hunts(&self) -> usize {
        self.hunts.len()
    }

    /// Spawn a founder of `species` at `position` with jittered genes and a
    /// random adult age.
    ///
    /// Returns `None` for species missing from the table and when the
    /// species is at its population cap.
    pub fn spawn_animal(
        &mut self,
        species: &str,
        position: Position,
        biome: Biome,
        world: &mut AnimalWorld<'_>,
    ) -> Option<EntityId> {
        let Some(config) = self.species.get(species).cloned() else {
            warn!(species, "cannot spawn unknown species");
            return None;
        };
        if world.animals.species_count(species) >= config.population_cap {
            debug!(species, cap = config.population_cap, "species at population cap, spawn skipped");
            return None;
        }
        let genes = founder_genes(self.config.gene_mutation, &mut self.rng);
        let oldest = (config.max_age_years * 0.5).max(config.maturity_years);
        let age_years = uniform(config.maturity_years, oldest, &mut self.rng);
        let (width, height) = world.bounds;
        let animal = Animal {
            id: EntityId::new(),
            species: species.to_owned(),
            position: position.clamp_to(width.max(0.0), height.max(0.0)),
            state: AnimalState::Idle,
            needs: AnimalNeeds::default(),
            genes,
            health: 100.0 * genes.health,
            age_years,
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
        };
        let id = animal.id;
        self.register_animal(animal, world).then_some(id)
    }

    /// Register an existing animal record and announce it.
    ///
    /// Needs are clamped on the way in. Unknown species are accepted and
    /// behave as a generic herbivore. Returns `false` if the ID was already
    /// registered.
    pub fn register_animal(&mut self, mut animal: Animal, world: &mut AnimalWorld<'_>) -> bool {
        animal.needs.clamp_all();
        if !self.species.contains_key(&animal.species) && self.reported_unknown.insert(animal.species.clone()) {
            warn!(species = %animal.species, "animal of unknown species, using generic behavior");
        }
        let (animal_id, position, species) = (animal.id, animal.position, animal.species.clone());
        if !world.animals.register(animal) {
            return false;
        }
        world.events.emit(SimEvent::AnimalSpawned {
            animal_id,
            species,
            position,
        });
        true
    }

    /// Kill an animal. Returns `false`, doing nothing, for unknown or
    /// already-dead animals.
    pub fn kill_animal(
        &mut self,
        id: EntityId,
        cause: DeathCause,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
    ) -> bool {
        let Some(species) = world.animals.get(id).map(|a| a.species.clone()) else {
            return false;
        };
        if !world.animals.mark_dead_with_cause(id, cause, now_ms) {
            return false;
        }
        self.threats.invalidate(id);
        self.resources.forget_where(|key| key.0 == id);
        info!(animal_id = %id, %species, %cause, "animal died");
        world.events.emit(SimEvent::AnimalDied {
            animal_id: id,
            species,
            cause,
        });
        true
    }

    /// Advance every live animal by `delta_ms`.
    pub fn update(&mut self, delta_ms: u64, now_ms: u64, world: &mut AnimalWorld<'_>) -> AnimalTickReport {
        let mut report = AnimalTickReport {
            batch: world.animals.alive_count() >= self.config.batch_threshold,
            ..AnimalTickReport::default()
        };
        let seconds = ms_to_secs(delta_ms);

        if report.batch {
            if let Err(err) = self.decay_batch(seconds, world.animals) {
                warn!(error = %err, "batch decay failed, decaying per animal");
                self.decay_each(seconds, world.animals);
            }
        } else {
            self.decay_each(seconds, world.animals);
        }

        for (animal, hunter) in std::mem::take(&mut self.hunts) {
            if self.kill_animal(animal, DeathCause::Hunted, now_ms, world) {
                debug!(animal_id = %animal, hunter = ?hunter, "hunt resolved");
                report.deaths.push((animal, DeathCause::Hunted));
            }
        }

        self.check_deaths(delta_ms, now_ms, world, &mut report);
        self.think_all(delta_ms, now_ms, world, &mut report);

        self.threats.prune(now_ms);
        self.resources.prune(now_ms);
        self.tick = self.tick.wrapping_add(1);

        debug!(
            tick = self.tick,
            batch = report.batch,
            processed = report.processed,
            staggered = report.staggered,
            fleeing = report.fleeing,
            deaths = report.deaths.len(),
            births = report.births.len(),
            "animal tick"
        );
        report
    }

    fn decay_each(&self, seconds: f32, animals: &mut AnimalRegistry) {
        for id in animals.alive_ids() {
            let Some(animal) = animals.get(id) else {
                continue;
            };
            let rates = need_rates(&self.species_for(&animal.species), animal);
            let mut needs = animal.needs;
            apply_rates(&mut needs, rates, seconds);
            animals.write_needs(id, needs);
        }
    }

    fn decay_batch(&mut self, seconds: f32, animals: &mut AnimalRegistry) -> Result<(), ComputeError> {
        let mut columns = NeedsColumns(animals);
        self.batch.rebuild_buffers(&columns);

        let rates: Vec<[f32; COLUMN_COUNT]> = self
            .batch
            .ids()
            .iter()
            .map(|id| {
                columns
                    .0
                    .get(*id)
                    .map_or([0.0; COLUMN_COUNT], |a| need_rates(&self.species_for(&a.species), a))
            })
            .collect();
        for column in 0..COLUMN_COUNT {
            let deltas: Vec<f32> = rates
                .iter()
                .map(|row| row.get(column).copied().unwrap_or(0.0) * seconds)
                .collect();
            self.batch.apply_column_delta(column, &deltas)?;
        }

        self.batch.sync_to_registry(&mut columns);
        Ok(())
    }

    fn check_deaths(
        &mut self,
        delta_ms: u64,
        now_ms: u64,
        world: &mut AnimalWorld<'_>,
        report: &mut AnimalTickReport,
    ) {
        let years = ms_to_secs(delta_ms) / self.config.seconds_per_year.max(f32::EPSILON);
        for id in world.animals.alive_ids() {
            world.animals.update(id, |a| a.age_years += years);
            let Some(animal) = world.animals.get(id) else {
                continue;
            };
            let Some(cause) = death_cause(animal, &self.species_for(&animal.species)) else {
                continue;
            };
            if self.kill_animal(id, cause, now_ms, world) {
                report.deaths.push((id, cause));
            }
        }
    }

    fn think_all(&mut self, delta_ms: u64, now_ms: u64, world: &mut AnimalWorld<'_>, report: &mut AnimalTickReport) {
        let divisor = self.config.stagger_divisor.max(1);
        let mut flee_rows = Vec::new();

        for (index, id) in world.animals.alive_ids().into_iter().enumerate() {
            let Some(state) = world.animals.get(id).filter(|a| a.is_alive()).map(|a| a.state) else {
                continue;
            };
            if report.batch && state.is_staggerable() {
                let slot = u64::try_from(index)
                    .unwrap_or(u64::MAX)
                    .wrapping_add(self.tick)
                    .checked_rem(divisor)
                    .unwrap_or(0);
                if slot != 0 {
                    report.staggered = report.staggered.saturating_add(1);
                    continue;
                }
            }
            let sink = report.batch.then_some(&mut flee_rows);
            self.think(id, delta_ms, now_ms, world, sink, report);
            report.processed = report.processed.saturating_add(1);
        }

        if !flee_rows.is_empty() {
            self.flee_batch(&flee_rows, world);
        }
    }

    fn flee_batch(&mut self, rows: &[FleeRow], world: &mut AnimalWorld<'_>) {
        let positions: Vec<Position> = rows.iter().map(|r| r.from).collect();
        let threats: Vec<Position> = rows.iter().map(|r| r.threat).collect();
        let steps: Vec<f32> = rows.iter().map(|r| r.step).collect();
        let moved = match self.batch.flee_vectors(&positions, &threats, &steps) {
            Ok(moved) => moved,
            Err(err) => {
                warn!(error = %err, rows = rows.len(), "flee batch failed, stepping per animal");
                rows.iter().map(|r| r.from.step_away(r.threat, r.step)).collect()
            }
        };
        let (width, height) = world.bounds;
        for (row, to) in rows.iter().zip(moved) {
            world
                .animals
                .set_position(row.id, to.clamp_to(width.max(0.0), height.max(0.0)));
        }
    }
}

/// Why an animal should die now, if it should. Starvation is checked
/// before dehydration, and both before old age.
pub fn death_cause(animal: &Animal, species: &SpeciesConfig) -> Option<DeathCause> {
    if animal.needs.hunger <= 0.0 {
        Some(DeathCause::Starvation)
    } else if animal.needs.thirst <= 0.0 {
        Some(DeathCause::Dehydration)
    } else if animal.age_years > species.max_age_years {
        Some(DeathCause::OldAge)
    } else {
        None
    }
}

/// Uniform in `[lo, hi]`, or `lo` when the range is empty.
pub(crate) fn uniform(lo: f32, hi: f32, rng: &mut impl Rng) -> f32 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn ms_to_secs(ms: u64) -> f32 {
    ms as f32 / 1000.0
}
