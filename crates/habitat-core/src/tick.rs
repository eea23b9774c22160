//! Tick cycle: the orchestrator that drives the Habitat core.
//!
//! [`Simulation`] owns every registry, the spatial index, the three engines,
//! the port set, and the event bus. Each tick runs these steps in order:
//!
//! 1. **Wake** -- advance the clock, apply a zone layout written by the host,
//!    and apply inbound commands (external kills and hunts).
//! 2. **Sync** -- reconcile agent projections into the entity registry and
//!    bring the spatial index up to date.
//! 3. **Needs** -- decay and consume; agents that die of unmet needs get the
//!    lifecycle death cascade.
//! 4. **Lifecycle** -- aging, stages, housing, breeding.
//! 5. **Animals** -- re-sync the index so threat detection sees agents born
//!    or moved this tick, then run the animal engine.
//! 6. **Cleanup** -- on its cadence, delete dead records.
//! 7. **Publish** -- write a [`HostFrame`] back and drain the tick's events.
//!
//! Each engine receives a narrow view of the state it may touch, never the
//! whole simulation. The cycle is deterministic given the same config,
//! seed, and command sequence.

use habitat_agents::{
    LifecycleEngine, LifecycleTickReport, LifecycleWorld, NeedsEngine, NeedsTickReport, NeedsWorld, PortSet,
};
use habitat_animals::{AnimalEngine, AnimalTickReport, AnimalWorld, TerrainPort, UniformTerrain};
use habitat_compute::ComputeBackend;
use habitat_events::{EventBus, EventEnvelope, InboundCommand};
use habitat_types::{
    Agent, Animal, Biome, DeathCause, Entity, EntityId, LifeStage, Needs, PopulationStats, Position, ResourceKind,
};
use habitat_world::{
    AgentRegistry, AnimalRegistry, EntityRegistry, RebuildKind, ReconcileConfig, SpatialIndex, ZoneMap,
    reconcile_agents,
};
use tracing::{debug, info};

use crate::clock::{ClockError, SimClock};
use crate::config::SimulationConfig;
use crate::host::{HostFrame, HostState};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated milliseconds at the end of the tick.
    pub now_ms: u64,
    /// Inbound commands applied.
    pub commands_applied: usize,
    /// How the spatial index was refreshed at the start of the tick.
    pub rebuild: RebuildKind,
    /// Needs engine outcome.
    pub needs: NeedsTickReport,
    /// Lifecycle engine outcome.
    pub lifecycle: LifecycleTickReport,
    /// Animal engine outcome.
    pub animals: AnimalTickReport,
    /// Dead records deleted by the cleanup sweep.
    pub swept: usize,
    /// Population at the end of the tick.
    pub population: PopulationStats,
    /// Events emitted during the tick, in emission order.
    pub events: Vec<EventEnvelope>,
}

/// The whole simulation core.
pub struct Simulation {
    config: SimulationConfig,
    clock: SimClock,
    entities: EntityRegistry,
    agents: AgentRegistry,
    animals: AnimalRegistry,
    spatial: SpatialIndex,
    zones: ZoneMap,
    reconcile: ReconcileConfig,
    needs: NeedsEngine,
    lifecycle: LifecycleEngine,
    animal_engine: AnimalEngine,
    ports: PortSet,
    events: EventBus,
    terrain: Box<dyn TerrainPort>,
    host: HostState,
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("clock", &self.clock)
            .field("agents", &self.agents.alive_count())
            .field("animals", &self.animals.alive_count())
            .field("entities", &self.entities.len())
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Build a simulation with in-memory ports and uniform grass terrain.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if the world timing is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self, TickError> {
        let clock = SimClock::new(&config.world)?;
        let (width, height) = config.world.bounds();
        let ports = PortSet::in_memory(config.population.carry_capacity, config.population.household_capacity);
        Ok(Self {
            clock,
            entities: EntityRegistry::new(),
            agents: AgentRegistry::new(),
            animals: AnimalRegistry::new(),
            spatial: SpatialIndex::new(config.spatial.clone()),
            zones: ZoneMap::new(),
            reconcile: ReconcileConfig {
                full_ratio: config.spatial.reconcile_ratio,
                move_threshold: config.spatial.move_threshold,
            },
            needs: NeedsEngine::new(config.needs.clone()),
            lifecycle: LifecycleEngine::new(config.lifecycle.clone()),
            animal_engine: AnimalEngine::new(config.animals.clone()),
            ports,
            events: EventBus::new(),
            terrain: Box::new(UniformTerrain::default()),
            host: HostState::new(width, height),
            config,
        })
    }

    /// Replace the port set.
    #[must_use]
    pub fn with_ports(mut self, ports: PortSet) -> Self {
        self.ports = ports;
        self
    }

    /// Replace the terrain the animal engine reads.
    #[must_use]
    pub fn with_terrain(mut self, terrain: Box<dyn TerrainPort>) -> Self {
        self.terrain = terrain;
        self
    }

    /// Attach a compute backend to the needs engine's batch path. Call
    /// before adding agents; the engine is rebuilt.
    #[must_use]
    pub fn with_needs_backend(mut self, backend: Box<dyn ComputeBackend>) -> Self {
        self.needs = NeedsEngine::new(self.config.needs.clone()).with_backend(backend);
        self
    }

    /// Attach a compute backend to the animal engine's batch path. Call
    /// before adding animals; the engine is rebuilt.
    #[must_use]
    pub fn with_animal_backend(mut self, backend: Box<dyn ComputeBackend>) -> Self {
        self.animal_engine = AnimalEngine::new(self.config.animals.clone()).with_backend(backend);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The configuration the simulation was built from.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Generic entities, including agent projections and resource nodes.
    pub const fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Agents.
    pub const fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Animals.
    pub const fn animals(&self) -> &AnimalRegistry {
        &self.animals
    }

    /// The spatial index as of the last sync.
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Thresholds for syncing agent projections into the entity registry.
    pub const fn reconcile_config(&self) -> &ReconcileConfig {
        &self.reconcile
    }

    /// Current zones.
    pub const fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    /// The needs engine.
    pub const fn needs(&self) -> &NeedsEngine {
        &self.needs
    }

    /// The lifecycle engine.
    pub const fn lifecycle(&self) -> &LifecycleEngine {
        &self.lifecycle
    }

    /// The animal engine.
    pub const fn animal_engine(&self) -> &AnimalEngine {
        &self.animal_engine
    }

    /// Dependent subsystems.
    pub const fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Dependent subsystems, mutably (host-driven actions).
    pub const fn ports_mut(&mut self) -> &mut PortSet {
        &mut self.ports
    }

    /// Host hand-off state.
    pub const fn host(&self) -> &HostState {
        &self.host
    }

    /// Host hand-off state, mutably (zone layout).
    pub const fn host_mut(&mut self) -> &mut HostState {
        &mut self.host
    }

    // -----------------------------------------------------------------------
    // Population management
    // -----------------------------------------------------------------------

    /// Register a founder agent with every subsystem.
    pub fn add_agent(&mut self, agent: Agent) -> bool {
        let Self {
            lifecycle,
            agents,
            needs,
            ports,
            events,
            config,
            ..
        } = self;
        lifecycle.register_agent(
            agent,
            &mut LifecycleWorld {
                agents,
                needs,
                ports,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    /// Kill an agent now and run the death cascade.
    pub fn kill_agent(&mut self, id: EntityId, cause: DeathCause) -> bool {
        let now_ms = self.clock.now_ms();
        let Self {
            lifecycle,
            agents,
            needs,
            ports,
            events,
            config,
            ..
        } = self;
        lifecycle.kill_agent(
            id,
            cause,
            now_ms,
            &mut LifecycleWorld {
                agents,
                needs,
                ports,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    /// Spawn a founder animal of a configured species.
    pub fn spawn_animal(&mut self, species: &str, position: Position, biome: Biome) -> Option<EntityId> {
        let Self {
            animal_engine,
            animals,
            entities,
            spatial,
            terrain,
            events,
            config,
            ..
        } = self;
        animal_engine.spawn_animal(
            species,
            position,
            biome,
            &mut AnimalWorld {
                animals,
                entities,
                spatial,
                terrain: &**terrain,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    /// Register a fully specified animal.
    pub fn add_animal(&mut self, animal: Animal) -> bool {
        let Self {
            animal_engine,
            animals,
            entities,
            spatial,
            terrain,
            events,
            config,
            ..
        } = self;
        animal_engine.register_animal(
            animal,
            &mut AnimalWorld {
                animals,
                entities,
                spatial,
                terrain: &**terrain,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    /// Place a resource node animals can feed or drink from.
    pub fn add_resource_node(&mut self, kind: ResourceKind, position: Position, amount: f32) -> EntityId {
        let id = EntityId::new();
        self.entities
            .register(Entity::resource_node(id, kind, position, amount));
        id
    }

    /// Overwrite a tracked agent's needs, clamped. `false` if untracked.
    pub fn set_needs(&mut self, id: EntityId, needs: Needs) -> bool {
        self.needs.set_needs(id, needs)
    }

    /// Queue a command for the start of the next tick.
    pub fn push_command(&mut self, command: InboundCommand) {
        self.events.push_command(command);
    }

    /// Living population.
    pub fn population(&self) -> PopulationStats {
        let mut stats = PopulationStats::default();
        for agent in self.agents.all_alive() {
            stats.agents_alive = stats.agents_alive.saturating_add(1);
            let slot = match agent.life_stage {
                LifeStage::Child => &mut stats.children,
                LifeStage::Adult => &mut stats.adults,
                LifeStage::Elder => &mut stats.elders,
            };
            *slot = slot.saturating_add(1);
        }
        for animal in self.animals.all_alive() {
            stats.animals_alive = stats.animals_alive.saturating_add(1);
            let count = stats.animals_by_species.entry(animal.species.clone()).or_insert(0);
            *count = count.saturating_add(1);
        }
        stats
    }

    // -----------------------------------------------------------------------
    // Tick cycle
    // -----------------------------------------------------------------------

    /// Run one tick of the configured length.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if simulated time would overflow.
    pub fn tick(&mut self) -> Result<TickSummary, TickError> {
        self.tick_by(self.clock.delta_ms())
    }

    /// Run one tick of `delta_ms` simulated milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if simulated time would overflow.
    pub fn tick_by(&mut self, delta_ms: u64) -> Result<TickSummary, TickError> {
        // --- Wake ---
        let tick = self.clock.advance_by(delta_ms)?;
        let now_ms = self.clock.now_ms();
        self.events.begin_tick(tick);
        if let Some(zones) = self.host.take_zones() {
            debug!(tick, zones = zones.len(), "zone layout replaced");
            self.zones.replace_all(zones);
        }
        let commands_applied = self.apply_commands(now_ms);

        // --- Sync ---
        let rebuild = self.sync_spatial();

        // --- Needs ---
        let needs = self.run_needs(delta_ms, now_ms);

        // --- Lifecycle ---
        let lifecycle = self.run_lifecycle(delta_ms, now_ms);

        // --- Animals ---
        self.sync_spatial();
        let animals = self.run_animals(delta_ms, now_ms);

        // --- Cleanup ---
        let swept = if self.clock.crossed(self.config.world.cleanup_interval_ms, delta_ms) {
            self.sweep_dead()
        } else {
            0
        };

        // --- Publish ---
        let population = self.population();
        self.host.publish(HostFrame {
            tick,
            now_ms,
            population: population.clone(),
            agents: self.agents.export_snapshot(),
            animals: self.animals.export_snapshot(),
        });
        let events = self.events.drain();

        debug!(
            tick,
            agents_alive = population.agents_alive,
            animals_alive = population.animals_alive,
            events = events.len(),
            swept,
            "tick complete"
        );

        Ok(TickSummary {
            tick,
            now_ms,
            commands_applied,
            rebuild,
            needs,
            lifecycle,
            animals,
            swept,
            population,
            events,
        })
    }

    /// Apply queued inbound commands. Returns how many took effect.
    fn apply_commands(&mut self, now_ms: u64) -> usize {
        let mut applied: usize = 0;
        for command in self.events.drain_commands() {
            let took_effect = match command {
                InboundCommand::KillAgent { agent_id, cause } => {
                    let Self {
                        lifecycle,
                        agents,
                        needs,
                        ports,
                        events,
                        config,
                        ..
                    } = self;
                    lifecycle.kill_agent(
                        agent_id,
                        cause,
                        now_ms,
                        &mut LifecycleWorld {
                            agents,
                            needs,
                            ports,
                            events,
                            bounds: config.world.bounds(),
                        },
                    )
                }
                InboundCommand::AnimalHunted { animal_id, hunter_id } => {
                    let known = self.animals.is_alive(animal_id);
                    if known {
                        self.animal_engine.record_hunt(animal_id, hunter_id);
                    }
                    known
                }
            };
            if took_effect {
                applied = applied.saturating_add(1);
            } else {
                debug!(?command, "inbound command had no target");
            }
        }
        applied
    }

    /// Reconcile agent projections, then refresh the spatial index.
    fn sync_spatial(&mut self) -> RebuildKind {
        reconcile_agents(&mut self.agents, &mut self.entities, &self.reconcile);
        self.spatial
            .rebuild_if_needed(&mut self.entities, &mut self.animals)
    }

    fn run_needs(&mut self, delta_ms: u64, now_ms: u64) -> NeedsTickReport {
        let Self {
            needs,
            lifecycle,
            agents,
            zones,
            ports,
            events,
            config,
            ..
        } = self;
        let report = needs.update(
            delta_ms,
            now_ms,
            &mut NeedsWorld {
                agents,
                zones,
                ports,
                events,
            },
        );
        let mut world = LifecycleWorld {
            agents,
            needs,
            ports,
            events,
            bounds: config.world.bounds(),
        };
        for (id, _) in &report.deaths {
            lifecycle.finalize_death(*id, now_ms, &mut world);
        }
        for id in &report.respawned {
            lifecycle.revive_agent(*id, &mut world);
        }
        report
    }

    fn run_lifecycle(&mut self, delta_ms: u64, now_ms: u64) -> LifecycleTickReport {
        let Self {
            lifecycle,
            agents,
            needs,
            ports,
            events,
            config,
            ..
        } = self;
        lifecycle.update(
            delta_ms,
            now_ms,
            &mut LifecycleWorld {
                agents,
                needs,
                ports,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    fn run_animals(&mut self, delta_ms: u64, now_ms: u64) -> AnimalTickReport {
        let Self {
            animal_engine,
            animals,
            entities,
            spatial,
            terrain,
            events,
            config,
            ..
        } = self;
        animal_engine.update(
            delta_ms,
            now_ms,
            &mut AnimalWorld {
                animals,
                entities,
                spatial,
                terrain: &**terrain,
                events,
                bounds: config.world.bounds(),
            },
        )
    }

    /// Delete dead records from every registry. Agents waiting to respawn
    /// are kept.
    fn sweep_dead(&mut self) -> usize {
        let needs = &self.needs;
        let agents = self
            .agents
            .sweep_dead_except(|id| needs.pending_respawn(id).is_some())
            .len();
        let animals = self.animals.sweep_dead().len();
        let entities = self.entities.sweep_dead().len();
        let swept = agents.saturating_add(animals).saturating_add(entities);
        if swept > 0 {
            info!(agents, animals, entities, "dead records swept");
        }
        swept
    }
}
