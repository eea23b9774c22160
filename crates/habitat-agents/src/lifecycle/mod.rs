//! The lifecycle engine: aging, life stages, housing, breeding, and death.
//!
//! Each update ages every live agent, reassigns life stages from the fixed
//! age thresholds, kills agents past the maximum age, places newly adult
//! agents into households a few at a time, and periodically tries one
//! breeding pair. Death handling lives in [`death`] and breeding in
//! [`breeding`]; both are methods on [`LifecycleEngine`] so they share the
//! housing queue and pair cooldowns.

pub mod breeding;
pub mod death;

use std::collections::{BTreeMap, VecDeque};

use habitat_events::{EventBus, SimEvent};
use habitat_types::{Agent, DeathCause, EntityId, LifeStage};
use habitat_world::AgentRegistry;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::LifecycleConfig;
use crate::needs::NeedsEngine;
use crate::ports::PortSet;

pub use breeding::{blend_appearance, blend_traits};
pub use death::DeathCascade;

/// What the lifecycle engine may touch during one update.
pub struct LifecycleWorld<'a> {
    /// Agents.
    pub agents: &'a mut AgentRegistry,
    /// Needs records, for breeding gates and newborn registration.
    pub needs: &'a mut NeedsEngine,
    /// Dependent subsystems.
    pub ports: &'a mut PortSet,
    /// Outbound events.
    pub events: &'a mut EventBus,
    /// World width and height; newborns are kept inside.
    pub bounds: (f32, f32),
}

/// Outcome of one lifecycle update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleTickReport {
    /// Agents aged.
    pub aged: usize,
    /// Life stage transitions.
    pub stage_changes: usize,
    /// Agents that died of old age.
    pub old_age_deaths: Vec<EntityId>,
    /// Agents placed in a household.
    pub housed: usize,
    /// Whether a breeding check ran.
    pub breeding_checked: bool,
    /// Children born.
    pub births: Vec<EntityId>,
}

/// Ages agents and drives births and deaths.
#[derive(Debug)]
pub struct LifecycleEngine {
    config: LifecycleConfig,
    rng: StdRng,
    housing_queue: VecDeque<EntityId>,
    last_breeding_ms: Option<u64>,
    pair_cooldowns: BTreeMap<(EntityId, EntityId), u64>,
    reported_missing_household: bool,
}

impl LifecycleEngine {
    /// Create an engine with its RNG seeded from the config.
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            housing_queue: VecDeque::new(),
            last_breeding_ms: None,
            pair_cooldowns: BTreeMap::new(),
            reported_missing_household: false,
        }
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Agents waiting for a household.
    pub fn housing_backlog(&self) -> usize {
        self.housing_queue.len()
    }

    /// Pairs still inside their breeding cooldown.
    pub fn pairs_on_cooldown(&self) -> usize {
        self.pair_cooldowns.len()
    }

    /// Queue an agent for household placement.
    pub fn queue_housing(&mut self, id: EntityId) {
        if !self.housing_queue.contains(&id) {
            self.housing_queue.push_back(id);
        }
    }

    /// Register a founder agent with every subsystem.
    ///
    /// The life stage is derived from the agent's age. Adults are queued
    /// for housing. Returns `false` if the ID was already registered.
    pub fn register_agent(&mut self, mut agent: Agent, world: &mut LifecycleWorld<'_>) -> bool {
        let id = agent.id;
        let position = agent.position;
        agent.life_stage = self.config.stage_for_age(agent.age_years);
        let stage = agent.life_stage;
        if !world.agents.register(agent) {
            return false;
        }
        world.needs.register(id);
        if let Some(inventory) = world.ports.inventory.as_deref_mut() {
            inventory.open(id);
        }
        if let Some(movement) = world.ports.movement.as_deref_mut() {
            movement.register(id, position);
        }
        if let Some(genealogy) = world.ports.genealogy.as_deref_mut() {
            genealogy.record_founder(id);
        }
        if let Some(roles) = world.ports.roles.as_deref_mut() {
            roles.assign(id, stage);
        }
        if stage != LifeStage::Child {
            self.queue_housing(id);
        }
        true
    }

    /// Advance every live agent by `delta_ms`.
    pub fn update(&mut self, delta_ms: u64, now_ms: u64, world: &mut LifecycleWorld<'_>) -> LifecycleTickReport {
        let mut report = LifecycleTickReport::default();
        self.age_agents(delta_ms, now_ms, world, &mut report);
        self.process_housing(world, &mut report);

        let due = self
            .last_breeding_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.config.breeding_interval_ms);
        if due {
            self.last_breeding_ms = Some(now_ms);
            report.breeding_checked = true;
            self.pair_cooldowns.retain(|_, ready_at| *ready_at > now_ms);
            if let Some(child) = self.try_breed(now_ms, world) {
                report.births.push(child);
            }
        }

        debug!(
            aged = report.aged,
            stage_changes = report.stage_changes,
            old_age_deaths = report.old_age_deaths.len(),
            housed = report.housed,
            births = report.births.len(),
            "lifecycle tick"
        );
        report
    }

    #[allow(clippy::cast_precision_loss)]
    fn age_agents(
        &mut self,
        delta_ms: u64,
        now_ms: u64,
        world: &mut LifecycleWorld<'_>,
        report: &mut LifecycleTickReport,
    ) {
        let seconds_per_year = self.config.seconds_per_year.max(f32::EPSILON);
        let years = delta_ms as f32 / 1000.0 / seconds_per_year;

        for id in world.agents.alive_ids() {
            let mut aged = None;
            world.agents.update_untracked(id, |agent| {
                agent.age_years += years;
                aged = Some((agent.age_years, agent.life_stage, agent.immortal));
            });
            let Some((age, from, immortal)) = aged else {
                continue;
            };
            report.aged = report.aged.saturating_add(1);

            let to = self.config.stage_for_age(age);
            if to != from {
                world.agents.update(id, |agent| agent.life_stage = to);
                world.events.emit(SimEvent::LifeStageChanged { agent_id: id, from, to });
                if let Some(roles) = world.ports.roles.as_deref_mut() {
                    roles.assign(id, to);
                }
                if to == LifeStage::Adult {
                    self.queue_housing(id);
                }
                report.stage_changes = report.stage_changes.saturating_add(1);
                info!(agent_id = %id, from = from.as_str(), to = to.as_str(), "life stage changed");
            }

            if age > self.config.max_age && !immortal && self.kill_agent(id, DeathCause::OldAge, now_ms, world) {
                report.old_age_deaths.push(id);
            }
        }
    }

    fn process_housing(&mut self, world: &mut LifecycleWorld<'_>, report: &mut LifecycleTickReport) {
        if self.housing_queue.is_empty() {
            return;
        }
        let Some(households) = world.ports.household.as_deref_mut() else {
            if !self.reported_missing_household {
                debug!(backlog = self.housing_queue.len(), "no household port, housing queue held");
                self.reported_missing_household = true;
            }
            return;
        };

        for _ in 0..self.config.housing_per_tick {
            let Some(id) = self.housing_queue.pop_front() else {
                break;
            };
            if !world.agents.is_alive(id) || households.household_of(id).is_some() {
                continue;
            }
            if let Some(household_id) = households.assign(id) {
                world.events.emit(SimEvent::AgentHoused {
                    agent_id: id,
                    household_id,
                });
                report.housed = report.housed.saturating_add(1);
            }
        }
    }
}
