//! The needs engine.
//!
//! Advances every live agent's [`Needs`] once per tick: decay, inventory
//! consumption, zone bonuses, cross-effects, death checks, emergency
//! consumption, and threshold notifications, in that order.
//!
//! Small populations run the per-entity path. At or above
//! [`NeedsConfig::batch_threshold`] records, decay and cross-effects run
//! through a [`BatchProcessor`] over columnar copies of the needs, with the
//! per-entity steps in between. Both paths apply the same arithmetic in
//! the same order, so they agree within float tolerance.
//!
//! Deaths from unmet needs flip the agent to dead in the registry and emit
//! `AgentDied` here; the dependent-system cascade is the lifecycle
//! engine's job and is driven from [`NeedsTickReport::deaths`].

pub mod store;
pub mod zones;

use std::collections::BTreeMap;

use habitat_compute::{BatchProcessor, BatchStats, ComputeBackend, CpuKernels, CrossEffectRule};
use habitat_events::{EventBus, SimEvent};
use habitat_types::{
    ActivityKind, DeathCause, EntityId, NEED_MAX, NeedKind, NeedLevel, Needs, Position,
    ResourceKind, ZoneKind, clamp_need,
};
use habitat_world::{AgentRegistry, ZoneMap};
use tracing::{debug, info, warn};

use crate::config::{DeathThresholds, NeedsConfig};
use crate::ports::{InventoryPort, PortSet};

pub use store::{NeedsRecord, NeedsStore, classify};
pub use zones::ZoneCache;

const ENERGY: usize = NeedKind::Energy.index();

/// Needs that auto-consume from inventory, and what they consume.
const CONSUMABLE: [(NeedKind, ResourceKind); 2] = [
    (NeedKind::Hunger, ResourceKind::Food),
    (NeedKind::Thirst, ResourceKind::Water),
];

/// What the needs engine may touch during one update.
pub struct NeedsWorld<'a> {
    /// Agents; deaths and respawns are written here.
    pub agents: &'a mut AgentRegistry,
    /// Zones for presence bonuses.
    pub zones: &'a ZoneMap,
    /// Inventory and activity ports.
    pub ports: &'a mut PortSet,
    /// Outbound events.
    pub events: &'a mut EventBus,
}

/// Outcome of one needs update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeedsTickReport {
    /// Records advanced.
    pub processed: usize,
    /// Whether the batch path ran.
    pub batch: bool,
    /// Whether the elapsed time was clamped by the time-jump guard.
    pub delta_clamped: bool,
    /// Corrupted records reset to defaults.
    pub corrupted_resets: usize,
    /// Inventory units consumed.
    pub consumed_units: u32,
    /// Threshold notifications emitted.
    pub notifications: usize,
    /// Agents that died this tick, in processing order.
    pub deaths: Vec<(EntityId, DeathCause)>,
    /// Agents revived this tick.
    pub respawned: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy)]
struct Subject {
    id: EntityId,
    position: Position,
    stage_multiplier: f32,
    immortal: bool,
}

/// Advances agent needs.
#[derive(Debug)]
pub struct NeedsEngine {
    config: NeedsConfig,
    rules: Vec<CrossEffectRule>,
    store: NeedsStore,
    batch: BatchProcessor,
    zone_cache: ZoneCache,
    favor: BTreeMap<EntityId, f32>,
    respawns: BTreeMap<EntityId, u64>,
    seen_membership: Option<u64>,
    reported_missing_inventory: bool,
    reported_missing_activity: bool,
    zone_buf: Vec<ZoneKind>,
}

impl NeedsEngine {
    /// Create an engine with no compute backend.
    pub fn new(config: NeedsConfig) -> Self {
        let zone_cache = ZoneCache::new(config.zone_cache_bucket, config.zone_cache_ttl_ms, config.zone_margin);
        Self {
            rules: config.cross_effect_rules(),
            store: NeedsStore::new(),
            batch: BatchProcessor::new(NeedKind::COUNT),
            zone_cache,
            favor: BTreeMap::new(),
            respawns: BTreeMap::new(),
            seen_membership: None,
            reported_missing_inventory: false,
            reported_missing_activity: false,
            zone_buf: Vec::new(),
            config,
        }
    }

    /// Attach an accelerated backend to the batch path.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn ComputeBackend>) -> Self {
        self.batch.set_backend(Some(backend), self.config.backend_threshold);
        self
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &NeedsConfig {
        &self.config
    }

    /// Name of the attached batch backend, if any.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.batch.backend_name()
    }

    /// Start tracking an agent with full needs. `false` if already tracked.
    pub fn register(&mut self, id: EntityId) -> bool {
        self.store.insert(id, NeedsRecord::new(Needs::default(), &self.config))
    }

    /// Stop tracking an agent. A scheduled respawn is kept.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.favor.remove(&id);
        self.store.remove(id)
    }

    /// Current needs of an agent.
    pub fn needs(&self, id: EntityId) -> Option<&Needs> {
        self.store.get(id).map(|r| &r.needs)
    }

    /// Overwrite an agent's needs (clamped). `false` for untracked agents.
    pub fn set_needs(&mut self, id: EntityId, needs: Needs) -> bool {
        let Some(record) = self.store.get_mut(id) else {
            return false;
        };
        record.needs = needs;
        record.needs.clamp_all();
        true
    }

    /// Level last reported for one need.
    pub fn level(&self, id: EntityId, need: NeedKind) -> Option<NeedLevel> {
        self.store.get(id).and_then(|r| r.levels.get(need.index()).copied())
    }

    /// Set the external decay modifier for an agent (default 1.0).
    pub fn set_favor(&mut self, id: EntityId, modifier: f32) {
        self.favor.insert(id, modifier.max(0.0));
    }

    /// Reset an agent's decay modifier to 1.0.
    pub fn clear_favor(&mut self, id: EntityId) {
        self.favor.remove(&id);
    }

    /// When a dead agent is due to respawn.
    pub fn pending_respawn(&self, id: EntityId) -> Option<u64> {
        self.respawns.get(&id).copied()
    }

    /// Drop a scheduled respawn. `true` if one was pending.
    pub fn cancel_respawn(&mut self, id: EntityId) -> bool {
        self.respawns.remove(&id).is_some()
    }

    /// Batch execution counters.
    pub const fn batch_stats(&self) -> BatchStats {
        self.batch.stats()
    }

    /// Number of tracked agents.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no agent is tracked.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Advance every tracked agent by `delta_ms`.
    pub fn update(&mut self, delta_ms: u64, now_ms: u64, world: &mut NeedsWorld<'_>) -> NeedsTickReport {
        let mut report = NeedsTickReport::default();
        let delta_ms = if delta_ms > self.config.max_delta_ms {
            warn!(
                delta_ms,
                max_delta_ms = self.config.max_delta_ms,
                "needs update delta clamped after a time jump"
            );
            report.delta_clamped = true;
            self.config.max_delta_ms
        } else {
            delta_ms
        };
        let delta = ms_to_secs(delta_ms);

        self.process_respawns(now_ms, world, &mut report);
        self.sync_membership(world.agents);
        report.corrupted_resets = self.repair_corrupted();
        self.report_missing_ports(world.ports);

        let subjects: Vec<Subject> = self
            .store
            .ids()
            .into_iter()
            .filter_map(|id| {
                let agent = world.agents.get(id).filter(|a| a.alive)?;
                Some(Subject {
                    id,
                    position: agent.position,
                    stage_multiplier: self.config.stage_multipliers.for_stage(agent.life_stage),
                    immortal: agent.immortal,
                })
            })
            .collect();
        report.processed = subjects.len();

        if subjects.len() >= self.config.batch_threshold {
            report.batch = true;
            self.update_batch(&subjects, delta, now_ms, world, &mut report);
        } else {
            self.update_each(&subjects, delta, now_ms, world, &mut report);
        }

        debug!(
            processed = report.processed,
            batch = report.batch,
            deaths = report.deaths.len(),
            consumed = report.consumed_units,
            "needs tick"
        );
        report
    }

    fn update_each(
        &mut self,
        subjects: &[Subject],
        delta: f32,
        now_ms: u64,
        world: &mut NeedsWorld<'_>,
        report: &mut NeedsTickReport,
    ) {
        let rates = self.config.decay.to_array();
        for subject in subjects {
            let energy_rate = energy_rate(&self.config, world.ports, subject.id);
            let favor = self.favor_of(subject.id);
            if let Some(record) = self.store.get_mut(subject.id) {
                let mut values = record.needs.to_array();
                CpuKernels::decay_row(&mut values, &rates, subject.stage_multiplier, favor, delta);
                if let Some(energy) = values.get_mut(ENERGY) {
                    *energy = clamp_need(*energy + energy_rate * delta);
                }
                record.needs = Needs::from_array(values);
            }

            self.consume_and_bonus(subject, delta, now_ms, world, report);

            if let Some(record) = self.store.get_mut(subject.id) {
                let mut values = record.needs.to_array();
                CpuKernels::cross_effects_row(&mut values, &self.rules, delta);
                record.needs = Needs::from_array(values);
            }

            self.settle(subject, now_ms, world, report);
        }
    }

    fn update_batch(
        &mut self,
        subjects: &[Subject],
        delta: f32,
        now_ms: u64,
        world: &mut NeedsWorld<'_>,
        report: &mut NeedsTickReport,
    ) {
        let rates = self.config.decay.to_array();
        self.batch.rebuild_buffers(&self.store);

        let by_id: BTreeMap<EntityId, &Subject> = subjects.iter().map(|s| (s.id, s)).collect();
        let rows = self.batch.ids().to_vec();
        let mut stage = Vec::with_capacity(rows.len());
        let mut favor = Vec::with_capacity(rows.len());
        let mut energy = Vec::with_capacity(rows.len());
        for id in &rows {
            let stage_multiplier = by_id.get(id).map_or(0.0, |s| s.stage_multiplier);
            stage.push(stage_multiplier);
            favor.push(self.favor_of(*id));
            let rate = if by_id.contains_key(id) {
                energy_rate(&self.config, world.ports, *id)
            } else {
                0.0
            };
            energy.push(rate * delta);
        }

        if let Err(err) = self.batch.apply_decay_batch(&rates, &stage, &favor, delta) {
            warn!(error = %err, "needs decay batch rejected");
        }
        if let Err(err) = self.batch.apply_column_delta(ENERGY, &energy) {
            warn!(error = %err, "energy batch rejected");
        }
        self.batch.sync_to_registry(&mut self.store);

        for subject in subjects {
            self.consume_and_bonus(subject, delta, now_ms, world, report);
        }

        self.batch.rebuild_buffers(&self.store);
        if let Err(err) = self.batch.apply_cross_effects_batch(&self.rules, delta) {
            warn!(error = %err, "cross-effect batch rejected");
        }
        self.batch.sync_to_registry(&mut self.store);

        for subject in subjects {
            self.settle(subject, now_ms, world, report);
        }
    }

    /// Inventory consumption below the consume threshold, then zone
    /// presence bonuses.
    fn consume_and_bonus(
        &mut self,
        subject: &Subject,
        delta: f32,
        now_ms: u64,
        world: &mut NeedsWorld<'_>,
        report: &mut NeedsTickReport,
    ) {
        self.zone_cache
            .kinds_near(world.zones, subject.position, now_ms, &mut self.zone_buf);
        let Some(record) = self.store.get_mut(subject.id) else {
            return;
        };

        if let Some(inventory) = world.ports.inventory.as_deref_mut() {
            for (need, resource) in CONSUMABLE {
                let value = record.needs.get(need);
                if value >= self.config.consume_threshold {
                    continue;
                }
                let cap = if value < self.config.critical_threshold {
                    self.config.critical_consume_cap
                } else {
                    self.config.consume_cap
                };
                let used = consume(
                    inventory,
                    subject.id,
                    need,
                    resource,
                    &mut record.needs,
                    cap,
                    self.config.restore_per_unit,
                );
                report.consumed_units = report.consumed_units.saturating_add(used);
            }
        }

        for bonus in &self.config.zone_bonuses {
            if self.zone_buf.contains(&bonus.zone) {
                record.needs.add(bonus.need, bonus.per_second * delta);
            }
        }
    }

    /// Death check, emergency consumption, and threshold notifications.
    fn settle(&mut self, subject: &Subject, now_ms: u64, world: &mut NeedsWorld<'_>, report: &mut NeedsTickReport) {
        let Some(record) = self.store.get_mut(subject.id) else {
            return;
        };

        if subject.immortal {
            let floor = self.config.immortal_floor;
            for need in NeedKind::ALL {
                if record.needs.get(need) < floor {
                    record.needs.set(need, floor);
                }
            }
        } else if let Some(cause) = death_cause(&record.needs, &self.config.death) {
            self.handle_death(subject.id, cause, now_ms, world, report);
            return;
        }

        if let Some(inventory) = world.ports.inventory.as_deref_mut() {
            for (need, resource) in CONSUMABLE {
                if record.needs.get(need) >= self.config.critical_threshold {
                    continue;
                }
                let used = consume(
                    inventory,
                    subject.id,
                    need,
                    resource,
                    &mut record.needs,
                    self.config.critical_consume_cap,
                    self.config.restore_per_unit,
                );
                report.consumed_units = report.consumed_units.saturating_add(used);
            }
        }

        for need in NeedKind::ALL {
            let value = record.needs.get(need);
            let level = classify(value, &self.config);
            let Some(previous) = record.levels.get_mut(need.index()) else {
                continue;
            };
            if *previous == level {
                continue;
            }
            *previous = level;
            let event = match level {
                NeedLevel::Critical => SimEvent::NeedCritical {
                    agent_id: subject.id,
                    need,
                    value,
                },
                NeedLevel::Satisfied => SimEvent::NeedSatisfied {
                    agent_id: subject.id,
                    need,
                    value,
                },
                NeedLevel::Low | NeedLevel::Normal => continue,
            };
            world.events.emit(event);
            report.notifications = report.notifications.saturating_add(1);
        }
    }

    fn handle_death(
        &mut self,
        id: EntityId,
        cause: DeathCause,
        now_ms: u64,
        world: &mut NeedsWorld<'_>,
        report: &mut NeedsTickReport,
    ) {
        let Some((position, age_years)) = world.agents.get(id).map(|a| (a.position, a.age_years)) else {
            return;
        };
        if !world.agents.mark_dead_with_cause(id, cause, now_ms) {
            return;
        }
        world.events.emit(SimEvent::AgentDied {
            agent_id: id,
            cause,
            position,
            age_years,
        });
        self.remove(id);
        if self.config.respawn_enabled {
            self.respawns
                .insert(id, now_ms.saturating_add(self.config.respawn_delay_ms));
        }
        info!(agent_id = %id, %cause, "agent died of unmet needs");
        report.deaths.push((id, cause));
    }

    fn process_respawns(&mut self, now_ms: u64, world: &mut NeedsWorld<'_>, report: &mut NeedsTickReport) {
        let due: Vec<EntityId> = self
            .respawns
            .iter()
            .filter(|(_, at)| **at <= now_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            self.respawns.remove(&id);
            if !world.agents.revive(id) {
                continue;
            }
            self.register(id);
            if let Some(inventory) = world.ports.inventory.as_deref_mut() {
                inventory.open(id);
            }
            if let (Some(movement), Some(position)) = (
                world.ports.movement.as_deref_mut(),
                world.agents.get(id).map(|a| a.position),
            ) {
                movement.register(id, position);
            }
            world.events.emit(SimEvent::AgentRespawned { agent_id: id });
            info!(agent_id = %id, "agent respawned");
            report.respawned.push(id);
        }
    }

    /// Track every live agent and drop records of agents no longer alive.
    fn sync_membership(&mut self, agents: &AgentRegistry) {
        let version = agents.membership_version();
        if self.seen_membership == Some(version) {
            return;
        }
        self.seen_membership = Some(version);
        for id in self.store.ids() {
            if !agents.is_alive(id) {
                self.remove(id);
            }
        }
        for id in agents.alive_ids() {
            self.register(id);
        }
    }

    fn repair_corrupted(&mut self) -> usize {
        let epsilon = self.config.corruption_epsilon;
        let min_pinned = self.config.corruption_min_pinned.max(1);
        let mut repaired: usize = 0;
        for (id, record) in self.store.iter_mut() {
            let pinned = record.needs.to_array().iter().filter(|v| **v <= epsilon).count();
            if pinned >= min_pinned {
                warn!(agent_id = %id, pinned, "corrupted needs record reset to defaults");
                *record = NeedsRecord::new(Needs::default(), &self.config);
                repaired = repaired.saturating_add(1);
            }
        }
        repaired
    }

    fn report_missing_ports(&mut self, ports: &PortSet) {
        if ports.inventory.is_none() && !self.reported_missing_inventory {
            debug!("no inventory port, needs will not consume carried resources");
            self.reported_missing_inventory = true;
        }
        if ports.activity.is_none() && !self.reported_missing_activity {
            debug!("no activity port, energy uses the idle rate");
            self.reported_missing_activity = true;
        }
    }

    fn favor_of(&self, id: EntityId) -> f32 {
        self.favor.get(&id).copied().unwrap_or(1.0)
    }
}

fn energy_rate(config: &NeedsConfig, ports: &PortSet, id: EntityId) -> f32 {
    let activity = ports
        .activity
        .as_deref()
        .map_or(ActivityKind::Idle, |a| a.activity(id));
    config.activity_energy.rate(activity)
}

/// First need at or below its death threshold, in the fixed order
/// hunger, thirst, energy.
pub fn death_cause(needs: &Needs, thresholds: &DeathThresholds) -> Option<DeathCause> {
    if needs.hunger <= thresholds.hunger {
        Some(DeathCause::Starvation)
    } else if needs.thirst <= thresholds.thirst {
        Some(DeathCause::Dehydration)
    } else if needs.energy <= thresholds.energy {
        Some(DeathCause::Exhaustion)
    } else {
        None
    }
}

/// Consume enough units to refill `need`, up to `cap`. Returns units used.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn consume(
    inventory: &mut dyn InventoryPort,
    holder: EntityId,
    need: NeedKind,
    resource: ResourceKind,
    needs: &mut Needs,
    cap: u32,
    restore_per_unit: f32,
) -> u32 {
    if cap == 0 || restore_per_unit <= 0.0 {
        return 0;
    }
    let deficit = NEED_MAX - needs.get(need);
    let wanted = ((deficit / restore_per_unit).ceil().max(0.0) as u32).min(cap);
    if wanted == 0 {
        return 0;
    }
    let used = inventory.consume(holder, resource, wanted);
    needs.add(need, used as f32 * restore_per_unit);
    used
}

#[allow(clippy::cast_precision_loss)]
fn ms_to_secs(ms: u64) -> f32 {
    ms as f32 / 1000.0
}
