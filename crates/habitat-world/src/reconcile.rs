//! Agent-to-entity reconciliation.
//!
//! Every live agent has a generic [`Entity`] projection (same ID, kind
//! [`EntityKind::Agent`]) in the entity registry, which is what the spatial
//! index reads. Reconciliation keeps those projections in step with the
//! agent registry, touching only what changed unless the change volume
//! crosses the configured ratio.

use habitat_types::{Agent, Entity, EntityId, EntityKind};
use tracing::debug;

use crate::registry::{AgentRegistry, EntityRegistry, exceeds_ratio};
use crate::spatial::RebuildKind;

/// Tuning for [`reconcile_agents`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    /// Fraction of the agent population whose change forces a full pass.
    /// Tunable; 0.2 is a starting point, not a measured optimum.
    pub full_ratio: f32,
    /// Distance an agent must move before its projection is updated.
    pub move_threshold: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            full_ratio: 0.2,
            move_threshold: 2.0,
        }
    }
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Whether the pass was skipped, incremental, or full.
    pub mode: RebuildKind,
    /// Projections created.
    pub created: usize,
    /// Projections moved.
    pub moved: usize,
    /// Projections removed.
    pub removed: usize,
}

impl ReconcileReport {
    const fn new(mode: RebuildKind) -> Self {
        Self {
            mode,
            created: 0,
            moved: 0,
            removed: 0,
        }
    }
}

/// Bring agent projections in the entity registry up to date.
///
/// Consumes the agent registry's dirty set.
pub fn reconcile_agents(
    agents: &mut AgentRegistry,
    entities: &mut EntityRegistry,
    config: &ReconcileConfig,
) -> ReconcileReport {
    let dirty = agents.take_dirty();
    if dirty.is_empty() {
        return ReconcileReport::new(RebuildKind::Skipped);
    }

    let full = dirty.structural || exceeds_ratio(dirty.len(), agents.len(), config.full_ratio);
    let report = if full {
        let mut report = ReconcileReport::new(RebuildKind::Full);
        for agent in agents.all_alive() {
            sync_projection(agent, entities, config, &mut report);
        }
        let stale: Vec<EntityId> = entities
            .ids_of_kind(EntityKind::Agent)
            .iter()
            .copied()
            .filter(|id| !agents.is_alive(*id))
            .collect();
        for id in stale {
            if entities.remove(id).is_some() {
                report.removed = report.removed.saturating_add(1);
            }
        }
        report
    } else {
        let mut report = ReconcileReport::new(RebuildKind::Incremental);
        for id in &dirty.removed {
            if entities.remove(*id).is_some() {
                report.removed = report.removed.saturating_add(1);
            }
        }
        for id in dirty.added.iter().chain(&dirty.modified) {
            match agents.get(*id) {
                Some(agent) if agent.alive => sync_projection(agent, entities, config, &mut report),
                _ => {
                    if entities.remove(*id).is_some() {
                        report.removed = report.removed.saturating_add(1);
                    }
                }
            }
        }
        report
    };

    debug!(
        mode = ?report.mode,
        created = report.created,
        moved = report.moved,
        removed = report.removed,
        "agent projections reconciled"
    );
    report
}

fn sync_projection(
    agent: &Agent,
    entities: &mut EntityRegistry,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) {
    let threshold_sq = config.move_threshold * config.move_threshold;
    match entities.get(agent.id) {
        None => {
            entities.register(Entity::new(agent.id, EntityKind::Agent, agent.position));
            report.created = report.created.saturating_add(1);
        }
        Some(projection) if !projection.alive => {
            entities.register(Entity::new(agent.id, EntityKind::Agent, agent.position));
            report.created = report.created.saturating_add(1);
        }
        Some(projection) if projection.position.distance_sq(agent.position) > threshold_sq => {
            entities.set_position(agent.id, agent.position);
            report.moved = report.moved.saturating_add(1);
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{Appearance, LifeStage, Position, Sex, Traits};

    use super::*;

    fn agent_at(position: Position) -> Agent {
        Agent {
            id: EntityId::new(),
            name: "Bo".to_owned(),
            position,
            alive: true,
            sex: Sex::Male,
            age_years: 25.0,
            life_stage: LifeStage::Adult,
            generation: 0,
            parent_a: None,
            parent_b: None,
            traits: Traits::default(),
            appearance: Appearance::default(),
            social_status: 0.5,
            immortal: false,
            died_at_ms: None,
            cause_of_death: None,
        }
    }

    fn populated(n: usize) -> (AgentRegistry, EntityRegistry, Vec<EntityId>) {
        let mut agents = AgentRegistry::new();
        let mut entities = EntityRegistry::new();
        let ids = (0..n)
            .map(|_| {
                let a = agent_at(Position::new(10.0, 10.0));
                let id = a.id;
                agents.register(a);
                id
            })
            .collect();
        let report = reconcile_agents(&mut agents, &mut entities, &ReconcileConfig::default());
        assert_eq!(report.mode, RebuildKind::Full);
        assert_eq!(report.created, n);
        (agents, entities, ids)
    }

    #[test]
    fn unchanged_registry_skips() {
        let (mut agents, mut entities, _) = populated(5);
        let report = reconcile_agents(&mut agents, &mut entities, &ReconcileConfig::default());
        assert_eq!(report.mode, RebuildKind::Skipped);
    }

    #[test]
    fn incremental_moves_only_beyond_threshold() {
        let (mut agents, mut entities, ids) = populated(20);
        let a = ids.first().copied().unwrap_or_default();
        let b = ids.get(1).copied().unwrap_or_default();
        agents.set_position(a, Position::new(11.0, 10.0));
        agents.set_position(b, Position::new(20.0, 10.0));

        let report = reconcile_agents(&mut agents, &mut entities, &ReconcileConfig::default());
        assert_eq!(report.mode, RebuildKind::Incremental);
        assert_eq!(report.moved, 1);
        assert!(entities.get(b).is_some_and(|e| (e.position.x - 20.0).abs() < 1e-4));
        assert!(entities.get(a).is_some_and(|e| (e.position.x - 10.0).abs() < 1e-4));
    }

    #[test]
    fn dead_agents_lose_projection() {
        let (mut agents, mut entities, ids) = populated(20);
        let victim = ids.first().copied().unwrap_or_default();
        agents.mark_dead(victim);
        let report = reconcile_agents(&mut agents, &mut entities, &ReconcileConfig::default());
        assert_eq!(report.removed, 1);
        assert!(!entities.has(victim));
        assert_eq!(entities.count_of_kind(EntityKind::Agent), 19);
    }

    #[test]
    fn mass_change_triggers_full_pass() {
        let (mut agents, mut entities, ids) = populated(10);
        for id in ids.iter().take(5) {
            agents.set_position(*id, Position::new(50.0, 50.0));
        }
        let report = reconcile_agents(&mut agents, &mut entities, &ReconcileConfig::default());
        assert_eq!(report.mode, RebuildKind::Full);
        assert_eq!(report.moved, 5);
    }
}
