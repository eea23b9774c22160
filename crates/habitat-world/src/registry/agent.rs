//! Registry of agents.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use habitat_types::{
    Agent, AgentSnapshot, DeathCause, EntityId, LifeStage, Position, RegistryStats, Sex,
};

use super::{DirtySet, Record, RecordStore};
use crate::error::WorldError;

impl Record for Agent {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn kill(&mut self) {
        self.alive = false;
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn group_key(&self) -> String {
        self.life_stage.as_str().to_owned()
    }
}

/// Owner of every [`Agent`] record.
///
/// Its dirty set is consumed by agent-to-entity reconciliation.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    store: RecordStore<Agent>,
    by_stage: OnceCell<BTreeMap<(LifeStage, Sex), Vec<EntityId>>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an agent.
    pub fn get(&self, id: EntityId) -> Option<&Agent> {
        self.store.get(id)
    }

    /// Whether an agent with this ID exists (alive or dead).
    pub fn has(&self, id: EntityId) -> bool {
        self.store.has(id)
    }

    /// Whether the agent exists and is alive.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.store.get(id).is_some_and(|a| a.alive)
    }

    /// Insert or replace an agent. Returns `true` if the ID was new.
    pub fn register(&mut self, agent: Agent) -> bool {
        self.by_stage.take();
        self.store.upsert(agent)
    }

    /// Delete an agent record outright.
    pub fn remove(&mut self, id: EntityId) -> Option<Agent> {
        self.by_stage.take();
        self.store.remove(id)
    }

    /// Flip an agent to dead without recording a cause.
    pub fn mark_dead(&mut self, id: EntityId) -> bool {
        let changed = self.store.mark_dead(id);
        if changed {
            self.by_stage.take();
        }
        changed
    }

    /// Flip an agent to dead and record why and when. Returns `false` when
    /// the agent is unknown or already dead, in which case nothing changes.
    pub fn mark_dead_with_cause(&mut self, id: EntityId, cause: DeathCause, now_ms: u64) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.store.update(id, |a| {
            a.cause_of_death = Some(cause);
            a.died_at_ms = Some(now_ms);
        });
        self.mark_dead(id)
    }

    /// Bring a dead agent back. Returns `false` unless the agent exists and
    /// is dead.
    pub fn revive(&mut self, id: EntityId) -> bool {
        let revived = self
            .store
            .update(id, |a| {
                if a.alive {
                    return false;
                }
                a.alive = true;
                a.cause_of_death = None;
                a.died_at_ms = None;
                true
            })
            .unwrap_or(false);
        if revived {
            self.store.note_membership_change(id);
            self.by_stage.take();
        }
        revived
    }

    /// Move an agent. `false` for unknown IDs.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> bool {
        self.store.set_position(id, position)
    }

    /// Mutate an agent in place.
    pub fn update<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        self.by_stage.take();
        self.store.update(id, f)
    }

    /// Mutate an agent without marking it dirty. Only for fields that
    /// neither projections nor stats read, such as age.
    pub fn update_untracked(&mut self, id: EntityId, f: impl FnOnce(&mut Agent)) -> bool {
        self.store.update_untracked(id, f)
    }

    /// Every live agent, in ID order.
    pub fn all_alive(&self) -> impl Iterator<Item = &Agent> {
        self.store.iter_alive()
    }

    /// IDs of every live agent.
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.store.alive_ids()
    }

    /// Live agents of one life stage and sex, in ID order.
    pub fn ids_by_stage(&self, stage: LifeStage, sex: Sex) -> &[EntityId] {
        self.stage_index()
            .get(&(stage, sex))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of live agents.
    pub fn alive_count(&self) -> usize {
        usize::try_from(self.store.stats().alive).unwrap_or(usize::MAX)
    }

    /// Cached aggregate counts, grouped by life stage.
    pub fn stats(&self) -> &RegistryStats {
        self.store.stats()
    }

    /// Alive-only projection for external consumers.
    pub fn export_snapshot(&self) -> Vec<AgentSnapshot> {
        self.store
            .iter_alive()
            .map(|a| AgentSnapshot {
                id: a.id,
                name: a.name.clone(),
                position: a.position,
                sex: a.sex,
                age_years: a.age_years,
                life_stage: a.life_stage,
                generation: a.generation,
            })
            .collect()
    }

    /// Insert agents whose IDs are not yet known.
    pub fn import_snapshot(&mut self, agents: impl IntoIterator<Item = Agent>) -> usize {
        self.by_stage.take();
        self.store.import(agents)
    }

    /// Parse a JSON array of agents and import them.
    pub fn import_snapshot_json(&mut self, json: &str) -> Result<usize, WorldError> {
        self.by_stage.take();
        self.store.import_json(json)
    }

    /// Take pending changes.
    pub fn take_dirty(&mut self) -> DirtySet {
        self.store.take_dirty()
    }

    /// Ask the dirty-set consumer for a full rebuild.
    pub const fn mark_structural(&mut self) {
        self.store.mark_structural();
    }

    /// Delete every dead agent.
    pub fn sweep_dead(&mut self) -> Vec<EntityId> {
        self.sweep_dead_except(|_| false)
    }

    /// Delete every dead agent for which `keep` is false, e.g. agents
    /// waiting to respawn.
    pub fn sweep_dead_except(&mut self, keep: impl Fn(EntityId) -> bool) -> Vec<EntityId> {
        let swept = self.store.sweep_dead_except(keep);
        if !swept.is_empty() {
            self.by_stage.take();
        }
        swept
    }

    /// Counter bumped when the alive membership changes.
    pub const fn membership_version(&self) -> u64 {
        self.store.membership_version()
    }

    /// Number of agents, alive or dead.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn stage_index(&self) -> &BTreeMap<(LifeStage, Sex), Vec<EntityId>> {
        self.by_stage.get_or_init(|| {
            let mut index: BTreeMap<(LifeStage, Sex), Vec<EntityId>> = BTreeMap::new();
            for agent in self.store.iter_alive() {
                index.entry((agent.life_stage, agent.sex)).or_default().push(agent.id);
            }
            index
        })
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{Appearance, Traits};

    use super::*;

    fn agent(sex: Sex, stage: LifeStage) -> Agent {
        Agent {
            id: EntityId::new(),
            name: "Ada".to_owned(),
            position: Position::default(),
            alive: true,
            sex,
            age_years: 30.0,
            life_stage: stage,
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

    #[test]
    fn death_records_cause_once() {
        let mut registry = AgentRegistry::new();
        let a = agent(Sex::Female, LifeStage::Adult);
        let id = a.id;
        registry.register(a);

        assert!(registry.mark_dead_with_cause(id, DeathCause::Starvation, 10));
        assert!(!registry.mark_dead_with_cause(id, DeathCause::Exhaustion, 20));
        let stored = registry.get(id).cloned();
        assert_eq!(stored.as_ref().and_then(|a| a.cause_of_death), Some(DeathCause::Starvation));
        assert_eq!(stored.and_then(|a| a.died_at_ms), Some(10));
    }

    #[test]
    fn revive_restores_membership() {
        let mut registry = AgentRegistry::new();
        let a = agent(Sex::Male, LifeStage::Adult);
        let id = a.id;
        registry.register(a);
        registry.mark_dead(id);
        assert_eq!(registry.alive_count(), 0);
        assert!(registry.revive(id));
        assert!(!registry.revive(id));
        assert_eq!(registry.alive_count(), 1);
        assert_eq!(registry.get(id).and_then(|a| a.cause_of_death), None);
    }

    #[test]
    fn stage_index_groups_by_sex() {
        let mut registry = AgentRegistry::new();
        registry.register(agent(Sex::Male, LifeStage::Adult));
        registry.register(agent(Sex::Female, LifeStage::Adult));
        registry.register(agent(Sex::Female, LifeStage::Child));
        assert_eq!(registry.ids_by_stage(LifeStage::Adult, Sex::Female).len(), 1);
        assert_eq!(registry.ids_by_stage(LifeStage::Child, Sex::Female).len(), 1);
        assert_eq!(registry.ids_by_stage(LifeStage::Elder, Sex::Male).len(), 0);
        assert_eq!(registry.stats().groups.get("adult").copied(), Some(2));
    }
}
