//! Lineage tracking.
//!
//! A passive record of who descends from whom and who has died. It makes
//! no decisions; the lifecycle engine reports births and deaths to it
//! through [`GenealogyPort`] and analytics read it back.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use habitat_types::EntityId;

use crate::ports::GenealogyPort;

/// Lineage of every agent the tracker has seen.
#[derive(Debug, Clone, Default)]
pub struct GenealogyTracker {
    parent_to_children: BTreeMap<EntityId, BTreeSet<EntityId>>,
    child_to_parents: BTreeMap<EntityId, BTreeSet<EntityId>>,
    generation: BTreeMap<EntityId, u32>,
    alive: BTreeSet<EntityId>,
    died_at_ms: BTreeMap<EntityId, u64>,
}

impl GenealogyTracker {
    /// Create an empty tracker.
    pub const fn new() -> Self {
        Self {
            parent_to_children: BTreeMap::new(),
            child_to_parents: BTreeMap::new(),
            generation: BTreeMap::new(),
            alive: BTreeSet::new(),
            died_at_ms: BTreeMap::new(),
        }
    }

    /// Ancestors, parents first, then grandparents, and so on.
    pub fn lineage(&self, agent: EntityId) -> Vec<EntityId> {
        walk(&self.child_to_parents, agent)
    }

    /// Descendants, children first, then grandchildren, and so on.
    pub fn descendants(&self, agent: EntityId) -> Vec<EntityId> {
        walk(&self.parent_to_children, agent)
    }

    /// Agents sharing at least one parent, excluding `agent`.
    pub fn siblings(&self, agent: EntityId) -> BTreeSet<EntityId> {
        let mut siblings = BTreeSet::new();
        if let Some(parents) = self.child_to_parents.get(&agent) {
            for parent in parents {
                if let Some(children) = self.parent_to_children.get(parent) {
                    siblings.extend(children.iter().copied().filter(|c| *c != agent));
                }
            }
        }
        siblings
    }

    /// Recorded generation of an agent.
    pub fn generation_of(&self, agent: EntityId) -> Option<u32> {
        self.generation.get(&agent).copied()
    }

    /// When an agent died, if it has.
    pub fn died_at(&self, agent: EntityId) -> Option<u64> {
        self.died_at_ms.get(&agent).copied()
    }

    /// Living agents whose recorded parents are all dead. Founders are
    /// never orphans.
    pub fn orphan_count(&self) -> u32 {
        let mut count: u32 = 0;
        for (child, parents) in &self.child_to_parents {
            if !self.alive.contains(child) {
                continue;
            }
            if !parents.iter().any(|p| self.alive.contains(p)) {
                count = count.saturating_add(1);
            }
        }
        count
    }

    /// Deepest generation recorded. 0 with no records.
    pub fn longest_lineage(&self) -> u32 {
        self.generation.values().copied().max().unwrap_or(0)
    }

    /// Number of living agents the tracker knows of.
    pub fn living(&self) -> usize {
        self.alive.len()
    }
}

impl GenealogyPort for GenealogyTracker {
    fn record_founder(&mut self, agent: EntityId) {
        self.generation.entry(agent).or_insert(0);
        self.alive.insert(agent);
    }

    fn record_birth(&mut self, child: EntityId, mother: EntityId, father: EntityId, generation: u32) {
        for parent in [mother, father] {
            self.parent_to_children.entry(parent).or_default().insert(child);
            self.child_to_parents.entry(child).or_default().insert(parent);
        }
        self.generation.insert(child, generation);
        self.alive.insert(child);
    }

    fn record_death(&mut self, agent: EntityId, at_ms: u64) {
        self.alive.remove(&agent);
        self.died_at_ms.entry(agent).or_insert(at_ms);
    }

    fn record_revival(&mut self, agent: EntityId) {
        if self.generation.contains_key(&agent) {
            self.died_at_ms.remove(&agent);
            self.alive.insert(agent);
        }
    }

    fn is_living(&self, agent: EntityId) -> bool {
        self.alive.contains(&agent)
    }
}

/// Breadth-first walk over one direction of the lineage graph.
fn walk(edges: &BTreeMap<EntityId, BTreeSet<EntityId>>, start: EntityId) -> Vec<EntityId> {
    let mut found = Vec::new();
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    visited.insert(start);

    while let Some(current) = queue.pop_front() {
        if let Some(next) = edges.get(&current) {
            for id in next {
                if visited.insert(*id) {
                    found.push(*id);
                    queue.push_back(*id);
                }
            }
        }
    }
    found
}
