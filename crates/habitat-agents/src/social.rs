//! Pairwise affinity between agents.
//!
//! Affinity is symmetric and lives in `[-1, 1]`; unknown pairs score 0.
//! Every adjustment is clamped, so repeated positive interactions saturate
//! at 1 instead of drifting.

use std::collections::BTreeMap;

use habitat_types::EntityId;

use crate::ports::SocialPort;

const SCORE_MAX: f32 = 1.0;
const SCORE_MIN: f32 = -1.0;

/// Affinity at or above this reads as friendly.
pub const FRIENDLY_THRESHOLD: f32 = 0.3;

/// Affinity at or below this reads as hostile.
pub const HOSTILE_THRESHOLD: f32 = -0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bond {
    score: f32,
    interactions: u64,
}

/// Symmetric affinity graph over every agent.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    bonds: BTreeMap<(EntityId, EntityId), Bond>,
}

impl SocialGraph {
    /// Create an empty graph.
    pub const fn new() -> Self {
        Self {
            bonds: BTreeMap::new(),
        }
    }

    /// Number of interactions recorded between two agents.
    pub fn interaction_count(&self, a: EntityId, b: EntityId) -> u64 {
        self.bonds.get(&pair(a, b)).map_or(0, |bond| bond.interactions)
    }

    /// Agents `agent` has a bond with, in ID order.
    pub fn known_agents(&self, agent: EntityId) -> Vec<EntityId> {
        self.bonds
            .keys()
            .filter_map(|&(x, y)| {
                if x == agent {
                    Some(y)
                } else if y == agent {
                    Some(x)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Human-readable label, e.g. `friendly (0.7)`.
    pub fn relationship_label(&self, a: EntityId, b: EntityId) -> String {
        self.bonds.get(&pair(a, b)).map_or_else(
            || String::from("stranger (unknown)"),
            |bond| {
                let label = if bond.score >= FRIENDLY_THRESHOLD {
                    "friendly"
                } else if bond.score <= HOSTILE_THRESHOLD {
                    "hostile"
                } else {
                    "neutral"
                };
                format!("{label} ({:.1})", bond.score)
            },
        )
    }

    /// Number of bonds.
    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    /// Whether there are no bonds.
    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }
}

impl SocialPort for SocialGraph {
    fn affinity(&self, a: EntityId, b: EntityId) -> f32 {
        self.bonds.get(&pair(a, b)).map_or(0.0, |bond| bond.score)
    }

    fn adjust_affinity(&mut self, a: EntityId, b: EntityId, delta: f32) {
        if a == b {
            return;
        }
        let bond = self.bonds.entry(pair(a, b)).or_default();
        bond.score = (bond.score + delta).clamp(SCORE_MIN, SCORE_MAX);
        bond.interactions = bond.interactions.saturating_add(1);
    }

    fn remove(&mut self, agent: EntityId) -> usize {
        let before = self.bonds.len();
        self.bonds.retain(|&(x, y), _| x != agent && y != agent);
        before.saturating_sub(self.bonds.len())
    }
}

fn pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_is_symmetric_and_clamped() {
        let mut graph = SocialGraph::new();
        let a = EntityId::new();
        let b = EntityId::new();
        graph.adjust_affinity(a, b, 0.7);
        graph.adjust_affinity(b, a, 0.7);
        assert!((graph.affinity(a, b) - 1.0).abs() < 1e-6);
        assert!((graph.affinity(b, a) - 1.0).abs() < 1e-6);
        assert_eq!(graph.interaction_count(b, a), 2);
        assert_eq!(graph.relationship_label(a, b), "friendly (1.0)");
    }

    #[test]
    fn remove_drops_every_bond_of_agent() {
        let mut graph = SocialGraph::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();
        graph.adjust_affinity(a, b, 0.1);
        graph.adjust_affinity(a, c, -0.5);
        graph.adjust_affinity(b, c, 0.2);
        assert_eq!(graph.known_agents(a).len(), 2);
        assert_eq!(graph.remove(a), 2);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.relationship_label(a, c), "stranger (unknown)");
    }

    #[test]
    fn self_bonds_are_ignored() {
        let mut graph = SocialGraph::new();
        let a = EntityId::new();
        graph.adjust_affinity(a, a, 0.5);
        assert!(graph.is_empty());
    }
}
