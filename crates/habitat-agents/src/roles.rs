//! Role assignment by life stage.
//!
//! Children are dependents and elders advise. Adults rotate through the
//! working roles so a cohort comes of age spread across them.

use std::collections::BTreeMap;

use habitat_types::{EntityId, LifeStage};

use crate::ports::RolePort;

/// Role of every child.
pub const DEPENDENT: &str = "dependent";

/// Role of every elder.
pub const ADVISOR: &str = "advisor";

/// Roles handed to adults in rotation.
pub const WORKING_ROLES: [&str; 3] = ["gatherer", "builder", "crafter"];

/// Current role of every agent.
#[derive(Debug, Clone, Default)]
pub struct RoleBoard {
    assignments: BTreeMap<EntityId, &'static str>,
    next_working: usize,
}

impl RoleBoard {
    /// Create an empty board.
    pub const fn new() -> Self {
        Self {
            assignments: BTreeMap::new(),
            next_working: 0,
        }
    }

    /// Number of agents holding each role.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for role in self.assignments.values() {
            let slot = counts.entry(*role).or_insert(0_usize);
            *slot = slot.saturating_add(1);
        }
        counts
    }
}

impl RolePort for RoleBoard {
    fn role_of(&self, agent: EntityId) -> Option<&'static str> {
        self.assignments.get(&agent).copied()
    }

    fn assign(&mut self, agent: EntityId, stage: LifeStage) -> &'static str {
        let role = match stage {
            LifeStage::Child => DEPENDENT,
            LifeStage::Elder => ADVISOR,
            LifeStage::Adult => {
                let slot = self.next_working.checked_rem(WORKING_ROLES.len()).unwrap_or(0);
                self.next_working = self.next_working.wrapping_add(1);
                WORKING_ROLES.get(slot).copied().unwrap_or(DEPENDENT)
            }
        };
        self.assignments.insert(agent, role);
        role
    }

    fn remove(&mut self, agent: EntityId) -> bool {
        self.assignments.remove(&agent).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adults_rotate_through_working_roles() {
        let mut board = RoleBoard::new();
        let roles: Vec<&str> = (0..4)
            .map(|_| board.assign(EntityId::new(), LifeStage::Adult))
            .collect();
        assert_eq!(roles, vec!["gatherer", "builder", "crafter", "gatherer"]);
    }

    #[test]
    fn stage_roles_and_removal() {
        let mut board = RoleBoard::new();
        let child = EntityId::new();
        assert_eq!(board.assign(child, LifeStage::Child), DEPENDENT);
        assert_eq!(board.assign(child, LifeStage::Elder), ADVISOR);
        assert_eq!(board.counts().get(ADVISOR).copied(), Some(1));
        assert!(board.remove(child));
        assert_eq!(board.role_of(child), None);
    }
}
