//! Households with a fixed member capacity.

use std::collections::{BTreeMap, BTreeSet};

use habitat_types::{EntityId, HouseholdId};

use crate::ports::HouseholdPort;

/// One household.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Household {
    /// Current members.
    pub members: BTreeSet<EntityId>,
}

/// Every household and who lives where.
#[derive(Debug, Clone)]
pub struct HouseholdRegistry {
    capacity: usize,
    households: BTreeMap<HouseholdId, Household>,
    member_of: BTreeMap<EntityId, HouseholdId>,
}

impl HouseholdRegistry {
    /// Create a registry whose households hold at most `capacity` members.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            households: BTreeMap::new(),
            member_of: BTreeMap::new(),
        }
    }

    /// Look up a household.
    pub fn get(&self, id: HouseholdId) -> Option<&Household> {
        self.households.get(&id)
    }

    /// Number of households, including empty ones.
    pub fn len(&self) -> usize {
        self.households.len()
    }

    /// Whether no household exists.
    pub fn is_empty(&self) -> bool {
        self.households.is_empty()
    }
}

impl HouseholdPort for HouseholdRegistry {
    fn household_of(&self, agent: EntityId) -> Option<HouseholdId> {
        self.member_of.get(&agent).copied()
    }

    fn assign(&mut self, agent: EntityId) -> Option<HouseholdId> {
        if let Some(existing) = self.member_of.get(&agent) {
            return Some(*existing);
        }
        let capacity = self.capacity;
        let open = self
            .households
            .iter()
            .find(|(_, h)| h.members.len() < capacity)
            .map(|(id, _)| *id);
        let id = open.unwrap_or_else(HouseholdId::new);
        self.households.entry(id).or_default().members.insert(agent);
        self.member_of.insert(agent, id);
        Some(id)
    }

    fn remove(&mut self, agent: EntityId) -> bool {
        let Some(id) = self.member_of.remove(&agent) else {
            return false;
        };
        if let Some(household) = self.households.get_mut(&id) {
            household.members.remove(&agent);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_before_opening_new_household() {
        let mut registry = HouseholdRegistry::new(2);
        let a = registry.assign(EntityId::new());
        let b = registry.assign(EntityId::new());
        let c = registry.assign(EntityId::new());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn assign_is_idempotent_and_remove_frees_slot() {
        let mut registry = HouseholdRegistry::new(1);
        let agent = EntityId::new();
        let first = registry.assign(agent);
        assert_eq!(registry.assign(agent), first);
        assert!(registry.remove(agent));
        assert!(!registry.remove(agent));
        assert_eq!(registry.household_of(agent), None);
        assert_eq!(registry.assign(EntityId::new()), first);
    }
}
