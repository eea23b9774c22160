//! Carried resources with a carry-capacity limit.
//!
//! The free functions operate on a single holder's map with checked
//! arithmetic; [`InventoryStore`] keeps one map per holder and implements
//! [`InventoryPort`].

use std::collections::BTreeMap;

use habitat_types::{EntityId, ResourceKind};

use crate::error::AgentError;
use crate::ports::InventoryPort;

/// Sum of all quantities. `None` on overflow.
pub fn total_weight(inventory: &BTreeMap<ResourceKind, u32>) -> Option<u32> {
    let mut total: u32 = 0;
    for qty in inventory.values() {
        total = total.checked_add(*qty)?;
    }
    Some(total)
}

/// Whether the inventory holds at least `amount` of `resource`.
pub fn has_resource(inventory: &BTreeMap<ResourceKind, u32>, resource: ResourceKind, amount: u32) -> bool {
    inventory.get(&resource).copied().unwrap_or(0) >= amount
}

/// Add `amount` units of `resource`.
///
/// Fails without changing anything if the load would exceed
/// `carry_capacity`.
pub fn add_resource(
    inventory: &mut BTreeMap<ResourceKind, u32>,
    carry_capacity: u32,
    resource: ResourceKind,
    amount: u32,
) -> Result<(), AgentError> {
    let current_load = total_weight(inventory).unwrap_or(u32::MAX);
    let overflow = || AgentError::InventoryOverflow {
        resource,
        attempted: amount,
        current_load,
        capacity: carry_capacity,
    };
    let new_load = current_load.checked_add(amount).ok_or_else(overflow)?;
    if new_load > carry_capacity {
        return Err(overflow());
    }
    let entry = inventory.entry(resource).or_insert(0);
    *entry = entry.saturating_add(amount);
    Ok(())
}

/// Remove `amount` units of `resource`, dropping the key at zero.
pub fn remove_resource(
    inventory: &mut BTreeMap<ResourceKind, u32>,
    resource: ResourceKind,
    amount: u32,
) -> Result<(), AgentError> {
    let current = inventory.get(&resource).copied().unwrap_or(0);
    let remaining = current.checked_sub(amount).ok_or(AgentError::InsufficientResource {
        resource,
        requested: amount,
        available: current,
    })?;
    if remaining == 0 {
        inventory.remove(&resource);
    } else {
        inventory.insert(resource, remaining);
    }
    Ok(())
}

/// Take everything, leaving the inventory empty.
pub const fn drain_all(inventory: &mut BTreeMap<ResourceKind, u32>) -> BTreeMap<ResourceKind, u32> {
    let mut dropped = BTreeMap::new();
    core::mem::swap(inventory, &mut dropped);
    dropped
}

/// One inventory per holder, all with the same carry capacity.
#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    carry_capacity: u32,
    holdings: BTreeMap<EntityId, BTreeMap<ResourceKind, u32>>,
}

impl InventoryStore {
    /// Create an empty store.
    pub const fn new(carry_capacity: u32) -> Self {
        Self {
            carry_capacity,
            holdings: BTreeMap::new(),
        }
    }

    /// Add resources to a holder, creating its inventory if needed.
    pub fn add(&mut self, holder: EntityId, resource: ResourceKind, amount: u32) -> Result<(), AgentError> {
        let inventory = self.holdings.entry(holder).or_default();
        add_resource(inventory, self.carry_capacity, resource, amount)
    }

    /// Remove resources from a holder.
    pub fn remove(&mut self, holder: EntityId, resource: ResourceKind, amount: u32) -> Result<(), AgentError> {
        match self.holdings.get_mut(&holder) {
            Some(inventory) => remove_resource(inventory, resource, amount),
            None => Err(AgentError::InsufficientResource {
                resource,
                requested: amount,
                available: 0,
            }),
        }
    }

    /// A holder's inventory.
    pub fn get(&self, holder: EntityId) -> Option<&BTreeMap<ResourceKind, u32>> {
        self.holdings.get(&holder)
    }

    /// Current load of a holder.
    pub fn load(&self, holder: EntityId) -> u32 {
        self.holdings
            .get(&holder)
            .and_then(total_weight)
            .unwrap_or(0)
    }

    /// Number of holders.
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Whether no holder has an inventory.
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

impl InventoryPort for InventoryStore {
    fn quantity(&self, holder: EntityId, kind: ResourceKind) -> u32 {
        self.holdings
            .get(&holder)
            .and_then(|inv| inv.get(&kind).copied())
            .unwrap_or(0)
    }

    fn consume(&mut self, holder: EntityId, kind: ResourceKind, wanted: u32) -> u32 {
        let taken = wanted.min(self.quantity(holder, kind));
        if taken == 0 {
            return 0;
        }
        match self.remove(holder, kind, taken) {
            Ok(()) => taken,
            Err(_) => 0,
        }
    }

    fn deposit(&mut self, holder: EntityId, kind: ResourceKind, amount: u32) -> u32 {
        let room = self.carry_capacity.saturating_sub(self.load(holder));
        let accepted = amount.min(room);
        if accepted == 0 {
            self.holdings.entry(holder).or_default();
            return 0;
        }
        match self.add(holder, kind, accepted) {
            Ok(()) => accepted,
            Err(_) => 0,
        }
    }

    fn open(&mut self, holder: EntityId) {
        self.holdings.entry(holder).or_default();
    }

    fn drain(&mut self, holder: EntityId) -> BTreeMap<ResourceKind, u32> {
        self.holdings
            .remove(&holder)
            .map(|mut inv| drain_all(&mut inv))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_resource_exceeds_capacity() {
        let mut inv = BTreeMap::new();
        assert!(add_resource(&mut inv, 50, ResourceKind::Wood, 30).is_ok());
        let result = add_resource(&mut inv, 50, ResourceKind::Stone, 25);
        assert!(matches!(result, Err(AgentError::InventoryOverflow { current_load: 30, .. })));
        assert_eq!(inv.get(&ResourceKind::Stone), None);
    }

    #[test]
    fn remove_resource_exact_drops_key() {
        let mut inv = BTreeMap::new();
        inv.insert(ResourceKind::Food, 10);
        assert!(remove_resource(&mut inv, ResourceKind::Food, 10).is_ok());
        assert_eq!(inv.get(&ResourceKind::Food), None);
        assert!(remove_resource(&mut inv, ResourceKind::Food, 1).is_err());
    }

    #[test]
    fn has_resource_checks_amount() {
        let mut inv = BTreeMap::new();
        inv.insert(ResourceKind::Stone, 3);
        assert!(has_resource(&inv, ResourceKind::Stone, 3));
        assert!(!has_resource(&inv, ResourceKind::Stone, 4));
        assert!(has_resource(&inv, ResourceKind::Wood, 0));
    }

    #[test]
    fn consume_takes_what_is_there() {
        let mut store = InventoryStore::new(20);
        let holder = EntityId::new();
        assert_eq!(store.deposit(holder, ResourceKind::Water, 2), 2);
        assert_eq!(store.consume(holder, ResourceKind::Water, 5), 2);
        assert_eq!(store.consume(holder, ResourceKind::Water, 5), 0);
        assert_eq!(store.consume(EntityId::new(), ResourceKind::Water, 1), 0);
    }

    #[test]
    fn deposit_stops_at_capacity() {
        let mut store = InventoryStore::new(10);
        let holder = EntityId::new();
        assert_eq!(store.deposit(holder, ResourceKind::Food, 7), 7);
        assert_eq!(store.deposit(holder, ResourceKind::Wood, 7), 3);
        assert_eq!(store.load(holder), 10);
    }

    #[test]
    fn drain_removes_holder() {
        let mut store = InventoryStore::new(10);
        let holder = EntityId::new();
        store.deposit(holder, ResourceKind::Food, 4);
        let dropped = store.drain(holder);
        assert_eq!(dropped.get(&ResourceKind::Food).copied(), Some(4));
        assert!(store.get(holder).is_none());
        assert!(store.drain(holder).is_empty());
    }
}
