//! Registry of generic spatially placed entities.
//!
//! Holds buildings, zone markers, resource nodes, and the generic
//! projections of agents maintained by [`reconcile_agents`]. Its dirty set
//! feeds the spatial index.
//!
//! [`reconcile_agents`]: crate::reconcile::reconcile_agents

use std::cell::OnceCell;
use std::collections::BTreeMap;

use habitat_types::{
    Entity, EntityId, EntityKind, EntitySnapshot, Position, RegistryStats, ResourceKind,
};

use super::{DirtySet, Record, RecordStore};
use crate::error::WorldError;

impl Record for Entity {
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
        self.kind.as_str().to_owned()
    }
}

/// Owner of every [`Entity`] record.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    store: RecordStore<Entity>,
    by_kind: OnceCell<BTreeMap<EntityKind, Vec<EntityId>>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// Whether an entity with this ID exists (alive or dead).
    pub fn has(&self, id: EntityId) -> bool {
        self.store.has(id)
    }

    /// Insert or replace an entity. Returns `true` if the ID was new.
    pub fn register(&mut self, entity: Entity) -> bool {
        self.by_kind.take();
        self.store.upsert(entity)
    }

    /// Delete an entity outright.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.by_kind.take();
        self.store.remove(id)
    }

    /// Flip an entity to dead. `false` if unknown or already dead.
    pub fn mark_dead(&mut self, id: EntityId) -> bool {
        let changed = self.store.mark_dead(id);
        if changed {
            self.by_kind.take();
        }
        changed
    }

    /// Move an entity. `false` for unknown IDs.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> bool {
        self.store.set_position(id, position)
    }

    /// Mutate an entity in place.
    pub fn update<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        self.by_kind.take();
        self.store.update(id, f)
    }

    /// Every live entity, in ID order.
    pub fn all_alive(&self) -> impl Iterator<Item = &Entity> {
        self.store.iter_alive()
    }

    /// IDs of live entities of one kind.
    pub fn ids_of_kind(&self, kind: EntityKind) -> &[EntityId] {
        self.kind_index().get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of live entities of one kind.
    pub fn count_of_kind(&self, kind: EntityKind) -> usize {
        self.ids_of_kind(kind).len()
    }

    /// Cached aggregate counts, grouped by kind.
    pub fn stats(&self) -> &RegistryStats {
        self.store.stats()
    }

    /// Alive-only projection for external consumers.
    pub fn export_snapshot(&self) -> Vec<EntitySnapshot> {
        self.store
            .iter_alive()
            .map(|e| EntitySnapshot {
                id: e.id,
                kind: e.kind,
                position: e.position,
                resource: e.resource,
                amount: e.stats.amount,
            })
            .collect()
    }

    /// Insert entities whose IDs are not yet known. Returns the number
    /// inserted.
    pub fn import_snapshot(&mut self, entities: impl IntoIterator<Item = Entity>) -> usize {
        self.by_kind.take();
        self.store.import(entities)
    }

    /// Parse a JSON array of entities and import them.
    pub fn import_snapshot_json(&mut self, json: &str) -> Result<usize, WorldError> {
        self.by_kind.take();
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

    /// Delete every dead entity.
    pub fn sweep_dead(&mut self) -> Vec<EntityId> {
        let swept = self.store.sweep_dead();
        if !swept.is_empty() {
            self.by_kind.take();
        }
        swept
    }

    /// Counter bumped when the alive membership changes.
    pub const fn membership_version(&self) -> u64 {
        self.store.membership_version()
    }

    /// Number of entities, alive or dead.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Take up to `wanted` units from a live resource node. Returns the
    /// amount actually taken (0 for unknown, dead, or empty nodes).
    pub fn take_resource(&mut self, id: EntityId, wanted: f32) -> f32 {
        let available = match self.store.get(id) {
            Some(e) if e.alive && e.resource.is_some() => e.stats.amount,
            _ => return 0.0,
        };
        let taken = wanted.clamp(0.0, available.max(0.0));
        self.store.update(id, |e| e.stats.amount = (e.stats.amount - taken).max(0.0));
        taken
    }

    /// Whether the entity is a live resource node of `kind` holding stock.
    pub fn is_stocked_resource(&self, id: EntityId, kind: ResourceKind) -> bool {
        self.store
            .get(id)
            .is_some_and(|e| e.alive && e.resource == Some(kind) && e.stats.amount > 0.0)
    }

    fn kind_index(&self) -> &BTreeMap<EntityKind, Vec<EntityId>> {
        self.by_kind.get_or_init(|| {
            let mut index: BTreeMap<EntityKind, Vec<EntityId>> = BTreeMap::new();
            for entity in self.store.iter_alive() {
                index.entry(entity.kind).or_default().push(entity.id);
            }
            index
        })
    }
}
