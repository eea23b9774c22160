//! Identity registries for entities, agents, and animals.
//!
//! Each registry is a thin typed wrapper over a [`RecordStore`], which owns
//! the records, the [`DirtySet`], the membership version, and the cached
//! [`RegistryStats`]. The typed wrappers add the secondary indices and
//! snapshot projections specific to their record type.
//!
//! Secondary indices and stats are derived lazily and dropped on every
//! mutation, so a read after a write always sees the write.

pub mod agent;
pub mod dirty;
pub mod entity;
pub mod animal;

use std::cell::OnceCell;
use std::collections::BTreeMap;

use habitat_types::{EntityId, Position, RegistryStats};
use serde::de::DeserializeOwned;

use crate::error::WorldError;

pub use agent::AgentRegistry;
pub use animal::AnimalRegistry;
pub use dirty::DirtySet;
pub use entity::EntityRegistry;

/// A record a [`RecordStore`] can hold.
pub trait Record: Clone {
    /// The stable ID of the record.
    fn id(&self) -> EntityId;

    /// Whether the record is alive.
    fn is_alive(&self) -> bool;

    /// Flip the record to dead.
    fn kill(&mut self);

    /// Current position.
    fn position(&self) -> Position;

    /// Move the record.
    fn set_position(&mut self, position: Position);

    /// Key the record is counted under in [`RegistryStats::groups`].
    fn group_key(&self) -> String;
}

/// Storage shared by every registry.
#[derive(Debug, Clone)]
pub struct RecordStore<T> {
    records: BTreeMap<EntityId, T>,
    dirty: DirtySet,
    version: u64,
    stats: OnceCell<RegistryStats>,
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            dirty: DirtySet::default(),
            version: 0,
            stats: OnceCell::new(),
        }
    }
}

impl<T: Record> RecordStore<T> {
    /// Look up a record.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.records.get(&id)
    }

    /// Whether a record with this ID exists (alive or dead).
    pub fn has(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Insert or replace a record. Returns `true` if the ID was new.
    pub fn upsert(&mut self, record: T) -> bool {
        let id = record.id();
        let is_new = self.records.insert(id, record).is_none();
        if is_new {
            self.dirty.record_added(id);
            self.bump_version();
        } else {
            self.dirty.record_modified(id);
        }
        self.invalidate();
        is_new
    }

    /// Delete a record outright.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let removed = self.records.remove(&id)?;
        self.dirty.record_removed(id);
        self.bump_version();
        self.invalidate();
        Some(removed)
    }

    /// Flip a live record to dead. Returns `false` when the record is
    /// unknown or already dead.
    pub fn mark_dead(&mut self, id: EntityId) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        if !record.is_alive() {
            return false;
        }
        record.kill();
        self.dirty.record_removed(id);
        self.bump_version();
        self.invalidate();
        true
    }

    /// Move a record. Returns `false` for unknown IDs.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.set_position(position);
        self.dirty.record_modified(id);
        true
    }

    /// Mutate a record in place and mark it modified. Returns `None` for
    /// unknown IDs.
    ///
    /// A closure that changes the alive flag must be followed by
    /// [`RecordStore::note_membership_change`]; use `mark_dead` instead
    /// where possible.
    pub fn update<R>(&mut self, id: EntityId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let record = self.records.get_mut(&id)?;
        let result = f(record);
        self.dirty.record_modified(id);
        self.invalidate();
        Some(result)
    }

    /// Mutate a record without touching the dirty set or the stats cache.
    /// Only for fields that neither reads.
    pub fn update_untracked(&mut self, id: EntityId, f: impl FnOnce(&mut T)) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        f(record);
        true
    }

    /// Record that the alive set changed outside `mark_dead` (for example
    /// a revival).
    pub fn note_membership_change(&mut self, id: EntityId) {
        self.dirty.record_added(id);
        self.bump_version();
        self.invalidate();
    }

    /// Every live record, in ID order.
    pub fn iter_alive(&self) -> impl Iterator<Item = &T> + Clone {
        self.records.values().filter(|r| r.is_alive())
    }

    /// Every record, alive or dead, in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    /// IDs of every live record, in ID order.
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.iter_alive().map(Record::id).collect()
    }

    /// Number of records, alive or dead.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Aggregate counts, computed on first read after a mutation.
    pub fn stats(&self) -> &RegistryStats {
        self.stats.get_or_init(|| {
            let mut stats = RegistryStats::default();
            for record in self.records.values() {
                stats.total = stats.total.saturating_add(1);
                if record.is_alive() {
                    stats.alive = stats.alive.saturating_add(1);
                    let slot = stats.groups.entry(record.group_key()).or_insert(0);
                    *slot = slot.saturating_add(1);
                } else {
                    stats.dead = stats.dead.saturating_add(1);
                }
            }
            stats
        })
    }

    /// Take every pending change.
    pub fn take_dirty(&mut self) -> DirtySet {
        std::mem::take(&mut self.dirty)
    }

    /// Ask the dirty-set consumer for a full rebuild.
    pub const fn mark_structural(&mut self) {
        self.dirty.mark_structural();
    }

    /// Counter bumped whenever the alive membership changes.
    pub const fn membership_version(&self) -> u64 {
        self.version
    }

    /// Delete every dead record. Returns the deleted IDs.
    pub fn sweep_dead(&mut self) -> Vec<EntityId> {
        self.sweep_dead_except(|_| false)
    }

    /// Delete every dead record for which `keep` is false.
    pub fn sweep_dead_except(&mut self, keep: impl Fn(EntityId) -> bool) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .records
            .values()
            .filter(|r| !r.is_alive() && !keep(r.id()))
            .map(Record::id)
            .collect();
        for id in &dead {
            self.records.remove(id);
        }
        if !dead.is_empty() {
            self.bump_version();
            self.invalidate();
        }
        dead
    }

    /// Insert every record whose ID is not already present. Returns the
    /// number inserted.
    pub fn import(&mut self, records: impl IntoIterator<Item = T>) -> usize {
        let mut inserted: usize = 0;
        for record in records {
            if self.has(record.id()) {
                continue;
            }
            self.upsert(record);
            inserted = inserted.saturating_add(1);
        }
        inserted
    }

    /// Parse a JSON array of records and [`import`](Self::import) them.
    pub fn import_json(&mut self, json: &str) -> Result<usize, WorldError>
    where
        T: DeserializeOwned,
    {
        let records: Vec<T> = serde_json::from_str(json)?;
        Ok(self.import(records))
    }

    const fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn invalidate(&mut self) {
        self.stats.take();
    }
}

/// Whether `changes` exceeds `ratio` of `population`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn exceeds_ratio(changes: usize, population: usize, ratio: f32) -> bool {
    changes as f32 > ratio * population.max(1) as f32
}
