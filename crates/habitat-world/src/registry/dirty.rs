//! Per-registry change tracking.

use std::collections::BTreeSet;

use habitat_types::EntityId;

/// IDs added, removed, or modified since the consumer last took the set.
///
/// A consumer takes the whole set with `take_dirty()` and never drains it
/// partially, so two consumers must not share one registry's dirty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    /// IDs registered since the last take.
    pub added: BTreeSet<EntityId>,
    /// IDs removed or killed since the last take.
    pub removed: BTreeSet<EntityId>,
    /// IDs whose position or state changed since the last take.
    pub modified: BTreeSet<EntityId>,
    /// Set when the consumer should rebuild from scratch instead of
    /// applying the ID sets.
    pub structural: bool,
}

impl DirtySet {
    /// Record a newly registered ID.
    pub fn record_added(&mut self, id: EntityId) {
        self.removed.remove(&id);
        self.modified.remove(&id);
        self.added.insert(id);
    }

    /// Record a removed (or killed) ID.
    pub fn record_removed(&mut self, id: EntityId) {
        self.added.remove(&id);
        self.modified.remove(&id);
        self.removed.insert(id);
    }

    /// Record a modified ID. No-op when the ID is already pending as added.
    pub fn record_modified(&mut self, id: EntityId) {
        if !self.added.contains(&id) && !self.removed.contains(&id) {
            self.modified.insert(id);
        }
    }

    /// Request a full rebuild from the consumer.
    pub const fn mark_structural(&mut self) {
        self.structural = true;
    }

    /// Total number of pending IDs.
    pub fn len(&self) -> usize {
        self.added
            .len()
            .saturating_add(self.removed.len())
            .saturating_add(self.modified.len())
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        !self.structural && self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
