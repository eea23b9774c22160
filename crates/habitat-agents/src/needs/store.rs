//! Needs records, one per live agent.

use std::collections::BTreeMap;

use habitat_compute::ColumnarStore;
use habitat_types::{EntityId, NeedKind, NeedLevel, Needs};

use crate::config::NeedsConfig;

/// Needs of one agent plus the last level reported for each need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeedsRecord {
    /// Current values.
    pub needs: Needs,
    /// Level last used for threshold notifications, by [`NeedKind::index`].
    pub levels: [NeedLevel; NeedKind::COUNT],
}

impl NeedsRecord {
    /// A record with `needs` and levels derived from it.
    pub fn new(needs: Needs, config: &NeedsConfig) -> Self {
        Self {
            needs,
            levels: NeedKind::ALL.map(|kind| classify(needs.get(kind), config)),
        }
    }
}

/// Level of a single need value.
pub fn classify(value: f32, config: &NeedsConfig) -> NeedLevel {
    if value < config.critical_threshold {
        NeedLevel::Critical
    } else if value < config.consume_threshold {
        NeedLevel::Low
    } else if value >= config.satisfied_threshold {
        NeedLevel::Satisfied
    } else {
        NeedLevel::Normal
    }
}

/// Needs records keyed by agent.
///
/// Laid out as seven columns, one per [`NeedKind`], for the batch path.
#[derive(Debug, Clone, Default)]
pub struct NeedsStore {
    records: BTreeMap<EntityId, NeedsRecord>,
    version: u64,
}

impl NeedsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless one exists. Returns `true` if inserted.
    pub fn insert(&mut self, id: EntityId, record: NeedsRecord) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, record);
        self.version = self.version.wrapping_add(1);
        true
    }

    /// Remove a record. Returns `true` if one existed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let removed = self.records.remove(&id).is_some();
        if removed {
            self.version = self.version.wrapping_add(1);
        }
        removed
    }

    /// Look up a record.
    pub fn get(&self, id: EntityId) -> Option<&NeedsRecord> {
        self.records.get(&id)
    }

    /// Look up a record mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut NeedsRecord> {
        self.records.get_mut(&id)
    }

    /// Whether a record exists.
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Every ID, in ID order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.records.keys().copied().collect()
    }

    /// Every record, in ID order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut NeedsRecord)> {
        self.records.iter_mut()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ColumnarStore for NeedsStore {
    fn membership_version(&self) -> u64 {
        self.version
    }

    fn export_rows(&self, ids: &mut Vec<EntityId>, columns: &mut [Vec<f32>]) {
        ids.clear();
        for column in columns.iter_mut() {
            column.clear();
        }
        for (id, record) in &self.records {
            ids.push(*id);
            for (column, value) in columns.iter_mut().zip(record.needs.to_array()) {
                column.push(value);
            }
        }
    }

    fn refresh_rows(&self, ids: &[EntityId], columns: &mut [Vec<f32>]) {
        for (row, id) in ids.iter().enumerate() {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            for (column, value) in columns.iter_mut().zip(record.needs.to_array()) {
                if let Some(slot) = column.get_mut(row) {
                    *slot = value;
                }
            }
        }
    }

    fn import_rows(&mut self, ids: &[EntityId], columns: &[Vec<f32>]) {
        for (row, id) in ids.iter().enumerate() {
            let Some(record) = self.records.get_mut(id) else {
                continue;
            };
            let mut values = record.needs.to_array();
            for (value, column) in values.iter_mut().zip(columns) {
                if let Some(v) = column.get(row) {
                    *value = *v;
                }
            }
            record.needs = Needs::from_array(values);
        }
    }
}

#[cfg(test)]
mod tests {
    use habitat_compute::BatchProcessor;

    use super::*;

    #[test]
    fn classify_bands() {
        let cfg = NeedsConfig::default();
        assert_eq!(classify(5.0, &cfg), NeedLevel::Critical);
        assert_eq!(classify(30.0, &cfg), NeedLevel::Low);
        assert_eq!(classify(60.0, &cfg), NeedLevel::Normal);
        assert_eq!(classify(80.0, &cfg), NeedLevel::Satisfied);
    }

    #[test]
    fn round_trips_through_batch_buffers() {
        let cfg = NeedsConfig::default();
        let mut store = NeedsStore::new();
        let id = EntityId::new();
        store.insert(id, NeedsRecord::new(Needs::filled(50.0), &cfg));
        store.insert(EntityId::new(), NeedsRecord::new(Needs::default(), &cfg));

        let mut batch = BatchProcessor::new(NeedKind::COUNT);
        batch.rebuild_buffers(&store);
        assert_eq!(batch.len(), 2);
        assert!(batch.apply_column_delta(NeedKind::Energy.index(), &[-10.0, -10.0]).is_ok());
        batch.sync_to_registry(&mut store);

        let energy = store.get(id).map(|r| r.needs.energy).unwrap_or_default();
        assert!((energy - 40.0).abs() < 1e-4);
        assert_eq!(batch.stats().relayouts, 1);

        batch.rebuild_buffers(&store);
        assert_eq!(batch.stats().refreshes, 1);
    }

    #[test]
    fn insert_does_not_overwrite() {
        let cfg = NeedsConfig::default();
        let mut store = NeedsStore::new();
        let id = EntityId::new();
        assert!(store.insert(id, NeedsRecord::new(Needs::filled(10.0), &cfg)));
        assert!(!store.insert(id, NeedsRecord::new(Needs::default(), &cfg)));
        assert!(store.get(id).is_some_and(|r| (r.needs.hunger - 10.0).abs() < 1e-4));
        assert!(store.remove(id));
        assert!(!store.remove(id));
    }
}
