//! Time-to-live lookup caches keyed on simulation time.
//!
//! Both the threat and the resource lookups cache negative results as well
//! as hits, so an animal with nothing nearby does not rescan every tick.
//! Callers invalidate an entry when the cached target has gone away.

use std::collections::BTreeMap;

use habitat_types::{EntityId, ResourceKind};

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found no live entry.
    pub misses: u64,
    /// Entries dropped because their target went away.
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    target: Option<EntityId>,
    expires_at_ms: u64,
}

/// A lookup result cache whose entries expire `ttl_ms` after insertion.
///
/// The cached value is the target found, or `None` when the lookup came
/// back empty.
#[derive(Debug, Clone)]
pub struct TtlCache<K> {
    ttl_ms: u64,
    entries: BTreeMap<K, Entry>,
    stats: CacheStats,
}

impl<K: Ord + Copy> TtlCache<K> {
    /// Create an empty cache.
    pub const fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: BTreeMap::new(),
            stats: CacheStats {
                hits: 0,
                misses: 0,
                invalidations: 0,
            },
        }
    }

    /// The cached result for `key`, if one is still live at `now_ms`.
    /// `Some(None)` is a cached empty lookup.
    pub fn get(&mut self, key: K, now_ms: u64) -> Option<Option<EntityId>> {
        match self.entries.get(&key) {
            Some(entry) if entry.expires_at_ms > now_ms => {
                self.stats.hits = self.stats.hits.saturating_add(1);
                Some(entry.target)
            }
            _ => {
                self.stats.misses = self.stats.misses.saturating_add(1);
                None
            }
        }
    }

    /// Cache a lookup result.
    pub fn insert(&mut self, key: K, target: Option<EntityId>, now_ms: u64) {
        self.entries.insert(
            key,
            Entry {
                target,
                expires_at_ms: now_ms.saturating_add(self.ttl_ms),
            },
        );
    }

    /// Drop the entry for `key` because its target is gone.
    pub fn invalidate(&mut self, key: K) -> bool {
        let removed = self.entries.remove(&key).is_some();
        if removed {
            self.stats.invalidations = self.stats.invalidations.saturating_add(1);
        }
        removed
    }

    /// Drop every entry that expired at or before `now_ms`.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at_ms > now_ms);
        before.saturating_sub(self.entries.len())
    }

    /// Drop entries whose key matches `pred`.
    pub fn forget_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| !pred(k));
    }

    /// Counters.
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Entries held, live or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Nearest threat per animal.
pub type ThreatCache = TtlCache<EntityId>;

/// Nearest stocked node per animal and resource.
pub type ResourceCache = TtlCache<(EntityId, ResourceKind)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = ThreatCache::new(500);
        let animal = EntityId::new();
        let wolf = EntityId::new();
        cache.insert(animal, Some(wolf), 1_000);
        assert_eq!(cache.get(animal, 1_499), Some(Some(wolf)));
        assert_eq!(cache.get(animal, 1_500), None);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn empty_lookups_are_cached() {
        let mut cache = ResourceCache::new(100);
        let animal = EntityId::new();
        cache.insert((animal, ResourceKind::Water), None, 0);
        assert_eq!(cache.get((animal, ResourceKind::Water), 50), Some(None));
        assert_eq!(cache.get((animal, ResourceKind::Food), 50), None);
    }

    #[test]
    fn invalidate_and_prune() {
        let mut cache = ThreatCache::new(100);
        let a = EntityId::new();
        let b = EntityId::new();
        cache.insert(a, None, 0);
        cache.insert(b, None, 50);
        assert!(cache.invalidate(a));
        assert!(!cache.invalidate(a));
        assert_eq!(cache.stats().invalidations, 1);
        assert_eq!(cache.prune(150), 1);
        assert!(cache.is_empty());
    }
}
