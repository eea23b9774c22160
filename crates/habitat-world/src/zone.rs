//! Zone placement and lookup.

use habitat_types::{Position, Zone, ZoneId, ZoneKind};

/// Every zone in the world.
///
/// Zones are few and rarely change, so lookups are a linear scan; callers
/// that query every tick cache results per coarse bucket.
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    zones: Vec<Zone>,
    version: u64,
}

impl ZoneMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every zone (host write-in).
    pub fn replace_all(&mut self, zones: Vec<Zone>) {
        self.zones = zones;
        self.version = self.version.wrapping_add(1);
    }

    /// Add or replace a zone by ID.
    pub fn upsert(&mut self, zone: Zone) {
        if let Some(existing) = self.zones.iter_mut().find(|z| z.id == zone.id) {
            *existing = zone;
        } else {
            self.zones.push(zone);
        }
        self.version = self.version.wrapping_add(1);
    }

    /// Remove a zone. Returns `false` for unknown IDs.
    pub fn remove(&mut self, id: ZoneId) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != id);
        let removed = self.zones.len() != before;
        if removed {
            self.version = self.version.wrapping_add(1);
        }
        removed
    }

    /// Zones containing `position`.
    pub fn containing(&self, position: Position) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |z| z.contains(position))
    }

    /// Zones whose area comes within `margin` of `position`.
    pub fn near(&self, position: Position, margin: f32) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |z| {
            let reach = z.radius + margin;
            z.center.distance_sq(position) <= reach * reach
        })
    }

    /// Zones of one kind.
    pub fn of_kind(&self, kind: ZoneKind) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |z| z.kind == kind)
    }

    /// Every zone.
    pub fn all(&self) -> &[Zone] {
        &self.zones
    }

    /// Counter bumped on every change, for cache invalidation.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Number of zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether there are no zones.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(kind: ZoneKind, x: f32, radius: f32) -> Zone {
        Zone {
            id: ZoneId::new(),
            kind,
            center: Position::new(x, 0.0),
            radius,
        }
    }

    #[test]
    fn containing_and_near() {
        let mut map = ZoneMap::new();
        map.upsert(zone(ZoneKind::Temple, 0.0, 5.0));
        map.upsert(zone(ZoneKind::Tavern, 20.0, 5.0));
        let at = Position::new(3.0, 0.0);
        assert_eq!(map.containing(at).count(), 1);
        assert_eq!(map.near(at, 15.0).count(), 2);
        assert_eq!(map.of_kind(ZoneKind::Tavern).count(), 1);
    }

    #[test]
    fn version_bumps_on_change() {
        let mut map = ZoneMap::new();
        let z = zone(ZoneKind::Well, 0.0, 1.0);
        let id = z.id;
        map.upsert(z);
        let v = map.version();
        assert!(map.remove(id));
        assert!(!map.remove(id));
        assert_ne!(map.version(), v);
        assert!(map.is_empty());
    }
}
