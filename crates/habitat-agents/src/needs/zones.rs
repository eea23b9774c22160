//! Cached nearby-zone lookups.
//!
//! Positions are grouped into square buckets. The first lookup in a bucket
//! collects every zone that could be near any point of the bucket; later
//! lookups in the same bucket filter that short candidate list exactly
//! until the entry expires or the zone map changes.

use std::collections::HashMap;

use habitat_types::{Position, ZoneKind};
use habitat_world::ZoneMap;

type Bucket = (i32, i32);

#[derive(Debug, Clone)]
struct Entry {
    expires_at_ms: u64,
    candidates: Vec<(ZoneKind, Position, f32)>,
}

/// Zone lookup cache keyed by coarse position bucket.
#[derive(Debug, Clone)]
pub struct ZoneCache {
    bucket: f32,
    ttl_ms: u64,
    margin: f32,
    zone_version: Option<u64>,
    entries: HashMap<Bucket, Entry>,
    hits: u64,
    misses: u64,
}

impl ZoneCache {
    /// Create a cache.
    pub fn new(bucket: f32, ttl_ms: u64, margin: f32) -> Self {
        Self {
            bucket: bucket.max(1.0),
            ttl_ms,
            margin: margin.max(0.0),
            zone_version: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Fill `out` with the distinct kinds of zones within the margin of
    /// `position`.
    pub fn kinds_near(&mut self, zones: &ZoneMap, position: Position, now_ms: u64, out: &mut Vec<ZoneKind>) {
        out.clear();
        if self.zone_version != Some(zones.version()) {
            self.entries.clear();
            self.zone_version = Some(zones.version());
        }

        let key = self.bucket_of(position);
        let fresh = self.entries.get(&key).is_some_and(|e| e.expires_at_ms > now_ms);
        if fresh {
            self.hits = self.hits.saturating_add(1);
        } else {
            self.misses = self.misses.saturating_add(1);
            let entry = self.collect(zones, key, now_ms);
            self.entries.insert(key, entry);
        }

        let Some(entry) = self.entries.get(&key) else {
            return;
        };
        for &(kind, center, radius) in &entry.candidates {
            let reach = radius + self.margin;
            if center.distance_sq(position) <= reach * reach && !out.contains(&kind) {
                out.push(kind);
            }
        }
    }

    /// Lookups answered from a live entry.
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to scan the zone map.
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket_of(&self, position: Position) -> Bucket {
        (
            (position.x / self.bucket).floor() as i32,
            (position.y / self.bucket).floor() as i32,
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn collect(&self, zones: &ZoneMap, key: Bucket, now_ms: u64) -> Entry {
        let half = self.bucket * 0.5;
        let center = Position::new(
            (key.0 as f32).mul_add(self.bucket, half),
            (key.1 as f32).mul_add(self.bucket, half),
        );
        let slack = self.margin + half * core::f32::consts::SQRT_2;
        let candidates = zones
            .near(center, slack)
            .map(|z| (z.kind, z.center, z.radius))
            .collect();
        Entry {
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{Zone, ZoneId};

    use super::*;

    fn map_with(kind: ZoneKind, x: f32, radius: f32) -> ZoneMap {
        let mut map = ZoneMap::new();
        map.upsert(Zone {
            id: ZoneId::new(),
            kind,
            center: Position::new(x, 0.0),
            radius,
        });
        map
    }

    #[test]
    fn exact_filter_inside_bucket() {
        let zones = map_with(ZoneKind::Temple, 0.0, 2.0);
        let mut cache = ZoneCache::new(16.0, 1_000, 1.0);
        let mut out = Vec::new();
        cache.kinds_near(&zones, Position::new(2.5, 0.0), 0, &mut out);
        assert_eq!(out, vec![ZoneKind::Temple]);
        cache.kinds_near(&zones, Position::new(10.0, 0.0), 10, &mut out);
        assert!(out.is_empty());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn entries_expire_and_follow_zone_changes() {
        let mut zones = map_with(ZoneKind::Bath, 0.0, 3.0);
        let mut cache = ZoneCache::new(16.0, 100, 0.0);
        let mut out = Vec::new();
        cache.kinds_near(&zones, Position::new(1.0, 0.0), 0, &mut out);
        cache.kinds_near(&zones, Position::new(1.0, 0.0), 150, &mut out);
        assert_eq!(cache.misses(), 2);

        zones.replace_all(Vec::new());
        cache.kinds_near(&zones, Position::new(1.0, 0.0), 160, &mut out);
        assert!(out.is_empty());
        assert_eq!(cache.misses(), 3);
    }
}
