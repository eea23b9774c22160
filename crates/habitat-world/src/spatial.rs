//! Uniform-grid spatial index over entities and animals.
//!
//! The index stores only a position and kind per ID; the records stay in
//! their registries. It is kept consistent with the registries by
//! [`SpatialIndex::rebuild_if_needed`], which either replays the entity
//! registry's dirty set and polls animal positions (incremental) or
//! reinserts everything (full).
//!
//! Cached positions may lag the registries by up to the move threshold
//! between rebuilds, and sampled animals may lag further until the sampling
//! cursor reaches them.

use std::collections::HashMap;

use habitat_types::{EntityId, EntityKind, Position};
use serde::Deserialize;
use tracing::debug;

use crate::registry::{AnimalRegistry, DirtySet, EntityRegistry, exceeds_ratio};

/// Grid cell coordinates.
pub type CellKey = (i32, i32);

/// Tuning for the spatial index.
#[derive(Debug, Clone, Deserialize)]
pub struct SpatialConfig {
    /// Side length of a grid cell in world units.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Distance a record must move before it is reinserted.
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f32,
    /// Fraction of the indexed population whose change forces a full
    /// rebuild instead of an incremental one.
    #[serde(default = "default_full_rebuild_ratio")]
    pub full_rebuild_ratio: f32,
    /// Fraction of the agent population whose change forces a full
    /// agent-to-entity reconciliation pass.
    #[serde(default = "default_reconcile_ratio")]
    pub reconcile_ratio: f32,
    /// Above this many live animals, positions are sampled.
    #[serde(default = "default_animal_sample_threshold")]
    pub animal_sample_threshold: usize,
    /// Animals checked per incremental rebuild when sampling.
    #[serde(default = "default_animal_sample_size")]
    pub animal_sample_size: usize,
}

const fn default_cell_size() -> f32 {
    32.0
}

const fn default_move_threshold() -> f32 {
    2.0
}

const fn default_full_rebuild_ratio() -> f32 {
    0.2
}

const fn default_reconcile_ratio() -> f32 {
    0.2
}

const fn default_animal_sample_threshold() -> usize {
    500
}

const fn default_animal_sample_size() -> usize {
    100
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            move_threshold: default_move_threshold(),
            full_rebuild_ratio: default_full_rebuild_ratio(),
            reconcile_ratio: default_reconcile_ratio(),
            animal_sample_threshold: default_animal_sample_threshold(),
            animal_sample_size: default_animal_sample_size(),
        }
    }
}

/// One query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    /// The hit record.
    pub id: EntityId,
    /// Distance from the query centre.
    pub distance: f32,
    /// Kind of the hit record.
    pub kind: EntityKind,
}

/// What a call to [`SpatialIndex::rebuild_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildKind {
    /// Nothing had changed.
    Skipped,
    /// Dirty IDs and (sampled) animal moves were applied.
    Incremental,
    /// Every live record was reinserted.
    Full,
}

/// Rebuild and maintenance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialStats {
    /// Full rebuilds performed.
    pub full_rebuilds: u64,
    /// Incremental rebuilds performed.
    pub incremental_rebuilds: u64,
    /// Records reinserted by incremental rebuilds.
    pub reinserts: u64,
    /// Records evicted by incremental rebuilds.
    pub evictions: u64,
}

/// Free-list of query result vectors.
#[derive(Debug, Default)]
pub struct QueryPool {
    free: Vec<Vec<SpatialHit>>,
}

impl QueryPool {
    const MAX_POOLED: usize = 32;

    /// Take an empty vector, reusing a pooled allocation when available.
    pub fn acquire(&mut self) -> Vec<SpatialHit> {
        self.free.pop().unwrap_or_default()
    }

    /// Return a vector to the pool.
    pub fn release(&mut self, mut buffer: Vec<SpatialHit>) {
        if self.free.len() < Self::MAX_POOLED {
            buffer.clear();
            self.free.push(buffer);
        }
    }

    /// Number of pooled vectors.
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    position: Position,
    kind: EntityKind,
    cell: CellKey,
}

/// Uniform-grid index answering radius queries.
#[derive(Debug)]
pub struct SpatialIndex {
    config: SpatialConfig,
    cells: HashMap<CellKey, Vec<EntityId>>,
    cache: HashMap<EntityId, Cached>,
    needs_full: bool,
    animal_cursor: usize,
    pool: QueryPool,
    stats: SpatialStats,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl SpatialIndex {
    /// Create an empty index. The first rebuild is always full.
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            cells: HashMap::new(),
            cache: HashMap::new(),
            needs_full: true,
            animal_cursor: 0,
            pool: QueryPool::default(),
            stats: SpatialStats::default(),
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Rebuild counters.
    pub const fn stats(&self) -> SpatialStats {
        self.stats
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: EntityId) -> bool {
        self.cache.contains_key(&id)
    }

    /// The cached position of `id`.
    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.cache.get(&id).map(|c| c.position)
    }

    /// Cell containing `position`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_of(&self, position: Position) -> CellKey {
        let size = self.config.cell_size;
        (
            (position.x / size).floor() as i32,
            (position.y / size).floor() as i32,
        )
    }

    /// Insert or move a record.
    pub fn upsert(&mut self, id: EntityId, position: Position, kind: EntityKind) {
        let cell = self.cell_of(position);
        if let Some(previous) = self.cache.get(&id).copied() {
            if previous.cell != cell {
                self.detach(id, previous.cell);
                self.cells.entry(cell).or_default().push(id);
            }
        } else {
            self.cells.entry(cell).or_default().push(id);
        }
        self.cache.insert(id, Cached { position, kind, cell });
    }

    /// Remove a record. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(previous) = self.cache.remove(&id) else {
            return false;
        };
        self.detach(id, previous.cell);
        true
    }

    /// Force the next [`rebuild_if_needed`](Self::rebuild_if_needed) to be
    /// a full rebuild.
    pub const fn mark_dirty(&mut self) {
        self.needs_full = true;
    }

    /// Records within `radius` of `center`, nearest first. `kind_filter`
    /// of `None` matches every kind.
    pub fn query_radius(
        &mut self,
        center: Position,
        radius: f32,
        kind_filter: Option<EntityKind>,
    ) -> Vec<SpatialHit> {
        let mut out = self.pool.acquire();
        self.query_radius_into(center, radius, kind_filter, &mut out);
        out
    }

    /// Hand a result vector from [`query_radius`](Self::query_radius) back
    /// for reuse.
    pub fn release(&mut self, buffer: Vec<SpatialHit>) {
        self.pool.release(buffer);
    }

    /// As [`query_radius`](Self::query_radius), writing into `out` (which
    /// is cleared first).
    pub fn query_radius_into(
        &self,
        center: Position,
        radius: f32,
        kind_filter: Option<EntityKind>,
        out: &mut Vec<SpatialHit>,
    ) {
        out.clear();
        if radius < 0.0 || radius.is_nan() {
            return;
        }
        let radius_sq = radius * radius;
        let mut consider = |id: EntityId, cached: &Cached| {
            if kind_filter.is_some_and(|k| k != cached.kind) {
                return;
            }
            let dist_sq = center.distance_sq(cached.position);
            if dist_sq <= radius_sq {
                out.push(SpatialHit {
                    id,
                    distance: dist_sq.sqrt(),
                    kind: cached.kind,
                });
            }
        };

        let (min_x, min_y) = self.cell_of(Position::new(center.x - radius, center.y - radius));
        let (max_x, max_y) = self.cell_of(Position::new(center.x + radius, center.y + radius));
        let span_x = i64::from(max_x).saturating_sub(i64::from(min_x)).saturating_add(1);
        let span_y = i64::from(max_y).saturating_sub(i64::from(min_y)).saturating_add(1);
        let cells_in_range = span_x.saturating_mul(span_y);

        if cells_in_range > i64::try_from(self.cells.len()).unwrap_or(i64::MAX) {
            // Very large radius: walking occupied cells beats walking the range.
            for (id, cached) in &self.cache {
                consider(*id, cached);
            }
        } else {
            for cx in min_x..=max_x {
                for cy in min_y..=max_y {
                    let Some(ids) = self.cells.get(&(cx, cy)) else {
                        continue;
                    };
                    for id in ids {
                        if let Some(cached) = self.cache.get(id) {
                            consider(*id, cached);
                        }
                    }
                }
            }
        }

        out.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
    }

    /// The nearest record within `radius` matching `kind_filter` and
    /// `accept`.
    pub fn nearest(
        &mut self,
        center: Position,
        radius: f32,
        kind_filter: Option<EntityKind>,
        mut accept: impl FnMut(&SpatialHit) -> bool,
    ) -> Option<SpatialHit> {
        let hits = self.query_radius(center, radius, kind_filter);
        let found = hits.iter().find(|h| accept(h)).copied();
        self.release(hits);
        found
    }

    /// Bring the index up to date with the registries.
    ///
    /// Consumes the entity registry's dirty set and the animal registry's
    /// dirty set. A full rebuild runs when [`mark_dirty`](Self::mark_dirty)
    /// was called, when either dirty set is structural, or when the change
    /// volume exceeds `full_rebuild_ratio` of the indexed population.
    pub fn rebuild_if_needed(
        &mut self,
        entities: &mut EntityRegistry,
        animals: &mut AnimalRegistry,
    ) -> RebuildKind {
        let entity_dirty = entities.take_dirty();
        let animal_dirty = animals.take_dirty();
        let structural_changes = entity_dirty
            .len()
            .saturating_add(animal_dirty.added.len())
            .saturating_add(animal_dirty.removed.len());

        let full = self.needs_full
            || entity_dirty.structural
            || animal_dirty.structural
            || exceeds_ratio(structural_changes, self.cache.len(), self.config.full_rebuild_ratio);

        if full {
            self.full_rebuild(entities, animals);
            return RebuildKind::Full;
        }

        if entity_dirty.is_empty() && animal_dirty.is_empty() && animals.alive_count() == 0 {
            return RebuildKind::Skipped;
        }

        self.apply_entity_changes(&entity_dirty, entities);
        self.apply_animal_membership(&animal_dirty, animals);
        self.poll_animal_positions(animals);
        self.stats.incremental_rebuilds = self.stats.incremental_rebuilds.saturating_add(1);
        RebuildKind::Incremental
    }

    fn full_rebuild(&mut self, entities: &EntityRegistry, animals: &AnimalRegistry) {
        self.cells.clear();
        self.cache.clear();
        for entity in entities.all_alive() {
            self.upsert(entity.id, entity.position, entity.kind);
        }
        for animal in animals.all_alive() {
            self.upsert(animal.id, animal.position, EntityKind::Animal);
        }
        self.needs_full = false;
        self.stats.full_rebuilds = self.stats.full_rebuilds.saturating_add(1);
        debug!(indexed = self.cache.len(), cells = self.cells.len(), "spatial index fully rebuilt");
    }

    fn apply_entity_changes(&mut self, dirty: &DirtySet, entities: &EntityRegistry) {
        for id in &dirty.removed {
            self.evict(*id);
        }
        for id in dirty.added.iter().chain(&dirty.modified) {
            match entities.get(*id) {
                Some(entity) if entity.alive => {
                    self.reinsert_if_moved(entity.id, entity.position, entity.kind);
                }
                _ => self.evict(*id),
            }
        }
    }

    fn apply_animal_membership(&mut self, dirty: &DirtySet, animals: &AnimalRegistry) {
        for id in &dirty.removed {
            self.evict(*id);
        }
        for id in &dirty.added {
            match animals.get(*id) {
                Some(animal) if animal.is_alive() => {
                    self.reinsert_if_moved(animal.id, animal.position, EntityKind::Animal);
                }
                _ => self.evict(*id),
            }
        }
    }

    /// Check animal positions against the cache. Above the sample
    /// threshold only a round-robin window of animals is checked.
    fn poll_animal_positions(&mut self, animals: &AnimalRegistry) {
        let alive = animals.alive_count();
        if alive == 0 {
            return;
        }
        if alive <= self.config.animal_sample_threshold {
            for animal in animals.all_alive() {
                self.reinsert_if_moved(animal.id, animal.position, EntityKind::Animal);
            }
            return;
        }

        let start = self.animal_cursor.checked_rem(alive).unwrap_or(0);
        let window = self.config.animal_sample_size.min(alive);
        let sampled: Vec<(EntityId, Position)> = animals
            .all_alive()
            .cycle()
            .skip(start)
            .take(window)
            .map(|a| (a.id, a.position))
            .collect();
        for (id, position) in sampled {
            self.reinsert_if_moved(id, position, EntityKind::Animal);
        }
        self.animal_cursor = start.saturating_add(window).checked_rem(alive).unwrap_or(0);
    }

    fn reinsert_if_moved(&mut self, id: EntityId, position: Position, kind: EntityKind) {
        let threshold_sq = self.config.move_threshold * self.config.move_threshold;
        let moved = self
            .cache
            .get(&id)
            .is_none_or(|c| c.kind != kind || c.position.distance_sq(position) > threshold_sq);
        if moved {
            self.upsert(id, position, kind);
            self.stats.reinserts = self.stats.reinserts.saturating_add(1);
        }
    }

    fn evict(&mut self, id: EntityId) {
        if self.remove(id) {
            self.stats.evictions = self.stats.evictions.saturating_add(1);
        }
    }

    fn detach(&mut self, id: EntityId, cell: CellKey) {
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{Animal, AnimalNeeds, AnimalState, Biome, Entity, Genes};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const EPS: f32 = 1e-4;

    fn animal_at(position: Position) -> Animal {
        Animal {
            id: EntityId::new(),
            species: "deer".to_owned(),
            position,
            state: AnimalState::Idle,
            needs: AnimalNeeds::default(),
            genes: Genes::default(),
            health: 100.0,
            age_years: 2.0,
            generation: 0,
            parent_a: None,
            parent_b: None,
            target_position: None,
            target_id: None,
            flee_from: None,
            biome: Biome::Forest,
            dead: false,
            state_timer_ms: 0,
            mate_ready_at_ms: 0,
            died_at_ms: None,
            cause_of_death: None,
        }
    }

    fn sorted_ids(index: &mut SpatialIndex, center: Position, radius: f32) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = index
            .query_radius(center, radius, None)
            .iter()
            .map(|h| h.id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn zero_radius_finds_exact_position() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new();
        let at = Position::new(17.5, -3.25);
        index.upsert(id, at, EntityKind::Building);
        let hits = index.query_radius(at, 0.0, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.first().map(|h| h.id), Some(id));
        assert!(hits.first().is_some_and(|h| h.distance.abs() < EPS));
    }

    #[test]
    fn removed_entity_is_not_returned() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new();
        index.upsert(id, Position::new(1.0, 1.0), EntityKind::Resource);
        assert!(index.remove(id));
        assert!(!index.remove(id));
        assert!(index.query_radius(Position::new(1.0, 1.0), 10.0, None).is_empty());
    }

    #[test]
    fn results_sorted_and_filtered() {
        let mut index = SpatialIndex::default();
        let near = EntityId::new();
        let far = EntityId::new();
        let other = EntityId::new();
        index.upsert(far, Position::new(9.0, 0.0), EntityKind::Agent);
        index.upsert(near, Position::new(1.0, 0.0), EntityKind::Agent);
        index.upsert(other, Position::new(2.0, 0.0), EntityKind::Animal);

        let hits = index.query_radius(Position::new(0.0, 0.0), 10.0, Some(EntityKind::Agent));
        let ids: Vec<EntityId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![near, far]);

        let none = index.query_radius(Position::new(0.0, 0.0), 1.5, Some(EntityKind::Building));
        assert!(none.is_empty());
    }

    #[test]
    fn query_crosses_cell_boundaries() {
        let mut index = SpatialIndex::new(SpatialConfig {
            cell_size: 4.0,
            ..SpatialConfig::default()
        });
        let id = EntityId::new();
        index.upsert(id, Position::new(-0.5, -0.5), EntityKind::Zone);
        let hits = index.query_radius(Position::new(0.5, 0.5), 1.5, None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn pool_reuses_buffers() {
        let mut index = SpatialIndex::default();
        let hits = index.query_radius(Position::default(), 1.0, None);
        index.release(hits);
        assert_eq!(index.pool.pooled(), 1);
        let _again = index.query_radius(Position::default(), 1.0, None);
        assert_eq!(index.pool.pooled(), 0);
    }

    #[test]
    fn first_rebuild_is_full_then_incremental() {
        let mut entities = EntityRegistry::new();
        let mut animals = AnimalRegistry::new();
        entities.register(Entity::new(EntityId::new(), EntityKind::Building, Position::new(3.0, 3.0)));
        let mut index = SpatialIndex::default();

        assert_eq!(index.rebuild_if_needed(&mut entities, &mut animals), RebuildKind::Full);
        assert_eq!(index.rebuild_if_needed(&mut entities, &mut animals), RebuildKind::Skipped);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn dead_entities_are_evicted_incrementally() {
        let mut entities = EntityRegistry::new();
        let mut animals = AnimalRegistry::new();
        let ids: Vec<EntityId> = (0..20)
            .map(|i| {
                let id = EntityId::new();
                let x = f32::from(u8::try_from(i).unwrap_or(0));
                entities.register(Entity::new(id, EntityKind::Building, Position::new(x, 0.0)));
                id
            })
            .collect();
        let mut index = SpatialIndex::default();
        index.rebuild_if_needed(&mut entities, &mut animals);

        let victim = ids.first().copied().unwrap_or_default();
        entities.mark_dead(victim);
        assert_eq!(index.rebuild_if_needed(&mut entities, &mut animals), RebuildKind::Incremental);
        assert!(!index.contains(victim));
        assert_eq!(index.len(), 19);
    }

    #[test]
    fn small_moves_are_absorbed_by_threshold() {
        let mut entities = EntityRegistry::new();
        let mut animals = AnimalRegistry::new();
        let ids: Vec<EntityId> = (0..10)
            .map(|_| {
                let id = EntityId::new();
                entities.register(Entity::new(id, EntityKind::Building, Position::new(5.0, 5.0)));
                id
            })
            .collect();
        let mut index = SpatialIndex::default();
        index.rebuild_if_needed(&mut entities, &mut animals);

        let id = ids.first().copied().unwrap_or_default();
        entities.set_position(id, Position::new(6.0, 5.0));
        index.rebuild_if_needed(&mut entities, &mut animals);
        let cached = index.position_of(id).unwrap_or_default();
        assert!((cached.x - 5.0).abs() < EPS);

        entities.set_position(id, Position::new(9.0, 5.0));
        index.rebuild_if_needed(&mut entities, &mut animals);
        let cached = index.position_of(id).unwrap_or_default();
        assert!((cached.x - 9.0).abs() < EPS);
    }

    #[test]
    fn incremental_and_full_converge() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut entities = EntityRegistry::new();
        let mut animals = AnimalRegistry::new();
        let mut entity_ids = Vec::new();
        for _ in 0..60 {
            let id = EntityId::new();
            let pos = Position::new(rng.random_range(0.0..200.0), rng.random_range(0.0..200.0));
            entities.register(Entity::new(id, EntityKind::Building, pos));
            entity_ids.push(id);
        }
        let mut animal_ids = Vec::new();
        for _ in 0..40 {
            let animal = animal_at(Position::new(rng.random_range(0.0..200.0), rng.random_range(0.0..200.0)));
            animal_ids.push(animal.id);
            animals.register(animal);
        }

        let mut incremental = SpatialIndex::new(SpatialConfig {
            move_threshold: 0.0,
            ..SpatialConfig::default()
        });
        incremental.rebuild_if_needed(&mut entities, &mut animals);

        // A few small batches of changes, each below the full-rebuild ratio.
        for round in 0..5 {
            for id in entity_ids.iter().skip(round).step_by(10) {
                let pos = Position::new(rng.random_range(0.0..200.0), rng.random_range(0.0..200.0));
                entities.set_position(*id, pos);
            }
            for id in animal_ids.iter().skip(round).step_by(8) {
                let pos = Position::new(rng.random_range(0.0..200.0), rng.random_range(0.0..200.0));
                animals.set_position(*id, pos);
            }
            if let Some(id) = entity_ids.get(round.saturating_mul(7)) {
                entities.mark_dead(*id);
            }
            let kind = incremental.rebuild_if_needed(&mut entities, &mut animals);
            assert_eq!(kind, RebuildKind::Incremental);
        }

        let mut full = SpatialIndex::new(SpatialConfig {
            move_threshold: 0.0,
            ..SpatialConfig::default()
        });
        full.rebuild_if_needed(&mut entities, &mut animals);

        for center in [Position::new(50.0, 50.0), Position::new(150.0, 120.0), Position::new(0.0, 0.0)] {
            assert_eq!(
                sorted_ids(&mut incremental, center, 60.0),
                sorted_ids(&mut full, center, 60.0)
            );
        }
        assert_eq!(incremental.len(), full.len());
    }

    #[test]
    fn sampling_eventually_covers_every_animal() {
        let mut entities = EntityRegistry::new();
        let mut animals = AnimalRegistry::new();
        let ids: Vec<EntityId> = (0..10)
            .map(|_| {
                let a = animal_at(Position::new(1.0, 1.0));
                let id = a.id;
                animals.register(a);
                id
            })
            .collect();
        let mut index = SpatialIndex::new(SpatialConfig {
            animal_sample_threshold: 4,
            animal_sample_size: 3,
            ..SpatialConfig::default()
        });
        index.rebuild_if_needed(&mut entities, &mut animals);

        for id in &ids {
            animals.set_position(*id, Position::new(100.0, 100.0));
        }
        // 10 animals, 3 per pass: four passes cover everyone.
        for _ in 0..4 {
            index.rebuild_if_needed(&mut entities, &mut animals);
        }
        for id in &ids {
            let cached = index.position_of(*id).unwrap_or_default();
            assert!((cached.x - 100.0).abs() < EPS);
        }
    }
}
