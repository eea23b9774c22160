//! The batch processor and its store seam.
//!
//! The processor owns one [`ColumnSet`] laid out from a [`ColumnarStore`].
//! Layout is rebuilt only when the store's membership version changes;
//! between membership changes the rows keep their order and only values
//! are refreshed.

use habitat_types::{EntityId, Position};
use tracing::warn;

use crate::backend::{ComputeBackend, ComputeError};
use crate::columns::ColumnSet;
use crate::kernels::{CpuKernels, CrossEffectRule};
use crate::scratch::ScratchArena;

/// A record store that can be laid out as columns.
pub trait ColumnarStore {
    /// Counter bumped on every add or remove.
    fn membership_version(&self) -> u64;

    /// Clear and refill `ids` and `columns` with every row in a stable order.
    fn export_rows(&self, ids: &mut Vec<EntityId>, columns: &mut [Vec<f32>]);

    /// Overwrite `columns` with current values for the rows in `ids`.
    fn refresh_rows(&self, ids: &[EntityId], columns: &mut [Vec<f32>]);

    /// Write column values back to the rows in `ids`. Unknown IDs are
    /// skipped.
    fn import_rows(&mut self, ids: &[EntityId], columns: &[Vec<f32>]);
}

/// Counters describing how batches were executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Full relayouts after a membership change.
    pub relayouts: u64,
    /// In-place value refreshes.
    pub refreshes: u64,
    /// Ops completed by the backend.
    pub backend_ops: u64,
    /// Ops where the backend failed and the CPU kernel ran instead.
    pub fallbacks: u64,
}

/// Runs need-style kernels over a columnar copy of a store.
pub struct BatchProcessor {
    columns: ColumnSet,
    scratch: ScratchArena,
    backend: Option<Box<dyn ComputeBackend>>,
    backend_threshold: usize,
    layout_version: Option<u64>,
    stats: BatchStats,
}

impl core::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("rows", &self.columns.len())
            .field("columns", &self.columns.column_count())
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("backend_threshold", &self.backend_threshold)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    /// Create a CPU-only processor with `column_count` columns.
    pub fn new(column_count: usize) -> Self {
        Self {
            columns: ColumnSet::with_columns(column_count),
            scratch: ScratchArena::new(),
            backend: None,
            backend_threshold: usize::MAX,
            layout_version: None,
            stats: BatchStats::default(),
        }
    }

    /// Attach an accelerated backend, used for batches of at least
    /// `threshold` rows.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn ComputeBackend>, threshold: usize) -> Self {
        self.set_backend(Some(backend), threshold);
        self
    }

    /// Replace (or remove) the accelerated backend.
    pub fn set_backend(&mut self, backend: Option<Box<dyn ComputeBackend>>, threshold: usize) {
        self.backend = backend;
        self.backend_threshold = threshold;
    }

    /// Name of the attached backend, if any.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Execution counters.
    pub const fn stats(&self) -> BatchStats {
        self.stats
    }

    /// The current buffers.
    pub const fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Row IDs in buffer order.
    pub fn ids(&self) -> &[EntityId] {
        self.columns.ids()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the buffers are empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Force the next [`rebuild_buffers`](Self::rebuild_buffers) to relayout.
    pub const fn invalidate_layout(&mut self) {
        self.layout_version = None;
    }

    /// Bring the buffers up to date with `store`.
    ///
    /// Relayouts only when the store's membership version differs from the
    /// one the current layout was built from.
    pub fn rebuild_buffers<S>(&mut self, store: &S)
    where
        S: ColumnarStore + ?Sized,
    {
        let version = store.membership_version();
        if self.layout_version == Some(version) {
            let (ids, columns) = self.columns.parts_mut();
            store.refresh_rows(ids, columns);
            self.stats.refreshes = self.stats.refreshes.saturating_add(1);
            return;
        }
        let (ids, columns) = self.columns.parts_mut();
        store.export_rows(ids, columns);
        self.layout_version = Some(version);
        self.stats.relayouts = self.stats.relayouts.saturating_add(1);
    }

    /// Write the buffers back to `store`.
    pub fn sync_to_registry<S>(&self, store: &mut S)
    where
        S: ColumnarStore + ?Sized,
    {
        store.import_rows(self.columns.ids(), self.columns.columns());
    }

    /// `v = clamp(v - rate * age * modifier * delta)` over every cell.
    pub fn apply_decay_batch(
        &mut self,
        rates: &[f32],
        age_multipliers: &[f32],
        modifier_multipliers: &[f32],
        delta: f32,
    ) -> Result<(), ComputeError> {
        self.run(
            "decay",
            |backend, work| {
                backend.decay(
                    work.columns_mut(),
                    rates,
                    age_multipliers,
                    modifier_multipliers,
                    delta,
                )
            },
            |live| {
                CpuKernels::decay(
                    live.columns_mut(),
                    rates,
                    age_multipliers,
                    modifier_multipliers,
                    delta,
                )
            },
        )
    }

    /// Add a per-row term to one column, clamped.
    pub fn apply_column_delta(&mut self, column: usize, deltas: &[f32]) -> Result<(), ComputeError> {
        let column_count = self.columns.column_count();
        let out_of_range = move || ComputeError::ColumnOutOfRange {
            op: "column_delta",
            column,
            column_count,
        };
        self.run(
            "column_delta",
            |backend, work| {
                let target = work.column_mut(column).ok_or_else(out_of_range)?;
                backend.column_delta(target, deltas)
            },
            |live| {
                let target = live.column_mut(column).ok_or_else(out_of_range)?;
                CpuKernels::column_delta(target, deltas)
            },
        )
    }

    /// Apply threshold-triggered penalties across columns.
    pub fn apply_cross_effects_batch(
        &mut self,
        rules: &[CrossEffectRule],
        delta: f32,
    ) -> Result<(), ComputeError> {
        self.run(
            "cross_effects",
            |backend, work| backend.cross_effects(work.columns_mut(), rules, delta),
            |live| CpuKernels::cross_effects(live.columns_mut(), rules, delta),
        )
    }

    /// Row-major distance matrix, on the backend when the batch is large.
    pub fn pairwise_distances(&mut self, from: &[Position], to: &[Position]) -> Vec<f32> {
        if let Some(backend) = self.eligible_backend(from.len()) {
            match backend.pairwise_distances(from, to) {
                Ok(out) => {
                    self.stats.backend_ops = self.stats.backend_ops.saturating_add(1);
                    return out;
                }
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "pairwise_distances failed, using CPU kernel");
                    self.stats.fallbacks = self.stats.fallbacks.saturating_add(1);
                }
            }
        }
        CpuKernels::pairwise_distances(from, to)
    }

    /// Flee destinations, on the backend when the batch is large.
    pub fn flee_vectors(
        &mut self,
        positions: &[Position],
        threats: &[Position],
        steps: &[f32],
    ) -> Result<Vec<Position>, ComputeError> {
        if let Some(backend) = self.eligible_backend(positions.len()) {
            match backend.flee_vectors(positions, threats, steps) {
                Ok(out) => {
                    self.stats.backend_ops = self.stats.backend_ops.saturating_add(1);
                    return Ok(out);
                }
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "flee_vectors failed, using CPU kernel");
                    self.stats.fallbacks = self.stats.fallbacks.saturating_add(1);
                }
            }
        }
        CpuKernels::flee_vectors(positions, threats, steps)
    }

    fn eligible_backend(&self, rows: usize) -> Option<&dyn ComputeBackend> {
        self.backend
            .as_deref()
            .filter(|b| rows >= self.backend_threshold && b.is_available())
    }

    /// Run one buffer op on the backend inside a scratch transaction, or on
    /// the CPU when there is no eligible backend or the backend fails.
    fn run<A, C>(&mut self, op: &'static str, accelerated: A, reference: C) -> Result<(), ComputeError>
    where
        A: FnOnce(&dyn ComputeBackend, &mut ColumnSet) -> Result<(), ComputeError>,
        C: FnOnce(&mut ColumnSet) -> Result<(), ComputeError>,
    {
        let rows = self.columns.len();
        let threshold = self.backend_threshold;
        if let Some(backend) = self
            .backend
            .as_deref()
            .filter(|b| rows >= threshold && b.is_available())
        {
            let result = self
                .scratch
                .transact(&mut self.columns, |work| accelerated(backend, work));
            match result {
                Ok(()) => {
                    self.stats.backend_ops = self.stats.backend_ops.saturating_add(1);
                    return Ok(());
                }
                Err(err) => {
                    warn!(backend = backend.name(), op, rows, error = %err, "backend op failed, using CPU kernel");
                    self.stats.fallbacks = self.stats.fallbacks.saturating_add(1);
                }
            }
        }
        reference(&mut self.columns)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    const EPS: f32 = 1e-4;

    #[derive(Default)]
    struct MapStore {
        rows: BTreeMap<EntityId, [f32; 2]>,
        version: u64,
    }

    impl MapStore {
        fn insert(&mut self, id: EntityId, values: [f32; 2]) {
            self.rows.insert(id, values);
            self.version = self.version.saturating_add(1);
        }
    }

    impl ColumnarStore for MapStore {
        fn membership_version(&self) -> u64 {
            self.version
        }

        fn export_rows(&self, ids: &mut Vec<EntityId>, columns: &mut [Vec<f32>]) {
            ids.clear();
            ids.extend(self.rows.keys().copied());
            self.refresh_rows(ids, columns);
        }

        fn refresh_rows(&self, ids: &[EntityId], columns: &mut [Vec<f32>]) {
            for (c, column) in columns.iter_mut().enumerate() {
                column.clear();
                column.extend(ids.iter().map(|id| {
                    self.rows
                        .get(id)
                        .and_then(|r| r.get(c))
                        .copied()
                        .unwrap_or(0.0)
                }));
            }
        }

        fn import_rows(&mut self, ids: &[EntityId], columns: &[Vec<f32>]) {
            for (row, id) in ids.iter().enumerate() {
                if let Some(values) = self.rows.get_mut(id) {
                    for (c, value) in values.iter_mut().enumerate() {
                        if let Some(v) = columns.get(c).and_then(|col| col.get(row)) {
                            *value = *v;
                        }
                    }
                }
            }
        }
    }

    /// Scribbles over its input and then fails, like a device that dies
    /// mid-kernel.
    struct FailingBackend;

    impl ComputeBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn decay(
            &self,
            columns: &mut [Vec<f32>],
            _rates: &[f32],
            _age: &[f32],
            _modifier: &[f32],
            _delta: f32,
        ) -> Result<(), ComputeError> {
            for column in columns.iter_mut() {
                column.iter_mut().for_each(|v| *v = -999.0);
            }
            Err(fail("decay"))
        }

        fn column_delta(&self, column: &mut [f32], _deltas: &[f32]) -> Result<(), ComputeError> {
            column.iter_mut().for_each(|v| *v = -999.0);
            Err(fail("column_delta"))
        }

        fn cross_effects(
            &self,
            columns: &mut [Vec<f32>],
            _rules: &[CrossEffectRule],
            _delta: f32,
        ) -> Result<(), ComputeError> {
            if let Some(first) = columns.first_mut() {
                first.clear();
            }
            Err(fail("cross_effects"))
        }

        fn pairwise_distances(&self, _from: &[Position], _to: &[Position]) -> Result<Vec<f32>, ComputeError> {
            Err(fail("pairwise_distances"))
        }

        fn flee_vectors(
            &self,
            _positions: &[Position],
            _threats: &[Position],
            _steps: &[f32],
        ) -> Result<Vec<Position>, ComputeError> {
            Err(fail("flee_vectors"))
        }
    }

    fn fail(op: &'static str) -> ComputeError {
        ComputeError::Backend {
            backend: "failing",
            op,
            reason: "device lost".to_owned(),
        }
    }

    fn populated_store(n: usize) -> MapStore {
        let mut store = MapStore::default();
        for i in 0..n {
            let v = f32::from(u8::try_from(i % 100).unwrap_or(0));
            store.insert(EntityId::new(), [v, 100.0 - v]);
        }
        store
    }

    fn run_ops(processor: &mut BatchProcessor) {
        let n = processor.len();
        let ones = vec![1.0_f32; n];
        let deltas = vec![0.75_f32; n];
        let rules = [CrossEffectRule {
            source: 0,
            below: 30.0,
            target: 1,
            penalty_per_unit: 0.5,
        }];
        assert!(processor.apply_decay_batch(&[0.2, 0.1], &ones, &ones, 5.0).is_ok());
        assert!(processor.apply_column_delta(1, &deltas).is_ok());
        assert!(processor.apply_cross_effects_batch(&rules, 5.0).is_ok());
    }

    #[test]
    fn relayout_only_on_membership_change() {
        let mut store = populated_store(4);
        let mut processor = BatchProcessor::new(2);
        processor.rebuild_buffers(&store);
        processor.rebuild_buffers(&store);
        assert_eq!(processor.stats().relayouts, 1);
        assert_eq!(processor.stats().refreshes, 1);

        store.insert(EntityId::new(), [1.0, 1.0]);
        processor.rebuild_buffers(&store);
        assert_eq!(processor.stats().relayouts, 2);
        assert_eq!(processor.len(), 5);
    }

    #[test]
    fn sync_writes_back() {
        let mut store = populated_store(3);
        let mut processor = BatchProcessor::new(2);
        processor.rebuild_buffers(&store);
        run_ops(&mut processor);
        processor.sync_to_registry(&mut store);

        for (row, id) in processor.ids().iter().enumerate() {
            let stored = store.rows.get(id).copied().unwrap_or([-1.0, -1.0]);
            let buffered = processor.columns().value(row, 0).unwrap_or(-2.0);
            assert!((stored.first().copied().unwrap_or(-3.0) - buffered).abs() < EPS);
        }
    }

    #[test]
    fn failing_backend_leaves_cpu_result() {
        let store = populated_store(50);

        let mut cpu = BatchProcessor::new(2);
        cpu.rebuild_buffers(&store);
        run_ops(&mut cpu);

        let mut accelerated = BatchProcessor::new(2).with_backend(Box::new(FailingBackend), 1);
        accelerated.rebuild_buffers(&store);
        run_ops(&mut accelerated);

        assert_eq!(accelerated.stats().fallbacks, 3);
        assert_eq!(accelerated.stats().backend_ops, 0);
        assert_eq!(accelerated.columns(), cpu.columns());
    }

    #[test]
    fn backend_below_threshold_is_not_used() {
        let store = populated_store(5);
        let mut processor = BatchProcessor::new(2).with_backend(Box::new(FailingBackend), 100);
        processor.rebuild_buffers(&store);
        run_ops(&mut processor);
        assert_eq!(processor.stats().fallbacks, 0);
    }

    #[test]
    fn column_delta_rejects_unknown_column() {
        let store = populated_store(2);
        let mut processor = BatchProcessor::new(2);
        processor.rebuild_buffers(&store);
        let result = processor.apply_column_delta(9, &[1.0, 1.0]);
        assert!(matches!(result, Err(ComputeError::ColumnOutOfRange { column: 9, .. })));
    }

    #[test]
    fn flee_vectors_fall_back_on_failure() {
        let mut processor = BatchProcessor::new(0).with_backend(Box::new(FailingBackend), 1);
        let out = processor
            .flee_vectors(&[Position::new(0.0, 0.0)], &[Position::new(-1.0, 0.0)], &[1.0])
            .unwrap_or_default();
        assert_eq!(out.len(), 1);
        assert_eq!(processor.stats().fallbacks, 1);
    }
}
