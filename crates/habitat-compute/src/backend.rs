//! Pluggable compute backends.
//!
//! A backend is an accelerated implementation of the batch ops. It is
//! always optional: the [`CpuKernels`](crate::CpuKernels) produce the
//! reference result, and the [`BatchProcessor`](crate::BatchProcessor) falls
//! back to them whenever a backend is absent, unavailable, or fails.

use habitat_types::Position;

use crate::kernels::CrossEffectRule;

/// Errors that can occur during a batch op.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// Two buffers that must line up row for row do not.
    #[error("shape mismatch in {op}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// The op that detected the mismatch.
        op: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A cross-effect rule references a column that does not exist.
    #[error("{op}: column {column} out of range for {column_count} columns")]
    ColumnOutOfRange {
        /// The op that detected the bad index.
        op: &'static str,
        /// The offending column index.
        column: usize,
        /// Number of columns present.
        column_count: usize,
    },

    /// The backend failed while executing an op.
    #[error("backend {backend} failed during {op}: {reason}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// The op that failed.
        op: &'static str,
        /// Backend-specific failure description.
        reason: String,
    },
}

/// An accelerated implementation of the batch ops.
///
/// Implementations may mutate their input freely before returning an
/// error: callers only ever hand a backend a scratch copy.
pub trait ComputeBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the backend can run right now.
    fn is_available(&self) -> bool;

    /// See [`CpuKernels::decay`](crate::CpuKernels::decay).
    fn decay(
        &self,
        columns: &mut [Vec<f32>],
        rates: &[f32],
        age_multipliers: &[f32],
        modifier_multipliers: &[f32],
        delta: f32,
    ) -> Result<(), ComputeError>;

    /// See [`CpuKernels::column_delta`](crate::CpuKernels::column_delta).
    fn column_delta(&self, column: &mut [f32], deltas: &[f32]) -> Result<(), ComputeError>;

    /// See [`CpuKernels::cross_effects`](crate::CpuKernels::cross_effects).
    fn cross_effects(
        &self,
        columns: &mut [Vec<f32>],
        rules: &[CrossEffectRule],
        delta: f32,
    ) -> Result<(), ComputeError>;

    /// See [`CpuKernels::pairwise_distances`](crate::CpuKernels::pairwise_distances).
    fn pairwise_distances(&self, from: &[Position], to: &[Position]) -> Result<Vec<f32>, ComputeError>;

    /// See [`CpuKernels::flee_vectors`](crate::CpuKernels::flee_vectors).
    fn flee_vectors(
        &self,
        positions: &[Position],
        threats: &[Position],
        steps: &[f32],
    ) -> Result<Vec<Position>, ComputeError>;
}

#[cfg(feature = "parallel")]
pub use parallel::RayonBackend;

#[cfg(feature = "parallel")]
mod parallel {
    use rayon::prelude::*;

    use habitat_types::{Position, clamp_need};

    use super::{ComputeBackend, ComputeError};
    use crate::kernels::{
        CrossEffectRule, check_len, source_and_target, validate_rectangular, validate_rules,
    };

    /// Data-parallel backend on the rayon global thread pool.
    ///
    /// Produces bit-identical results to the CPU kernels: the arithmetic
    /// per cell is the same, only the iteration is split across threads.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RayonBackend;

    impl ComputeBackend for RayonBackend {
        fn name(&self) -> &'static str {
            "rayon"
        }

        fn is_available(&self) -> bool {
            rayon::current_num_threads() > 1
        }

        fn decay(
            &self,
            columns: &mut [Vec<f32>],
            rates: &[f32],
            age_multipliers: &[f32],
            modifier_multipliers: &[f32],
            delta: f32,
        ) -> Result<(), ComputeError> {
            let rows = validate_rectangular("decay", columns)?;
            check_len("decay", columns.len(), rates.len())?;
            check_len("decay", rows, age_multipliers.len())?;
            check_len("decay", rows, modifier_multipliers.len())?;

            for (column, &rate) in columns.iter_mut().zip(rates) {
                column
                    .par_iter_mut()
                    .zip(age_multipliers.par_iter())
                    .zip(modifier_multipliers.par_iter())
                    .for_each(|((value, &age), &modifier)| {
                        *value = clamp_need(rate.mul_add(-(age * modifier * delta), *value));
                    });
            }
            Ok(())
        }

        fn column_delta(&self, column: &mut [f32], deltas: &[f32]) -> Result<(), ComputeError> {
            check_len("column_delta", column.len(), deltas.len())?;
            column
                .par_iter_mut()
                .zip(deltas.par_iter())
                .for_each(|(value, &delta)| *value = clamp_need(*value + delta));
            Ok(())
        }

        fn cross_effects(
            &self,
            columns: &mut [Vec<f32>],
            rules: &[CrossEffectRule],
            delta: f32,
        ) -> Result<(), ComputeError> {
            validate_rectangular("cross_effects", columns)?;
            validate_rules("cross_effects", columns.len(), rules)?;

            for rule in rules {
                let penalty = rule.penalty_per_unit * delta;
                let below = rule.below;
                if rule.source == rule.target {
                    if let Some(column) = columns.get_mut(rule.target) {
                        column.par_iter_mut().for_each(|value| {
                            if *value < below {
                                *value = clamp_need(*value - penalty);
                            }
                        });
                    }
                    continue;
                }
                if let Some((source, target)) = source_and_target(columns, rule.source, rule.target) {
                    target
                        .par_iter_mut()
                        .zip(source.par_iter())
                        .for_each(|(value, &trigger)| {
                            if trigger < below {
                                *value = clamp_need(*value - penalty);
                            }
                        });
                }
            }
            Ok(())
        }

        fn pairwise_distances(&self, from: &[Position], to: &[Position]) -> Result<Vec<f32>, ComputeError> {
            Ok(from
                .par_iter()
                .flat_map_iter(|a| to.iter().map(move |b| a.distance(*b)))
                .collect())
        }

        fn flee_vectors(
            &self,
            positions: &[Position],
            threats: &[Position],
            steps: &[f32],
        ) -> Result<Vec<Position>, ComputeError> {
            check_len("flee_vectors", positions.len(), threats.len())?;
            check_len("flee_vectors", positions.len(), steps.len())?;
            Ok(positions
                .par_iter()
                .zip(threats.par_iter())
                .zip(steps.par_iter())
                .map(|((p, t), &s)| p.step_away(*t, s))
                .collect())
        }
    }

}
