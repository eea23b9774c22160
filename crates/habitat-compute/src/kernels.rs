//! Reference CPU kernels.
//!
//! Every kernel works on need-like values and clamps its results into
//! `[0, 100]`. Shapes are validated up front, before any value is written,
//! so an `Err` always means the input was left untouched.
//!
//! The row kernels (`*_row`) are the same arithmetic applied to one record;
//! the per-entity engine paths use them so the batch and per-entity paths
//! cannot drift apart.

use habitat_types::{Position, clamp_need};

use crate::backend::ComputeError;

/// A threshold-triggered penalty from one column onto another.
///
/// When the `source` value is below `below`, the `target` value loses
/// `penalty_per_unit * delta`. Rules apply in slice order, each seeing the
/// results of the rules before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossEffectRule {
    /// Column whose value triggers the penalty.
    pub source: usize,
    /// Trigger threshold (strictly below).
    pub below: f32,
    /// Column that takes the penalty.
    pub target: usize,
    /// Penalty per unit of delta (per second for needs).
    pub penalty_per_unit: f32,
}

/// The reference CPU implementation of every batch op.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernels;

impl CpuKernels {
    /// `v = clamp(v - rate[col] * age[row] * modifier[row] * delta)` for every
    /// cell.
    pub fn decay(
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
            for ((value, &age), &modifier) in column
                .iter_mut()
                .zip(age_multipliers)
                .zip(modifier_multipliers)
            {
                *value = clamp_need(rate.mul_add(-(age * modifier * delta), *value));
            }
        }
        Ok(())
    }

    /// Decay applied to one record's values.
    pub fn decay_row(values: &mut [f32], rates: &[f32], age: f32, modifier: f32, delta: f32) {
        for (value, &rate) in values.iter_mut().zip(rates) {
            *value = clamp_need(rate.mul_add(-(age * modifier * delta), *value));
        }
    }

    /// `v = clamp(v + delta[row])` for every row of one column.
    pub fn column_delta(column: &mut [f32], deltas: &[f32]) -> Result<(), ComputeError> {
        check_len("column_delta", column.len(), deltas.len())?;
        for (value, &delta) in column.iter_mut().zip(deltas) {
            *value = clamp_need(*value + delta);
        }
        Ok(())
    }

    /// Apply every cross-effect rule to every row.
    pub fn cross_effects(
        columns: &mut [Vec<f32>],
        rules: &[CrossEffectRule],
        delta: f32,
    ) -> Result<(), ComputeError> {
        validate_rectangular("cross_effects", columns)?;
        validate_rules("cross_effects", columns.len(), rules)?;

        for rule in rules {
            let penalty = rule.penalty_per_unit * delta;
            if rule.source == rule.target {
                if let Some(column) = columns.get_mut(rule.target) {
                    for value in column.iter_mut() {
                        if *value < rule.below {
                            *value = clamp_need(*value - penalty);
                        }
                    }
                }
                continue;
            }
            if let Some((source, target)) = source_and_target(columns, rule.source, rule.target) {
                for (value, &trigger) in target.iter_mut().zip(source) {
                    if trigger < rule.below {
                        *value = clamp_need(*value - penalty);
                    }
                }
            }
        }
        Ok(())
    }

    /// Cross-effects applied to one record's values.
    pub fn cross_effects_row(values: &mut [f32], rules: &[CrossEffectRule], delta: f32) {
        for rule in rules {
            let Some(&trigger) = values.get(rule.source) else {
                continue;
            };
            if trigger >= rule.below {
                continue;
            }
            let penalty = rule.penalty_per_unit * delta;
            if let Some(value) = values.get_mut(rule.target) {
                *value = clamp_need(*value - penalty);
            }
        }
    }

    /// Row-major distance matrix: entry `i * to.len() + j` is the distance
    /// from `from[i]` to `to[j]`.
    pub fn pairwise_distances(from: &[Position], to: &[Position]) -> Vec<f32> {
        let mut out = Vec::with_capacity(from.len().saturating_mul(to.len()));
        for a in from {
            out.extend(to.iter().map(|b| a.distance(*b)));
        }
        out
    }

    /// For each row, the position one `step` directly away from its threat.
    pub fn flee_vectors(
        positions: &[Position],
        threats: &[Position],
        steps: &[f32],
    ) -> Result<Vec<Position>, ComputeError> {
        check_len("flee_vectors", positions.len(), threats.len())?;
        check_len("flee_vectors", positions.len(), steps.len())?;
        Ok(positions
            .iter()
            .zip(threats)
            .zip(steps)
            .map(|((p, t), &s)| p.step_away(*t, s))
            .collect())
    }
}

/// Ensure every column has the same length. Returns that length.
pub(crate) fn validate_rectangular(op: &'static str, columns: &[Vec<f32>]) -> Result<usize, ComputeError> {
    let rows = columns.first().map_or(0, Vec::len);
    for column in columns {
        check_len(op, rows, column.len())?;
    }
    Ok(rows)
}

/// Ensure every rule references an existing column.
pub(crate) fn validate_rules(
    op: &'static str,
    column_count: usize,
    rules: &[CrossEffectRule],
) -> Result<(), ComputeError> {
    for rule in rules {
        for column in [rule.source, rule.target] {
            if column >= column_count {
                return Err(ComputeError::ColumnOutOfRange {
                    op,
                    column,
                    column_count,
                });
            }
        }
    }
    Ok(())
}

/// Return a `ShapeMismatch` when `actual != expected`.
pub(crate) const fn check_len(op: &'static str, expected: usize, actual: usize) -> Result<(), ComputeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ComputeError::ShapeMismatch {
            op,
            expected,
            actual,
        })
    }
}

/// Borrow a source column immutably and a distinct target column mutably.
pub(crate) fn source_and_target(
    columns: &mut [Vec<f32>],
    source: usize,
    target: usize,
) -> Option<(&[f32], &mut [f32])> {
    if source >= columns.len() || target >= columns.len() {
        return None;
    }
    if source < target {
        let (left, right) = columns.split_at_mut(target);
        Some((left.get(source)?.as_slice(), right.first_mut()?.as_mut_slice()))
    } else if source > target {
        let (left, right) = columns.split_at_mut(source);
        Some((right.first()?.as_slice(), left.get_mut(target)?.as_mut_slice()))
    } else {
        None
    }
}
