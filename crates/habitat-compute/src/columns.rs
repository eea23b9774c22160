//! Structure-of-arrays buffers keyed by entity ID.

use habitat_types::EntityId;

/// A set of equally long `f32` columns plus the ID of each row.
///
/// Row `i` of every column belongs to `ids[i]`. Callers that mutate the
/// columns directly must keep every column the same length as `ids`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSet {
    ids: Vec<EntityId>,
    columns: Vec<Vec<f32>>,
}

impl ColumnSet {
    /// Create an empty set with `column_count` columns.
    pub fn with_columns(column_count: usize) -> Self {
        Self {
            ids: Vec::new(),
            columns: vec![Vec::new(); column_count],
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row IDs in row order.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Mutable access to the row IDs, for relayout.
    pub const fn ids_mut(&mut self) -> &mut Vec<EntityId> {
        &mut self.ids
    }

    /// One column, if it exists.
    pub fn column(&self, index: usize) -> Option<&[f32]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// One column, mutably.
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Vec<f32>> {
        self.columns.get_mut(index)
    }

    /// Every column.
    pub fn columns(&self) -> &[Vec<f32>] {
        &self.columns
    }

    /// Every column, mutably.
    pub fn columns_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.columns
    }

    /// IDs and columns borrowed together, for stores that fill both.
    pub fn parts_mut(&mut self) -> (&mut Vec<EntityId>, &mut [Vec<f32>]) {
        (&mut self.ids, &mut self.columns)
    }

    /// Value at `(row, column)`.
    pub fn value(&self, row: usize, column: usize) -> Option<f32> {
        self.columns.get(column).and_then(|c| c.get(row)).copied()
    }

    /// Drop every row, keeping allocations and the column count.
    pub fn clear(&mut self) {
        self.ids.clear();
        for column in &mut self.columns {
            column.clear();
        }
    }

    /// Overwrite this set with the contents of `other`, reusing existing
    /// allocations where possible.
    pub fn copy_from(&mut self, other: &Self) {
        self.ids.clone_from(&other.ids);
        self.columns.resize_with(other.columns.len(), Vec::new);
        for (dst, src) in self.columns.iter_mut().zip(&other.columns) {
            dst.clone_from(src);
        }
    }

    /// Whether every column is as long as the ID list.
    pub fn is_consistent(&self) -> bool {
        self.columns.iter().all(|c| c.len() == self.ids.len())
    }
}
