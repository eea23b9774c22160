//! Transactional scratch buffers.
//!
//! A [`ScratchArena`] owns a work copy of a [`ColumnSet`]. An op runs against
//! the work copy and the two are swapped only when the op succeeds; on
//! failure the live set is exactly what it was before the call.

use crate::backend::ComputeError;
use crate::columns::ColumnSet;

/// Reusable work buffer for all-or-nothing batch ops.
#[derive(Debug, Default)]
pub struct ScratchArena {
    work: ColumnSet,
    commits: u64,
    rollbacks: u64,
}

impl ScratchArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` on a copy of `live`. Commit the copy into `live` on `Ok`,
    /// discard it on `Err`.
    pub fn transact<F>(&mut self, live: &mut ColumnSet, op: F) -> Result<(), ComputeError>
    where
        F: FnOnce(&mut ColumnSet) -> Result<(), ComputeError>,
    {
        self.work.copy_from(live);
        match op(&mut self.work) {
            Ok(()) => {
                std::mem::swap(live, &mut self.work);
                self.commits = self.commits.saturating_add(1);
                Ok(())
            }
            Err(err) => {
                self.rollbacks = self.rollbacks.saturating_add(1);
                Err(err)
            }
        }
    }

    /// Number of committed transactions.
    pub const fn commits(&self) -> u64 {
        self.commits
    }

    /// Number of rolled-back transactions.
    pub const fn rollbacks(&self) -> u64 {
        self.rollbacks
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::EntityId;

    use super::*;

    fn one_row(value: f32) -> ColumnSet {
        let mut set = ColumnSet::with_columns(1);
        set.ids_mut().push(EntityId::new());
        if let Some(c) = set.column_mut(0) {
            c.push(value);
        }
        set
    }

    #[test]
    fn commit_replaces_live() {
        let mut arena = ScratchArena::new();
        let mut live = one_row(10.0);
        let result = arena.transact(&mut live, |work| {
            if let Some(c) = work.column_mut(0) {
                c.iter_mut().for_each(|v| *v = 42.0);
            }
            Ok(())
        });
        assert!(result.is_ok());
        assert!((live.value(0, 0).unwrap_or(0.0) - 42.0).abs() < f32::EPSILON);
        assert_eq!(arena.commits(), 1);
    }

    #[test]
    fn failure_midway_leaves_live_untouched() {
        let mut arena = ScratchArena::new();
        let mut live = one_row(10.0);
        let before = live.clone();
        let result = arena.transact(&mut live, |work| {
            if let Some(c) = work.column_mut(0) {
                c.iter_mut().for_each(|v| *v = -1.0);
            }
            Err(ComputeError::Backend {
                backend: "test",
                op: "decay",
                reason: "device lost".to_owned(),
            })
        });
        assert!(result.is_err());
        assert_eq!(live, before);
        assert_eq!(arena.rollbacks(), 1);
    }
}
