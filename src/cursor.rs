//! Position within the user step table.

use crate::steps::UserStepTable;

#[derive(Debug, Clone)]
pub struct UserStepCursor {
    table: UserStepTable,
    /// `None` until the cursor has been placed.
    index: Option<usize>,
}

impl UserStepCursor {
    pub fn new(table: UserStepTable) -> Self {
        Self { table, index: None }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn percent(&self) -> Option<f64> {
        self.index.and_then(|idx| self.table.get(idx))
    }

    /// Select the step closest to `percent`.
    pub fn snap_to_nearest(&mut self, percent: f64) {
        self.index = Some(self.table.nearest_index(percent));
    }

    /// Move one step up. Returns `false` at the top or when unplaced.
    pub fn increase(&mut self) -> bool {
        match self.index {
            Some(idx) if idx + 1 < self.table.len() => {
                self.index = Some(idx + 1);
                true
            }
            _ => false,
        }
    }

    /// Move one step down. The bottom 0% step is only selectable when
    /// `allow_off` is set.
    pub fn decrease(&mut self, allow_off: bool) -> bool {
        let Some(idx) = self.index else {
            return false;
        };
        if idx == 0 {
            return false;
        }
        let is_off = self.table.get(idx - 1).is_some_and(|p| p <= 0.0);
        if is_off && !allow_off {
            return false;
        }
        self.index = Some(idx - 1);
        true
    }
}
