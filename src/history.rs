//! # Undo / Redo
//!
//! Linear history of full snapshots of the fields and groups. A snapshot is
//! taken after every committed edit (never mid-drag). The bottom entry is the
//! initial state and is never undone past.
//!
//! Snapshots hold page-unit records, so an undo after a zoom change restores
//! the right geometry at the current zoom.

use crate::config::{FieldRecord, GroupRecord};
use crate::model::Template;

/// Snapshots kept on the undo stack.
pub const HISTORY_CAPACITY: usize = 50;

/// The fields and groups of a template at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub fields: Vec<FieldRecord>,
    pub groups: Vec<GroupRecord>,
}

impl Snapshot {
    pub fn capture(template: &Template) -> Self {
        let scale = template.scale;
        Self {
            fields: template
                .fields
                .values()
                .map(|f| FieldRecord::from_field(f, scale))
                .collect(),
            groups: template
                .groups
                .values()
                .map(|g| GroupRecord::from_group(g, scale))
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a new state. Drops the oldest entry past capacity and clears
    /// the redo buffer.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.undo.push(snapshot);
        if self.undo.len() > self.capacity {
            let excess = self.undo.len() - self.capacity;
            self.undo.drain(..excess);
        }
        self.redo.clear();
    }

    /// Forget everything and start from `base`.
    pub fn reset(&mut self, base: Snapshot) {
        self.undo.clear();
        self.redo.clear();
        self.undo.push(base);
    }

    /// Step back. Returns the state to restore, or `None` when only the
    /// base entry is left.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.undo.len() < 2 {
            return None;
        }
        let current = self.undo.pop()?;
        self.redo.push(current);
        self.undo.last()
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push(next);
        self.undo.last()
    }

    pub fn can_undo(&self) -> bool {
        self.undo.len() >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }
}
