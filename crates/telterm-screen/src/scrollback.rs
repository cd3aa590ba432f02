//! Rows that have scrolled off the top of the screen.

use std::collections::VecDeque;

use crate::cell::Cell;

pub const DEFAULT_SCROLLBACK: usize = 500;

/// Capped history of evicted rows, oldest first.
///
/// Backed by a `VecDeque` so that pushing at the back and evicting at the
/// front are both O(1). A capacity of zero disables history.
#[derive(Debug, Clone)]
pub struct Scrollback {
    lines: VecDeque<Vec<Cell>>,
    capacity: usize,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Appends a row, evicting the oldest one when at capacity.
    pub fn push(&mut self, row: Vec<Cell>) -> Option<Vec<Cell>> {
        if self.capacity == 0 {
            return None;
        }
        let evicted = if self.lines.len() == self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(row);
        evicted
    }

    /// Row by index, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&[Cell]> {
        self.lines.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Cell]> {
        self.lines.iter().map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK)
    }
}
