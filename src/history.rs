// Linear undo/redo history
//
// `past` holds snapshots oldest first, `future` holds them next-redo first.
// Recording a new snapshot abandons the redo branch.

use std::collections::VecDeque;

/// Two-stack undo/redo history over immutable snapshots
#[derive(Clone, Debug)]
pub struct HistoryStack<T> {
    past: Vec<T>,
    future: VecDeque<T>,
}

impl<T> HistoryStack<T> {
    pub fn new() -> Self {
        Self {
            past: Vec::new(),
            future: VecDeque::new(),
        }
    }

    /// Push the pre-edit state and clear the redo branch
    pub fn record(&mut self, snapshot: T) {
        self.past.push(snapshot);
        self.future.clear();
    }

    /// Step back one entry.
    ///
    /// `current` becomes the next redo target. Returns `None` (and drops
    /// nothing) when there is no past.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop()?;
        self.future.push_front(current);
        Some(previous)
    }

    /// Step forward one entry, the mirror of [`undo`](Self::undo)
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop_front()?;
        self.past.push(current);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}

impl<T> Default for HistoryStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
