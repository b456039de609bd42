use std::collections::BTreeSet;

/// Which images of the live batch the operator has picked.
///
/// This is the authoritative model; the grid only mirrors it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    len: usize,
    chosen: BTreeSet<usize>,
}

impl SelectionState {
    /// Empty selection over a batch of `len` images.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            chosen: BTreeSet::new(),
        }
    }

    /// Clear and resize for a new batch.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.chosen.clear();
    }

    /// Flip membership of `index`. Out-of-range indices are ignored.
    pub fn toggle(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        if !self.chosen.remove(&index) {
            self.chosen.insert(index);
        }
        true
    }

    pub fn clear(&mut self) {
        self.chosen.clear();
    }

    pub fn contains(&self, index: usize) -> bool {
        self.chosen.contains(&index)
    }

    pub fn count(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    /// Selected indices in ascending order, or `None` when nothing is selected.
    ///
    /// An empty confirmation is impossible; the only ways to resolve a batch
    /// with no images are cancel and timeout.
    pub fn confirmable(&self) -> Option<Vec<usize>> {
        if self.chosen.is_empty() {
            None
        } else {
            Some(self.chosen.iter().copied().collect())
        }
    }
}
