use std::collections::BTreeMap;

/// Releases items strictly in index order.
///
/// Items arriving early are held until all their predecessors have been pushed.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Add the item at `index` and return every item that is now in order.
    ///
    /// Indexes already released or already pending are ignored.
    pub fn push(&mut self, index: usize, item: T) -> Vec<T> {
        if index < self.next || self.pending.contains_key(&index) {
            return Vec::new();
        }
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Number of items released so far.
    pub fn released(&self) -> usize {
        self.next
    }

    /// Number of items waiting for a predecessor.
    pub fn held(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
