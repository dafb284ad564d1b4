//! Circular index shared by the delay history and the far-end spectrum ring.

/// Write cursor over a fixed-size circular array, plus a fill count.
#[derive(Debug, Clone)]
pub(crate) struct RingIndex {
    size: usize,
    write: usize,
    count: usize,
}

impl RingIndex {
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size > 0);
        Self {
            size,
            write: 0,
            count: 0,
        }
    }

    /// Slot the next write goes to.
    pub(crate) fn write(&self) -> usize {
        self.write
    }

    /// Number of slots written since the last clear, at most `size`.
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    fn inc_index(&self, index: usize) -> usize {
        if index < self.size - 1 { index + 1 } else { 0 }
    }

    /// Slot `age` positions behind the most recently written one.
    pub(crate) fn recent(&self, age: usize) -> usize {
        (self.write + self.size - 1 - age % self.size) % self.size
    }

    /// Advances the cursor after a write, saturating the count at `size`.
    pub(crate) fn push(&mut self) {
        self.write = self.inc_index(self.write);
        self.count = (self.count + 1).min(self.size);
    }

    pub(crate) fn fill(&mut self) {
        self.write = 0;
        self.count = self.size;
    }

    pub(crate) fn clear(&mut self) {
        self.write = 0;
        self.count = 0;
    }
}
