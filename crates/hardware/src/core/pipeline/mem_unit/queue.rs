//! Ordered memory-instance queue, grounded on the original machine's `MemQ`
//! linked list: program-order-preserving, with lookup/remove-by-tag and
//! prev/next walks for disambiguation (spec §3 "Load/Store Queue",
//! "Unified Memory Queue").

use std::collections::VecDeque;

use crate::core::instance::Tag;

/// Program-order queue of memory-instance tags. Unlike the active list or
/// tag map, entries can be removed out of order (a load killed by
/// disambiguation, a store that globally performs while younger loads
/// remain), so this is a plain order-preserving deque rather than a ring
/// buffer with head/tail-only mutation.
#[derive(Debug, Default)]
pub struct MemQ {
    items: VecDeque<Tag>,
}

impl MemQ {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no instances are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a tag in program order (it must be younger than every
    /// existing entry).
    pub fn insert(&mut self, tag: Tag) {
        self.items.push_back(tag);
    }

    /// True if `tag` is present.
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.items.contains(&tag)
    }

    /// Removes `tag` wherever it sits. Returns whether it was present.
    pub fn remove(&mut self, tag: Tag) -> bool {
        if let Some(idx) = self.items.iter().position(|&t| t == tag) {
            let _ = self.items.remove(idx);
            true
        } else {
            false
        }
    }

    /// Returns the tag immediately older than `tag` in program order, if any.
    #[must_use]
    pub fn prev_of(&self, tag: Tag) -> Option<Tag> {
        let idx = self.items.iter().position(|&t| t == tag)?;
        idx.checked_sub(1).and_then(|i| self.items.get(i).copied())
    }

    /// Returns the tag immediately younger than `tag` in program order, if any.
    #[must_use]
    pub fn next_of(&self, tag: Tag) -> Option<Tag> {
        let idx = self.items.iter().position(|&t| t == tag)?;
        self.items.get(idx + 1).copied()
    }

    /// Oldest (head) entry.
    #[must_use]
    pub fn head(&self) -> Option<Tag> {
        self.items.front().copied()
    }

    /// Youngest (tail) entry.
    #[must_use]
    pub fn tail(&self) -> Option<Tag> {
        self.items.back().copied()
    }

    /// Removes the youngest entry.
    pub fn remove_tail(&mut self) -> Option<Tag> {
        self.items.pop_back()
    }

    /// Iterates oldest to youngest.
    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.items.iter().copied()
    }

    /// Every entry older than `tag` (program order, oldest first).
    pub fn older_than(&self, tag: Tag) -> impl Iterator<Item = Tag> + '_ {
        self.items.iter().copied().take_while(move |&t| t < tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prev_next_walk_program_order() {
        let mut q = MemQ::new();
        for t in [1, 2, 3, 4] {
            q.insert(Tag(t));
        }
        assert_eq!(q.prev_of(Tag(3)), Some(Tag(2)));
        assert_eq!(q.next_of(Tag(3)), Some(Tag(4)));
        assert_eq!(q.prev_of(Tag(1)), None);
        assert_eq!(q.next_of(Tag(4)), None);
    }

    #[test]
    fn remove_out_of_order_preserves_neighbors() {
        let mut q = MemQ::new();
        for t in [1, 2, 3] {
            q.insert(Tag(t));
        }
        assert!(q.remove(Tag(2)));
        assert_eq!(q.prev_of(Tag(3)), Some(Tag(1)));
    }
}
