//! Tag-to-instance lookup (spec §3): a bounded, tag-ordered structure used
//! to find an in-flight instance by tag in O(log n) and to walk it from
//! either end for flush operations.

use crate::containers::circq::CircQ;
use crate::containers::pool::Handle;
use crate::core::instance::{Instance, Tag};

/// One record in the tag-to-instance lookup.
#[derive(Clone, Copy, Debug)]
pub struct TagRecord {
    /// Tag of the instance this record identifies.
    pub tag: Tag,
    /// Handle into the instance arena.
    pub handle: Handle<Instance>,
}

/// Bounded tag-ordered lookup structure (spec §3 "Tag-to-Instance Lookup").
///
/// Invariant: tags monotonically increase from head to tail.
#[derive(Debug)]
pub struct TagMap {
    q: CircQ<TagRecord>,
}

impl TagMap {
    /// Creates a tag map bounded to `capacity` in-flight instances.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            q: CircQ::new(capacity),
        }
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// True if no instances are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Inserts a new record at the tail (tags must be strictly increasing).
    pub fn insert(&mut self, tag: Tag, handle: Handle<Instance>) -> Result<(), ()> {
        self.q.push_back(TagRecord { tag, handle }).map_err(|_| ())
    }

    /// Peeks the oldest (head) record.
    #[must_use]
    pub fn peek_head(&self) -> Option<&TagRecord> {
        self.q.peek_front()
    }

    /// Peeks the youngest (tail) record.
    #[must_use]
    pub fn peek_tail(&self) -> Option<&TagRecord> {
        self.q.peek_back()
    }

    /// Peeks the record at logical index `i` from the head.
    #[must_use]
    pub fn peek_index(&self, i: usize) -> Option<&TagRecord> {
        self.q.get(i)
    }

    /// Binary search for `tag`, since tags are strictly increasing head to
    /// tail. Returns the matching record, if present.
    #[must_use]
    pub fn find(&self, tag: Tag) -> Option<&TagRecord> {
        let mut lo = 0usize;
        let mut hi = self.q.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let rec = self.q.get(mid)?;
            match rec.tag.cmp(&tag) {
                std::cmp::Ordering::Equal => return self.q.get(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    /// Pops the head record (retirement).
    pub fn pop_head(&mut self) -> Option<TagRecord> {
        self.q.pop_front()
    }

    /// Pops the tail record (flush).
    pub fn pop_tail(&mut self) -> Option<TagRecord> {
        self.q.pop_back()
    }

    /// Removes every record younger than `tag` (exclusive), returning them
    /// oldest-to-youngest, for misprediction/exception flush.
    pub fn flush_after(&mut self, tag: Tag) -> Vec<TagRecord> {
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        while let Some(rec) = self.q.pop_back() {
            if rec.tag > tag {
                removed.push(rec);
            } else {
                kept.push(rec);
            }
        }
        kept.reverse();
        for rec in kept {
            let _ = self.q.push_back(rec);
        }
        removed.reverse();
        removed
    }

    /// Deletes the record matching `tag`, wherever it sits (used when an
    /// instance is removed out of strict head/tail order, e.g. a killed
    /// limbo load). Returns it if found.
    pub fn delete(&mut self, tag: Tag) -> Option<TagRecord> {
        let mut found = None;
        let mut kept = Vec::new();
        while let Some(rec) = self.q.pop_front() {
            if rec.tag == tag {
                found = Some(rec);
            } else {
                kept.push(rec);
            }
        }
        for rec in kept {
            let _ = self.q.push_back(rec);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::pool::Pool;

    #[test]
    fn binary_search_finds_middle_tag() {
        let mut pool: Pool<Instance> = Pool::new();
        let mut map = TagMap::new(8);
        for t in 1..=5u64 {
            let code = crate::isa::StaticInstruction::simple(
                crate::isa::Opcode::Nop,
                None,
                None,
                None,
            );
            let h = pool.insert(Instance::new(Tag(t), 0, 4, code));
            map.insert(Tag(t), h).expect("room");
        }
        let rec = map.find(Tag(3)).expect("present");
        assert_eq!(rec.tag, Tag(3));
        assert!(map.find(Tag(99)).is_none());
    }

    #[test]
    fn flush_after_keeps_older_tags_in_order() {
        let mut pool: Pool<Instance> = Pool::new();
        let mut map = TagMap::new(8);
        for t in 1..=4u64 {
            let code = crate::isa::StaticInstruction::simple(
                crate::isa::Opcode::Nop,
                None,
                None,
                None,
            );
            let h = pool.insert(Instance::new(Tag(t), 0, 4, code));
            map.insert(Tag(t), h).expect("room");
        }
        let removed = map.flush_after(Tag(2));
        assert_eq!(removed.len(), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.peek_tail().expect("tail").tag, Tag(2));
    }
}
