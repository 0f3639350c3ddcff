//! Free lists, the rename map, and the shadow-mapper stack (spec §3 "Free
//! Lists", "Shadow-Mapper Stack"; spec §4.1/§4.2).

use crate::core::instance::Tag;

/// Efficiency-loss bucket a rename-time resource shortage is classified
/// under (spec §4.1: "classifies the stall by efficiency-loss kind").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EfficiencyLoss {
    /// Integer free list exhausted.
    IntFreeList,
    /// FP free list exhausted.
    FpFreeList,
    /// Active list full.
    ActiveList,
    /// Shadow-mapper stack full.
    ShadowStack,
    /// Memory queue full.
    MemQueue,
    /// Issue queue full.
    IssueQueue,
}

/// Two stacks of physical-register indices (spec §3 "Free Lists").
///
/// Invariant: a physical register is on the free list iff no architectural
/// mapping and no shadow map references it.
#[derive(Debug)]
pub struct FreeList {
    int_free: Vec<u32>,
    fp_free: Vec<u32>,
}

impl FreeList {
    /// Creates free lists pre-populated with `int_count`/`fp_count`
    /// physical registers, reserving index 0 of each class as never-free
    /// (it backs the permanently-mapped `%g0`/unused CC-zero convention).
    #[must_use]
    pub fn new(int_count: u32, fp_count: u32) -> Self {
        Self {
            int_free: (1..int_count).rev().collect(),
            fp_free: (1..fp_count).rev().collect(),
        }
    }

    /// Allocates an integer physical register, or `None` if exhausted.
    pub fn alloc_int(&mut self) -> Option<u32> {
        self.int_free.pop()
    }

    /// Allocates an FP physical register, or `None` if exhausted.
    pub fn alloc_fp(&mut self) -> Option<u32> {
        self.fp_free.pop()
    }

    /// Returns an integer physical register to the free list.
    pub fn free_int(&mut self, reg: u32) {
        if reg != 0 {
            self.int_free.push(reg);
        }
    }

    /// Returns an FP physical register to the free list.
    pub fn free_fp(&mut self, reg: u32) {
        if reg != 0 {
            self.fp_free.push(reg);
        }
    }

    /// Number of free integer physical registers.
    #[must_use]
    pub fn int_avail(&self) -> usize {
        self.int_free.len()
    }

    /// Number of free FP physical registers.
    #[must_use]
    pub fn fp_avail(&self) -> usize {
        self.fp_free.len()
    }
}

/// Logical-to-physical rename map, separately for integer and FP register
/// files, plus a single condition-code mapping (SPARC `%icc`/`%xcc` are not
/// windowed, so they're modeled as one renamed scalar rather than 32 slots).
#[derive(Clone, Debug)]
pub struct RenameMap {
    /// Integer logical register (post-window) -> physical register.
    pub int_map: Vec<u32>,
    /// FP logical register -> physical register.
    pub fp_map: Vec<u32>,
    /// Condition-code -> physical register.
    pub cc_map: u32,
}

impl RenameMap {
    /// Creates an identity-ish rename map where every logical register
    /// starts mapped to its own low physical index (the architectural
    /// register file occupies the bottom of the physical file).
    #[must_use]
    pub fn new(int_regs: u32, fp_regs: u32) -> Self {
        Self {
            int_map: (0..int_regs).collect(),
            fp_map: (0..fp_regs).collect(),
            cc_map: 0,
        }
    }
}

/// A shadow-mapper snapshot taken at a predicted branch (spec §3
/// "Shadow-Mapper Stack").
#[derive(Clone, Debug)]
pub struct ShadowMapEntry {
    /// Tag of the branch (or annulled delay-slot proxy) this snapshot
    /// belongs to.
    pub tag: Tag,
    /// Snapshot of the integer+FP (+CC) rename maps at prediction time.
    pub snapshot: RenameMap,
    /// Whether the branch has resolved.
    pub done: bool,
}

/// Bounded shadow-mapper stack (`BranchQ`), capacity = `MAX_SPEC` (spec §3).
///
/// Invariant: tags strictly increasing.
#[derive(Debug)]
pub struct ShadowStack {
    entries: Vec<ShadowMapEntry>,
    capacity: usize,
}

impl ShadowStack {
    /// Creates a shadow stack with the given `MAX_SPEC` depth.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// True if the stack cannot accept another in-flight prediction.
    #[must_use]
    pub fn full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Number of in-flight predictions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no in-flight predictions are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a new snapshot for `tag`. Fails if the stack is full.
    pub fn push(&mut self, tag: Tag, snapshot: RenameMap) -> Result<(), ()> {
        if self.full() {
            return Err(());
        }
        self.entries.push(ShadowMapEntry {
            tag,
            snapshot,
            done: false,
        });
        Ok(())
    }

    /// Marks the entry for `tag` resolved (used before a good-prediction drop).
    pub fn mark_done(&mut self, tag: Tag) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.tag == tag) {
            e.done = true;
        }
    }

    /// Drops the snapshot for `tag` on a correct prediction (spec §4.2).
    /// Only valid for the oldest in-flight entry (shadow maps resolve in
    /// order since branches retire in order relative to each other).
    pub fn drop_resolved(&mut self, tag: Tag) -> Option<ShadowMapEntry> {
        if self.entries.first().is_some_and(|e| e.tag == tag) {
            Some(self.entries.remove(0))
        } else {
            None
        }
    }

    /// Restores and removes the snapshot for a mispredicted `tag`, along
    /// with every younger snapshot (they're being flushed too). Returns the
    /// restoring snapshot.
    pub fn restore_and_flush(&mut self, tag: Tag) -> Option<RenameMap> {
        let idx = self.entries.iter().position(|e| e.tag == tag)?;
        let restore = self.entries[idx].snapshot.clone();
        self.entries.truncate(idx);
        Some(restore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_list_conservation() {
        let mut fl = FreeList::new(8, 8);
        assert_eq!(fl.int_avail(), 7); // register 0 never allocated
        let r = fl.alloc_int().expect("available");
        assert_eq!(fl.int_avail(), 6);
        fl.free_int(r);
        assert_eq!(fl.int_avail(), 7);
    }

    #[test]
    fn shadow_stack_restores_exact_snapshot() {
        let mut stack = ShadowStack::new(4);
        let mut base = RenameMap::new(8, 8);
        base.int_map[3] = 99;
        stack.push(Tag(1), base.clone()).expect("room");

        let mut mutated = base.clone();
        mutated.int_map[3] = 42;
        stack.push(Tag(2), mutated).expect("room");

        let restored = stack.restore_and_flush(Tag(1)).expect("present");
        assert_eq!(restored.int_map[3], 99);
        assert!(stack.is_empty());
    }
}
