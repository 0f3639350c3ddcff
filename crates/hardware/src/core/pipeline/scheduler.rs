//! Scheduling auxiliary structures (spec §3 "Scheduling Aux Structures"):
//! the min-heaps that stage unit-availability and completion events, and the
//! per-unit-kind ready queues instructions wait in before issue.

use crate::containers::circq::CircQ;
use crate::containers::heap::{CycleHeap, Scheduled};
use crate::core::instance::{MissType, Tag};

/// Functional-unit kind an instance issues to (spec §4.1/§6 "per-unit-kind
/// counts/latencies").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Integer ALU.
    Alu,
    /// Floating-point unit.
    Fpu,
    /// Address-generation unit.
    Addr,
    /// Branch/control unit.
    Bru,
    /// Memory unit (load/store/RMW/prefetch issue port).
    Mem,
}

/// A unit instance (e.g. "ALU #2") becomes free again at `cycle`, having
/// finished its minimum repeat-rate hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitFreeEvent {
    /// Cycle the unit becomes available.
    pub cycle: u64,
    /// Which physical unit (index within its kind's pool) frees up.
    pub unit_index: u32,
}

impl Scheduled for UnitFreeEvent {
    fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// An instance currently executing completes at `cycle` (spec §3 "Running").
/// Ordered `(cycle, tag)` so same-cycle completions drain oldest-first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompletionEvent {
    /// Cycle the instance's result becomes available.
    pub cycle: u64,
    /// Tag of the completing instance.
    pub tag: Tag,
}

impl Scheduled for CompletionEvent {
    fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// A memory instance's completion, carrying the miss classification the
/// cache port returned (spec §3 "`MemDoneHeap`").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemCompletionEvent {
    /// Cycle the memory instance completes.
    pub cycle: u64,
    /// Tag of the completing instance.
    pub tag: Tag,
    /// Cache-port miss classification.
    pub miss: MissType,
}

impl PartialOrd for MemCompletionEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for MemCompletionEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.cycle, self.tag).cmp(&(other.cycle, other.tag))
    }
}

impl Scheduled for MemCompletionEvent {
    fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// Number of [`UnitKind`] variants; keeps [`ReadyQueues`]'s backing array
/// sized without a fallible lookup into it.
const UNIT_KIND_COUNT: usize = 5;

const fn kind_index(k: UnitKind) -> usize {
    match k {
        UnitKind::Alu => 0,
        UnitKind::Fpu => 1,
        UnitKind::Addr => 2,
        UnitKind::Bru => 3,
        UnitKind::Mem => 4,
    }
}

/// Tag-ordered FIFO of instances ready to issue to a given unit kind, one
/// per [`UnitKind`] (spec §3 "`ReadyQueues[K]`").
#[derive(Debug)]
pub struct ReadyQueues {
    queues: [CircQ<Tag>; UNIT_KIND_COUNT],
}

impl ReadyQueues {
    /// Creates ready queues for every unit kind, each bounded to `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: std::array::from_fn(|_| CircQ::new(capacity)),
        }
    }

    /// Enqueues `tag` as ready to issue to unit kind `k`.
    pub fn push(&mut self, k: UnitKind, tag: Tag) -> Result<(), Tag> {
        self.queues[kind_index(k)].push_back(tag)
    }

    /// Pops the oldest ready instance for unit kind `k`.
    pub fn pop(&mut self, k: UnitKind) -> Option<Tag> {
        self.queues[kind_index(k)].pop_front()
    }

    /// Peeks the oldest ready instance for unit kind `k` without removing
    /// it — used to gate issue on a condition (membar, `store_ready`)
    /// before the entry is actually popped.
    #[must_use]
    pub fn peek(&self, k: UnitKind) -> Option<Tag> {
        self.queues[kind_index(k)].peek_front().copied()
    }

    /// Number of instances waiting for unit kind `k`.
    #[must_use]
    pub fn len(&self, k: UnitKind) -> usize {
        self.queues[kind_index(k)].len()
    }
}

/// The four scheduling heaps a processor core maintains (spec §3).
#[derive(Debug, Default)]
pub struct SchedulingAux {
    /// Units that will free up on a future cycle.
    pub freeing_units: CycleHeap<UnitFreeEvent>,
    /// Instances currently executing, ordered by completion cycle.
    pub running: CycleHeap<CompletionEvent>,
    /// Non-memory instances scheduled to complete.
    pub done_heap: CycleHeap<CompletionEvent>,
    /// Memory instances scheduled to complete.
    pub mem_done_heap: CycleHeap<MemCompletionEvent>,
}

impl SchedulingAux {
    /// Creates empty scheduling structures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_queue_is_fifo_per_kind() {
        let mut rq = ReadyQueues::new(4);
        rq.push(UnitKind::Alu, Tag(1)).expect("room");
        rq.push(UnitKind::Alu, Tag(2)).expect("room");
        rq.push(UnitKind::Mem, Tag(3)).expect("room");

        assert_eq!(rq.pop(UnitKind::Alu), Some(Tag(1)));
        assert_eq!(rq.pop(UnitKind::Mem), Some(Tag(3)));
        assert_eq!(rq.pop(UnitKind::Alu), Some(Tag(2)));
        assert_eq!(rq.pop(UnitKind::Alu), None);
    }

    #[test]
    fn done_heap_drains_in_cycle_tag_order() {
        let mut aux = SchedulingAux::new();
        aux.done_heap.push(CompletionEvent { cycle: 3, tag: Tag(9) });
        aux.done_heap.push(CompletionEvent { cycle: 3, tag: Tag(2) });
        aux.done_heap.push(CompletionEvent { cycle: 5, tag: Tag(1) });

        let due = aux.done_heap.drain_due(3);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].tag, Tag(2));
        assert_eq!(due[1].tag, Tag(9));
    }
}
