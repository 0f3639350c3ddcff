//! Generic scheduling containers (spec §9 design notes): circular queues,
//! (cycle, tag)-ordered heaps, and an arena/object pool with generation
//! tags so a flushed-then-recycled slot is detected instead of silently
//! reused by a stale reference.

pub mod circq;
pub mod heap;
pub mod pool;
