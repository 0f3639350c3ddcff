//! Cache-port contract: the boundary between the core pipeline and the
//! memory-system timing model (spec §6 "External Interfaces"). The core
//! issues a request and later polls for its completion; it never touches
//! cache state directly.

use crate::core::instance::{MissType, Tag};

/// A single in-flight memory request handed to the cache port.
#[derive(Clone, Copy, Debug)]
pub struct CacheRequest {
    /// Tag of the requesting instance.
    pub tag: Tag,
    /// Effective address.
    pub addr: u32,
    /// Access width in bytes.
    pub width: u8,
    /// True for a store (write-through), false for a load.
    pub is_store: bool,
    /// True for a software-prefetch request (no destination register,
    /// non-blocking, and its completion must not count as a demand miss).
    pub prefetch: bool,
}

/// A completed memory request.
#[derive(Clone, Copy, Debug)]
pub struct CacheCompletion {
    /// Tag of the completed instance.
    pub tag: Tag,
    /// Cycle the completion became visible.
    pub cycle: u64,
    /// Miss classification the memory system assigned.
    pub miss: MissType,
}

/// The core pipeline's view of the memory system: issue a request, poll
/// for whichever requests have completed by `now`. Implementations may
/// model a real cache hierarchy, or — for unit tests — a fixed-latency
/// stub.
pub trait CachePort {
    /// Accepts `req` for servicing. Implementations may reject if they
    /// have no buffering left (`Err(())`), in which case the core must
    /// retry the issue next cycle.
    fn issue(&mut self, req: CacheRequest, now: u64) -> Result<(), ()>;

    /// Drains every request that has completed by cycle `now`.
    fn poll_completions(&mut self, now: u64) -> Vec<CacheCompletion>;
}

/// A fixed-latency cache port for tests and simple configurations: every
/// request completes exactly `latency` cycles after issue, always an L1
/// hit.
#[derive(Debug, Default)]
pub struct FixedLatencyPort {
    latency: u64,
    pending: Vec<CacheCompletion>,
}

impl FixedLatencyPort {
    /// Creates a port where every access completes after `latency` cycles.
    #[must_use]
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            pending: Vec::new(),
        }
    }
}

impl CachePort for FixedLatencyPort {
    fn issue(&mut self, req: CacheRequest, now: u64) -> Result<(), ()> {
        self.pending.push(CacheCompletion {
            tag: req.tag,
            cycle: now + self.latency,
            miss: MissType::L1Hit,
        });
        Ok(())
    }

    fn poll_completions(&mut self, now: u64) -> Vec<CacheCompletion> {
        let (due, rest): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|c| c.cycle <= now);
        self.pending = rest;
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_latency_port_completes_after_delay() {
        let mut port = FixedLatencyPort::new(3);
        port.issue(
            CacheRequest {
                tag: Tag(1),
                addr: 0x1000,
                width: 4,
                is_store: false,
                prefetch: false,
            },
            10,
        )
        .expect("accepted");
        assert!(port.poll_completions(12).is_empty());
        let done = port.poll_completions(13);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].tag, Tag(1));
    }
}
