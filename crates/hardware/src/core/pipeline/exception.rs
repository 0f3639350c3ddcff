//! Precise-exception drain state machine (spec §4.5; grounded on the
//! original machine's `PreExceptionHandler`/`ExceptionHandler` flow).
//!
//! Hard exceptions must wait for every older store to at least issue
//! (`ReadyUnissuedStores == 0`) before the drain starts, since a hard
//! exception can alter address translation and so needs every preceding
//! memory effect already underway. Soft exceptions (`SoftLimbo`,
//! `SoftSlCohe`, `SoftSlRepl`) never wait — they're raised after the
//! instruction has already completed, as a later disambiguation verdict.

use crate::common::error::ExceptionKind;
use crate::core::instance::Tag;

/// Drain progress for the one exception a processor can be servicing at a
/// time (only one exception drains at once — the active list retires in
/// order, so an older exception is always discovered first).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionState {
    /// No exception in flight.
    Idle,
    /// Raised at `tag`/`kind`, waiting for `ReadyUnissuedStores == 0`
    /// before the drain may begin (hard exceptions only).
    WaitingForDrain {
        /// Tag of the excepting instruction.
        tag: Tag,
        /// The exception it raised.
        kind: ExceptionKind,
    },
    /// Actively flushing everything younger than `tag` (inclusive of the
    /// excepting instruction, i.e. flush boundary is `tag - 1`), paced at
    /// `NO_OF_EXCEPT_FLUSHES_PER_CYCLE` active-list pairs per cycle.
    Draining {
        /// Tag of the excepting instruction.
        tag: Tag,
        /// The exception it raised.
        kind: ExceptionKind,
    },
}

/// Drives the precise-exception state machine for one processor.
#[derive(Debug)]
pub struct ExceptionUnit {
    state: ExceptionState,
    /// `NO_OF_EXCEPT_FLUSHES_PER_CYCLE`: bounds how many active-list pairs
    /// the drain removes per cycle, so a huge in-flight window doesn't
    /// retire/flush for free in a single cycle.
    flushes_per_cycle: usize,
}

impl ExceptionUnit {
    /// Creates an exception unit with the given per-cycle flush pacing.
    #[must_use]
    pub fn new(flushes_per_cycle: usize) -> Self {
        Self {
            state: ExceptionState::Idle,
            flushes_per_cycle,
        }
    }

    /// Current drain state.
    #[must_use]
    pub const fn state(&self) -> ExceptionState {
        self.state
    }

    /// True if an exception is already being serviced (callers must not
    /// raise a second one until this drains — the active list only ever
    /// exposes its oldest unretired exception).
    #[must_use]
    pub fn busy(&self) -> bool {
        self.state != ExceptionState::Idle
    }

    /// Raises an exception discovered at the active-list head. Soft
    /// exceptions begin draining immediately; hard exceptions wait for
    /// `ready_unissued_stores == 0`.
    pub fn raise(&mut self, tag: Tag, kind: ExceptionKind, ready_unissued_stores: usize) {
        debug_assert!(!self.busy(), "only one exception drains at a time");
        if kind.is_soft() || ready_unissued_stores == 0 {
            self.state = ExceptionState::Draining { tag, kind };
        } else {
            self.state = ExceptionState::WaitingForDrain { tag, kind };
        }
    }

    /// Called once per cycle while [`ExceptionState::WaitingForDrain`] to
    /// check whether the pre-drain condition has now been met.
    pub fn poll_waiting(&mut self, ready_unissued_stores: usize) {
        if let ExceptionState::WaitingForDrain { tag, kind } = self.state {
            if ready_unissued_stores == 0 {
                self.state = ExceptionState::Draining { tag, kind };
            }
        }
    }

    /// The tag boundary the drain flushes everything strictly younger
    /// than: `tag - 1`, since the excepting instruction itself is also
    /// discarded (spec §4.5: "`tag = tag - 1` to also kill the excepting
    /// instruction").
    #[must_use]
    pub fn flush_boundary(&self) -> Option<Tag> {
        match self.state {
            ExceptionState::Draining { tag, .. } => Some(Tag(tag.0.saturating_sub(1))),
            _ => None,
        }
    }

    /// How many active-list pairs the drain may remove this cycle.
    #[must_use]
    pub const fn flushes_per_cycle(&self) -> usize {
        self.flushes_per_cycle
    }

    /// Marks the drain complete: the active list, memory unit, shadow
    /// stack, and stall queues have all been flushed back to the boundary.
    /// Returns the exception kind that was serviced, for trap dispatch.
    pub fn finish(&mut self) -> Option<ExceptionKind> {
        match self.state {
            ExceptionState::Draining { kind, .. } => {
                self.state = ExceptionState::Idle;
                Some(kind)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_exception_drains_immediately() {
        let mut unit = ExceptionUnit::new(4);
        unit.raise(Tag(10), ExceptionKind::SoftLimbo, 3);
        assert_eq!(unit.flush_boundary(), Some(Tag(9)));
    }

    #[test]
    fn hard_exception_waits_for_stores_to_issue() {
        let mut unit = ExceptionUnit::new(4);
        unit.raise(Tag(10), ExceptionKind::Segv, 2);
        assert_eq!(unit.flush_boundary(), None);
        unit.poll_waiting(1);
        assert_eq!(unit.flush_boundary(), None);
        unit.poll_waiting(0);
        assert_eq!(unit.flush_boundary(), Some(Tag(9)));
    }

    #[test]
    fn finish_returns_to_idle() {
        let mut unit = ExceptionUnit::new(4);
        unit.raise(Tag(5), ExceptionKind::BusErr, 0);
        assert_eq!(unit.finish(), Some(ExceptionKind::BusErr));
        assert!(!unit.busy());
    }
}
