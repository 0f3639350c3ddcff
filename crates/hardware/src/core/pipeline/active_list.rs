//! Active list: the in-order retirement ring (spec §3 "Active List Entry",
//! §4.1 "Retirement"). Two entries per instance — one for the destination
//! register, one for the CC/pair-second register — are inserted at rename
//! and removed as a pair at graduation.

use crate::common::error::ExceptionKind;
use crate::common::reg::RegClass;
use crate::containers::circq::CircQ;
use crate::core::instance::Tag;

/// One entry in the active list (spec §3).
#[derive(Clone, Debug)]
pub struct ActiveListElement {
    /// Tag of the owning instance.
    pub tag: Tag,
    /// Old logical register this entry's physical mapping replaced.
    pub old_logical: Option<u8>,
    /// Old physical register, freed when this entry retires.
    pub old_physical: Option<u32>,
    /// Register class this entry tracks.
    pub regclass: RegClass,
    /// Whether the owning half has completed execution.
    pub done: bool,
    /// Cycle on which it completed (used for the retirement lookahead).
    pub cycle_done: u64,
    /// Exception status, if any, carried by this half.
    pub exception: ExceptionKind,
}

/// The in-order active list (spec §3/§4.1).
///
/// Invariant: entries are in tag order; an instance is ready to retire only
/// when both of its entries are done and exception-free (or, for a faulted
/// head, the exception drain takes over instead of normal retirement).
#[derive(Debug)]
pub struct ActiveList {
    q: CircQ<ActiveListElement>,
    max_entries: usize,
}

impl ActiveList {
    /// Creates an active list bounding `max_instances` in-flight instances
    /// (`max_entries = max_instances * 2`, per spec's "bounds in-flight
    /// instances (paired entries × 2)").
    #[must_use]
    pub fn new(max_instances: usize) -> Self {
        let max_entries = max_instances * 2;
        Self {
            q: CircQ::new(max_entries),
            max_entries,
        }
    }

    /// True if there isn't room for another instance's pair of entries.
    #[must_use]
    pub fn full(&self) -> bool {
        self.q.len() + 2 > self.max_entries
    }

    /// Number of in-flight instances (entry pairs).
    #[must_use]
    pub fn num_instances(&self) -> usize {
        self.q.len() / 2
    }

    /// Number of available instruction slots (in instances, not entries).
    #[must_use]
    pub fn num_avail(&self) -> usize {
        (self.max_entries - self.q.len()) / 2
    }

    /// Inserts the destination-register and CC/pair-second entries for a
    /// newly renamed instance. Returns `Err(())` if the list is full.
    pub fn add(
        &mut self,
        dest: ActiveListElement,
        cc_or_pair: ActiveListElement,
    ) -> Result<(), ()> {
        if self.full() {
            return Err(());
        }
        self.q.push_back(dest).map_err(|_| ())?;
        self.q.push_back(cc_or_pair).map_err(|_| ())?;
        Ok(())
    }

    /// Marks both entries for `tag` done, recording the completion cycle
    /// and exception status (spec §4.1).
    pub fn mark_done(&mut self, tag: Tag, exception: ExceptionKind, cycle: u64) {
        for i in 0..self.q.len() {
            if let Some(e) = self.q_get_mut(i) {
                if e.tag == tag {
                    e.done = true;
                    e.cycle_done = cycle;
                    e.exception = exception;
                }
            }
        }
    }

    /// Marks a soft exception onto an already-completed entry (spec §4.3
    /// "disambiguate": `SOFT_LIMBO`/`SOFT_SL_*` arrive after completion).
    pub fn flag_exception(&mut self, tag: Tag, exception: ExceptionKind) {
        for i in 0..self.q.len() {
            if let Some(e) = self.q_get_mut(i) {
                if e.tag == tag {
                    e.exception = exception;
                }
            }
        }
    }

    fn q_get_mut(&mut self, i: usize) -> Option<&mut ActiveListElement> {
        // CircQ doesn't expose get_mut directly; rebuild via retain-style
        // access pattern using an explicit index walk through pop/push would
        // reorder, so we use interior access via a small helper below.
        self.q.get_mut(i)
    }

    /// Peeks the head entry (oldest), if any.
    #[must_use]
    pub fn peek_head(&self) -> Option<&ActiveListElement> {
        self.q.peek_front()
    }

    /// Pops the head pair if both halves are done, exception-free, and
    /// completed at least `lookahead` cycles ago. Returns the freed old
    /// physical registers `(reg_entry, cc_entry)`.
    ///
    /// Returns `None` if the list is empty, the head isn't ready yet, or
    /// the head carries an exception (caller must check
    /// [`ActiveList::head_exception`] first and route to the drain instead).
    pub fn try_retire_head(&mut self, now: u64, lookahead: u64) -> Option<(ActiveListElement, ActiveListElement)> {
        let ready = {
            let a = self.q.get(0)?;
            let b = self.q.get(1)?;
            a.tag == b.tag
                && a.done
                && b.done
                && a.exception == ExceptionKind::Ok
                && b.exception == ExceptionKind::Ok
                && a.cycle_done + lookahead <= now
                && b.cycle_done + lookahead <= now
        };
        if !ready {
            return None;
        }
        let a = self.q.pop_front()?;
        let b = self.q.pop_front()?;
        Some((a, b))
    }

    /// Exception kind carried by the head pair, if the head is present and
    /// either half is not `OK`. Used by graduation to decide whether to
    /// stop retiring and trigger the pre-exception drain (spec §4.1).
    #[must_use]
    pub fn head_exception(&self) -> Option<ExceptionKind> {
        let a = self.q.get(0)?;
        let b = self.q.get(1)?;
        if a.exception != ExceptionKind::Ok {
            Some(a.exception)
        } else if b.exception != ExceptionKind::Ok {
            Some(b.exception)
        } else {
            None
        }
    }

    /// True if the head pair is present but not yet both `done`.
    #[must_use]
    pub fn head_pending(&self) -> bool {
        match (self.q.get(0), self.q.get(1)) {
            (Some(a), Some(b)) => !(a.done && b.done),
            _ => false,
        }
    }

    /// Tags of the oldest up to `max_instances` in-flight instances, head
    /// first — the window `mark_stores_ready` scans to find stores that
    /// have graduated far enough to issue (spec §4.3/§4.4).
    #[must_use]
    pub fn head_instance_tags(&self, max_instances: usize) -> Vec<Tag> {
        let mut tags = Vec::new();
        let mut i = 0;
        while tags.len() < max_instances {
            let Some(e) = self.q.get(i) else {
                break;
            };
            tags.push(e.tag);
            i += 2;
        }
        tags
    }

    /// Removes a bounded number of entries from the *head*, as the
    /// exception drain's `NO_OF_EXCEPT_FLUSHES_PER_CYCLE` pacing requires,
    /// regardless of `done` status. Returns the removed entries.
    pub fn force_drain_head(&mut self, max_pairs: usize) -> Vec<ActiveListElement> {
        let mut out = Vec::new();
        for _ in 0..max_pairs {
            let Some(a) = self.q.pop_front() else {
                break;
            };
            let Some(b) = self.q.pop_front() else {
                out.push(a);
                break;
            };
            out.push(a);
            out.push(b);
        }
        out
    }

    /// True once the head is at or before `boundary`, or the list is empty
    /// — i.e. a drain targeting `boundary` has removed everything it needs
    /// to.
    #[must_use]
    pub fn is_head_within(&self, boundary: Tag) -> bool {
        self.peek_head().is_none_or(|e| e.tag <= boundary)
    }

    /// Tail-flushes every entry younger than `tag` (exclusive), used for
    /// misprediction recovery and precise-exception drain (spec §3/§4.2).
    /// Returns the removed entries (oldest to youngest) so callers can
    /// free their physical registers.
    pub fn flush_after(&mut self, tag: Tag) -> Vec<ActiveListElement> {
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        while let Some(e) = self.q.pop_back() {
            if e.tag > tag {
                removed.push(e);
            } else {
                kept.push(e);
            }
        }
        kept.reverse();
        for e in kept {
            let _ = self.q.push_back(e);
        }
        removed.reverse();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(tag: u64, regclass: RegClass) -> ActiveListElement {
        ActiveListElement {
            tag: Tag(tag),
            old_logical: Some(1),
            old_physical: Some(5),
            regclass,
            done: false,
            cycle_done: 0,
            exception: ExceptionKind::Ok,
        }
    }

    #[test]
    fn retirement_requires_both_halves_done() {
        let mut al = ActiveList::new(4);
        al.add(elem(1, RegClass::Int), elem(1, RegClass::Cc)).expect("room");
        assert!(al.try_retire_head(0, 0).is_none());

        al.mark_done(Tag(1), ExceptionKind::Ok, 0);
        let (a, b) = al.try_retire_head(0, 0).expect("both halves done");
        assert_eq!(a.tag, Tag(1));
        assert_eq!(b.tag, Tag(1));
    }

    #[test]
    fn flush_after_removes_only_younger_tags() {
        let mut al = ActiveList::new(8);
        for t in 1..=3u64 {
            al.add(elem(t, RegClass::Int), elem(t, RegClass::Cc)).expect("room");
        }
        let removed = al.flush_after(Tag(1));
        // instances 2 and 3 flushed => 4 entries removed
        assert_eq!(removed.len(), 4);
        assert_eq!(al.num_instances(), 1);
        assert_eq!(al.peek_head().expect("head").tag, Tag(1));
    }

    #[test]
    fn exception_on_head_blocks_retirement() {
        let mut al = ActiveList::new(4);
        al.add(elem(1, RegClass::Int), elem(1, RegClass::Cc)).expect("room");
        al.mark_done(Tag(1), ExceptionKind::Segv, 0);
        assert_eq!(al.head_exception(), Some(ExceptionKind::Segv));
        assert!(al.try_retire_head(0, 0).is_none());
    }
}
