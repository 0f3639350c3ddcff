//! `ILLTRAP` syscall stub table: a minimal classification of the trap
//! numbers a test program can raise, sufficient to drive the fork and
//! exit scenarios spec §8 names without modeling a real kernel. Trap
//! numbers follow spec §6's table.

/// A recognized `ILLTRAP` syscall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    /// Terminates the calling processor's fetch (no further instructions
    /// retire).
    Exit,
    /// Spawns a new processor core sharing the same program image,
    /// starting at the instruction after the fork point.
    Fork,
    /// Unrecognized trap number — treated as a no-op stub that merely
    /// counts toward statistics.
    Unknown(u32),
}

/// Maps an `ILLTRAP` trap number to its syscall classification: `0` is
/// `exit`, `13` is `fork` (spec §6's trap-number table); everything else
/// is an unclassified stub.
#[must_use]
pub const fn classify(trap_num: u32) -> Syscall {
    match trap_num {
        0 => Syscall::Exit,
        13 => Syscall::Fork,
        other => Syscall::Unknown(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_trap_numbers() {
        assert_eq!(classify(0), Syscall::Exit);
        assert_eq!(classify(13), Syscall::Fork);
        assert_eq!(classify(42), Syscall::Unknown(42));
    }
}
