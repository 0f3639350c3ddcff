//! Exception taxonomy and host-level error types.
//!
//! Two distinct error channels exist, matching spec §7:
//! 1. **`ExceptionKind`** — the in-band mechanism instances carry through the
//!    pipeline (active-list entries, precise drain). Not a Rust `Error`.
//! 2. **`SimError`** — host-visible failures (bad config, malformed program
//!    image, fatal exception escalation) reported via `thiserror`.

use std::fmt;

use crate::core::instance::Tag;

/// Exception kinds an instance can carry, per spec §4.5.
///
/// `OK` is the default "no exception" state; the rest partition into the
/// hard/soft taxonomy spec §7 defines for recovery purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExceptionKind {
    /// No exception.
    #[default]
    Ok,
    /// Division by zero.
    Div0,
    /// Floating-point exception.
    FpErr,
    /// Segmentation fault (may be recoverable if within the stack range).
    Segv,
    /// Bus error: misaligned access.
    BusErr,
    /// Emulated operating-system trap.
    SysTrap,
    /// Register window overflow/underflow.
    WinTrap,
    /// Instruction requiring serialization (MULScc, LDFSR, SAVED/RESTORED, DONE/RETRY, ...).
    Serialize,
    /// Privileged instruction executed outside supervisor mode.
    Privileged,
    /// Illegal instruction encoding.
    Illegal,
    /// Bad PC (control transfer to an invalid address).
    BadPc,
    /// Speculative load violated by a later-disambiguated ambiguous store.
    SoftLimbo,
    /// Speculative load revoked by a coherence snoop.
    SoftSlCohe,
    /// Speculative load revoked by cache-line replacement.
    SoftSlRepl,
}

impl ExceptionKind {
    /// True for the three `SOFT_*` kinds that drain in place (spec §4.5/§7).
    #[must_use]
    pub const fn is_soft(self) -> bool {
        matches!(
            self,
            Self::SoftLimbo | Self::SoftSlCohe | Self::SoftSlRepl
        )
    }

    /// True when this kind is recoverable per spec §7's partition.
    ///
    /// `Segv` is only recoverable when the faulting address falls in the
    /// stack-growth range; that check happens in the exception drain, not
    /// here, so `Segv` itself is conservatively reported as non-fatal and
    /// the drain decides the concrete outcome.
    #[must_use]
    pub const fn is_fatal_kind(self) -> bool {
        matches!(
            self,
            Self::Div0 | Self::FpErr | Self::Privileged | Self::Illegal | Self::BadPc
        )
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Host-visible errors: configuration problems, malformed program images,
/// and fatal exception escalation (spec §7 "Host-visible failures").
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A config knob was outside its documented range (spec §6).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pre-decoded static instruction array failed to parse.
    #[error("malformed program image: {0}")]
    MalformedImage(String),

    /// A fatal exception (per `ExceptionKind::is_fatal_kind`) escaped to the
    /// top level and terminated the processor.
    #[error("fatal exception {kind} on tag {tag:?} at pc {pc:#x}")]
    FatalException {
        /// The fatal exception kind.
        kind: ExceptionKind,
        /// Tag of the excepting instance.
        tag: Tag,
        /// PC of the excepting instance.
        pc: u32,
    },

    /// An internal invariant was violated (spec §7: "Internal invariants
    /// violated at runtime ... abort the simulator; these are assertions,
    /// not user-visible errors"). Distinguished from `FatalException` so
    /// callers can tell a guest fault from a simulator bug.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// I/O failure reading a program image or writing statistics streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
