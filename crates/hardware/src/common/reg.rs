//! Register class tags and the hardwired-zero convention.

use serde::{Deserialize, Serialize};

/// Register class of a logical/physical register, per spec §3 data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegClass {
    /// 32-bit integer register.
    Int,
    /// 64-bit integer register (`INTPAIR`'s first half reuses `Int`; this
    /// tags a genuine 64-bit destination, e.g. a pair read as one value).
    Int64,
    /// Integer register pair (`LDD`/`STD` targets): `IntPair` instances
    /// allocate a second physical register for the low half.
    IntPair,
    /// Double-precision floating point register.
    Fp,
    /// Single-precision ("half") floating point register, aliased into an
    /// FP-pair physical register — writing it is a read-modify-write.
    FpHalf,
    /// Condition-code register (`%icc`/`%xcc`/`%fcc`).
    Cc,
}

/// Logical integer register `%g0` is hardwired to zero: writes are
/// discarded and no physical register is ever allocated for it.
#[must_use]
pub const fn is_int_zero_reg(logical: u8) -> bool {
    logical == 0
}
