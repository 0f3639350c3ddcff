//! Opcode enumeration and the auxiliary enums static instructions carry.

use serde::{Deserialize, Serialize};

/// Functional classification of a SPARC V9 user-level opcode.
///
/// This is a representative subset of the full ISA chosen to exercise every
/// mechanism spec.md names (integer ALU, loads/stores of every width the
/// forwarding rules mention, branches, window management, membars, RMWs,
/// and the `ILLTRAP`/syscall path) rather than the complete instruction set
/// (documented as a scope decision in DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// No-op (`SETHI %hi(0), %g0` in real SPARC; modeled directly).
    Nop,
    /// `ADD`/`ADDcc`/`SUB`/`SUBcc`/`AND`/`OR`/`XOR`/`SLL`/`SRL`/`SRA` family.
    Alu(AluOp),
    /// `SETHI` — load immediate into the high 22 bits.
    Sethi,
    /// Integer multiply/divide (`SMUL`/`UMUL`/`SDIV`/`UDIV`); requires
    /// serialization per spec §4.5/§4.6 (`SMULcc`/`UMULcc` trap table entries).
    MulDiv(MulDivOp),
    /// Unsigned byte load (`LDUB`).
    LoadUByte,
    /// Signed byte load (`LDSB`).
    LoadSByte,
    /// Unsigned halfword load (`LDUH`).
    LoadUHalf,
    /// Signed halfword load (`LDSH`).
    LoadSHalf,
    /// Unsigned word load (`LDUW`).
    LoadUWord,
    /// Signed word load (`LDSW`).
    LoadSWord,
    /// Doubleword load (`LDD`/`LDX`) — register-pair destination.
    LoadDouble,
    /// Double-precision float load (`LDDF`).
    LoadFpDouble,
    /// Byte store (`STB`).
    StoreByte,
    /// Halfword store (`STH`).
    StoreHalf,
    /// Word store (`STW`).
    StoreWord,
    /// Doubleword store (`STD`/`STX`).
    StoreDouble,
    /// Double-precision float store (`STDF`).
    StoreFpDouble,
    /// Software prefetch (`PREFETCH`), flavor carried in `PrefetchKind`.
    Prefetch(PrefetchKind),
    /// Atomic read-modify-write (`SWAP`/`LDSTUB`/`CASA`/`CASXA`).
    Rmw(RmwOp),
    /// Conditional branch (`Bicc`), direction predicted dynamically or
    /// statically per the static-prediction bit.
    BranchCond(CondCode),
    /// Unconditional direct branch (known target at decode).
    BranchAlways,
    /// `CALL` — unconditional, not speculative; pushes the RAS.
    Call,
    /// `JMPL` — indirect jump (other than a return); unpredicted.
    JmplIndirect,
    /// `JMPL %i7+8` / `RETURN` idiom — predicted via the RAS.
    Return,
    /// `MEMBAR` with the direction/ordering flags in `MembarFlags`.
    Membar(MembarFlags),
    /// `SAVE` — allocates a new register window.
    Save,
    /// `RESTORE` — returns to the previous register window.
    Restore,
    /// `ILLTRAP` carrying a trap number (spec §6 table) and optional aux2
    /// latency-bucket delimiter.
    IllTrap {
        /// The syscall/trap number.
        trap_num: u32,
        /// Auxiliary latency-bucket delimiter.
        aux2: u32,
    },
    /// `LDFSR`/`STFSR`/`LDXFSR`/`STXFSR` — serialize per spec §4.5/§4.6.
    Fsr,
}

/// Integer ALU operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    /// `ADD` (with or without `cc`, tracked by `sets_cc` on the instruction).
    Add,
    /// `SUB`.
    Sub,
    /// `AND`.
    And,
    /// `OR`.
    Or,
    /// `XOR`.
    Xor,
    /// `SLL` shift left logical.
    Sll,
    /// `SRL` shift right logical.
    Srl,
    /// `SRA` shift right arithmetic.
    Sra,
}

/// Integer multiply/divide operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MulDivOp {
    /// `SMUL`/`SMULcc` signed multiply.
    SignedMul,
    /// `UMUL`/`UMULcc` unsigned multiply.
    UnsignedMul,
    /// `SDIV` signed divide.
    SignedDiv,
    /// `UDIV` unsigned divide.
    UnsignedDiv,
}

/// Atomic read-modify-write flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RmwOp {
    /// `SWAP` — exchange register and memory.
    Swap,
    /// `LDSTUB` — load-store-unsigned-byte (test-and-set).
    Ldstub,
    /// `CASA` — 32-bit compare-and-swap.
    Casa,
    /// `CASXA` — 64-bit compare-and-swap.
    Casxa,
}

/// Branch condition code (subset: always/never/equal/not-equal/... per `icc`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CondCode {
    /// Never taken.
    Never,
    /// Always taken (`BA`; still goes through branch handling for the
    /// annul/delay-slot bookkeeping spec §4.2 describes).
    Always,
    /// Equal / zero.
    Equal,
    /// Not equal / nonzero.
    NotEqual,
    /// Greater than.
    Greater,
    /// Less than or equal.
    LessEqual,
    /// Greater than or equal.
    GreaterEqual,
    /// Less than.
    Less,
    /// Negative.
    Negative,
    /// Positive.
    Positive,
}

/// Window-pointer change a static instruction causes, per spec §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindowChange {
    /// No window change.
    #[default]
    None,
    /// `SAVE` — advance the window pointer.
    Save,
    /// `RESTORE` — retreat the window pointer.
    Restore,
}

/// Software prefetch flavor, spec §4.3 "Prefetch".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefetchKind {
    /// Shared (read-intent) prefetch.
    Shared,
    /// Exclusive (write-intent) prefetch.
    Exclusive,
}

/// Membar direction/ordering flags, spec §3 "Membar Descriptor".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MembarFlags {
    /// Order store-before-store.
    pub ss: bool,
    /// Order load-before-store.
    pub ls: bool,
    /// Order store-before-load.
    pub sl: bool,
    /// Order load-before-load.
    pub ll: bool,
    /// `#MemIssue` — block issue of younger memory ops entirely.
    pub memissue: bool,
}

impl MembarFlags {
    /// The `SS|LS|SL|LL` combination that, inserted before every load and
    /// after every store, makes RC observe SC (spec §8, testable property 6).
    #[must_use]
    pub const fn full_fence() -> Self {
        Self {
            ss: true,
            ls: true,
            sl: true,
            ll: true,
            memissue: false,
        }
    }
}
