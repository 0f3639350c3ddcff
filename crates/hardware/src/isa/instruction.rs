//! The static instruction: immutable after pre-decode (spec §3).

use serde::{Deserialize, Serialize};

use super::opcode::{Opcode, WindowChange};
use crate::common::reg::RegClass;

/// A pre-decoded static instruction. The external pre-decoder (out of
/// scope, spec §1) is responsible for producing an array of these; the
/// core only ever reads them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticInstruction {
    /// Decoded opcode.
    pub opcode: Opcode,
    /// First source logical register, if any.
    pub rs1: Option<u8>,
    /// Second source logical register, if any (mutually exclusive with an
    /// immediate operand on most opcodes).
    pub rs2: Option<u8>,
    /// Source condition-code register, for instructions that read `%icc`.
    pub rs_cc: bool,
    /// Destination logical register, if any.
    pub rd: Option<u8>,
    /// Register class of the destination.
    pub rd_class: RegClass,
    /// Whether the destination is an integer-pair (`destPair`) — a second
    /// physical register is allocated for the low half.
    pub dest_pair: bool,
    /// Whether this instruction sets the destination condition code
    /// (`ADDcc`, `SUBcc`, branches reading `%icc`, RMWs, etc.).
    pub sets_cc: bool,
    /// Sign-extended immediate, when `rs2` is absent.
    pub immediate: Option<i32>,
    /// Annul bit — for branches, whether the delay slot is annulled on the
    /// not-taken path.
    pub annul: bool,
    /// Whether this is a conditional branch.
    pub is_cond_branch: bool,
    /// Whether this is any unconditional control transfer (`BA`, `CALL`,
    /// `JMPL`, `RETURN`).
    pub is_uncond_branch: bool,
    /// Static taken/not-taken hint, used when dynamic prediction is
    /// disabled (spec §4.2).
    pub static_taken_hint: bool,
    /// Register-window effect of this instruction.
    pub window_change: WindowChange,
    /// Static branch prediction bit recorded at pre-decode.
    pub predict_taken: bool,
}

impl StaticInstruction {
    /// Convenience constructor for a plain ALU/load/store instruction with
    /// no branch or window-change behavior.
    #[must_use]
    pub fn simple(opcode: Opcode, rs1: Option<u8>, rs2: Option<u8>, rd: Option<u8>) -> Self {
        Self {
            opcode,
            rs1,
            rs2,
            rs_cc: false,
            rd,
            rd_class: RegClass::Int,
            dest_pair: false,
            sets_cc: false,
            immediate: None,
            annul: false,
            is_cond_branch: false,
            is_uncond_branch: false,
            static_taken_hint: false,
            window_change: WindowChange::None,
            predict_taken: false,
        }
    }
}
