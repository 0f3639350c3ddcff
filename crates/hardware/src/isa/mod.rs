//! SPARC V9 user-level instruction set: opcodes and the static (pre-decoded)
//! instruction representation consumed by the core (spec §3 "Static
//! Instruction"). Binary loading and pre-decoding themselves are out of
//! scope (spec §1) — `StaticInstruction` is what the external pre-decoder
//! hands the core.

pub mod instruction;
pub mod opcode;

pub use instruction::StaticInstruction;
pub use opcode::{CondCode, Opcode, WindowChange};
