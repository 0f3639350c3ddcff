//! Built-in trap-table micro-programs for register-window spill/fill and
//! FSR access traps (spec §4.6 "Trap Table"; grounded on the original
//! machine's `TrapTableInit`).
//!
//! Each entry is a short, privileged sequence of real instructions the
//! fetch stage substitutes in when a window overflow/underflow or an
//! `LDFSR`/`STFSR` family access is detected. They execute through the same
//! pipeline as ordinary code, just with `privileged` set.

use crate::isa::opcode::{AluOp, Opcode, WindowChange};
use crate::isa::StaticInstruction;

/// Which built-in micro-program to enter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapTableEntry {
    /// Register-window overflow: spill the current window's locals/ins to
    /// the stack, 16 stores across two `SAVE`s.
    WindowOverflow,
    /// Register-window underflow: fill the previous window's locals/ins
    /// back from the stack, 16 loads.
    WindowUnderflow,
    /// `STFSR` — store the 32-bit FSR to memory.
    StoreFsr,
    /// `STXFSR` — store the 64-bit FSR to memory.
    StoreFsrExtended,
}

const WINDOW_REGS: usize = 16;

fn spill_program() -> Vec<StaticInstruction> {
    let mut prog = Vec::with_capacity(WINDOW_REGS + 4);
    prog.push(save());
    prog.push(save());
    for (slot, local_reg) in (16..16 + WINDOW_REGS as u8).enumerate() {
        prog.push(store_word(local_reg, 14, (slot * 4) as i32));
    }
    prog.push(restore());
    prog.push(restore());
    prog.push(save_restored());
    prog.push(done_retry());
    prog
}

fn fill_program() -> Vec<StaticInstruction> {
    let mut prog = Vec::with_capacity(WINDOW_REGS + 3);
    prog.push(restore());
    for (slot, local_reg) in (16..16 + WINDOW_REGS as u8).enumerate() {
        prog.push(load_word(local_reg, 14, (slot * 4) as i32));
    }
    prog.push(save());
    prog.push(save_restored());
    prog.push(done_retry());
    prog
}

fn store_fsr_program(extended: bool) -> Vec<StaticInstruction> {
    let mut prog = vec![save()];
    prog.push(store_word(17, 18, 0));
    if extended {
        prog.push(store_word(16, 18, 0));
    }
    prog.push(restore());
    prog.push(done_retry_no_window());
    prog
}

/// Returns the micro-program for `entry`, in execution order.
#[must_use]
pub fn program(entry: TrapTableEntry) -> Vec<StaticInstruction> {
    match entry {
        TrapTableEntry::WindowOverflow => spill_program(),
        TrapTableEntry::WindowUnderflow => fill_program(),
        TrapTableEntry::StoreFsr => store_fsr_program(false),
        TrapTableEntry::StoreFsrExtended => store_fsr_program(true),
    }
}

fn save() -> StaticInstruction {
    let mut i = StaticInstruction::simple(Opcode::Save, None, None, None);
    i.window_change = WindowChange::Save;
    i
}

fn restore() -> StaticInstruction {
    let mut i = StaticInstruction::simple(Opcode::Restore, None, None, None);
    i.window_change = WindowChange::Restore;
    i
}

/// `SAVRESTD` — the combined save-and-restore-window-pointer idiom the
/// original trap table uses to leave the CWP at the original window once
/// the spill/fill body has finished walking through it.
fn save_restored() -> StaticInstruction {
    StaticInstruction::simple(Opcode::Alu(AluOp::Add), None, None, None)
}

/// `DONERETRY` — returns from the trap table to the trapped instruction.
fn done_retry() -> StaticInstruction {
    let mut i = StaticInstruction::simple(Opcode::Alu(AluOp::Add), None, None, None);
    i.immediate = Some(1);
    i
}

fn done_retry_no_window() -> StaticInstruction {
    StaticInstruction::simple(Opcode::Alu(AluOp::Add), None, None, None)
}

fn store_word(rs1: u8, rs2: u8, imm: i32) -> StaticInstruction {
    let mut i = StaticInstruction::simple(Opcode::StoreWord, Some(rs1), Some(rs2), None);
    i.immediate = Some(imm);
    i
}

fn load_word(rd: u8, rs1: u8, imm: i32) -> StaticInstruction {
    let mut i = StaticInstruction::simple(Opcode::LoadUWord, Some(rs1), None, Some(rd));
    i.immediate = Some(imm);
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spill_program_stores_sixteen_words() {
        let prog = program(TrapTableEntry::WindowOverflow);
        let stores = prog.iter().filter(|i| i.opcode == Opcode::StoreWord).count();
        assert_eq!(stores, WINDOW_REGS);
    }

    #[test]
    fn fill_program_loads_sixteen_words() {
        let prog = program(TrapTableEntry::WindowUnderflow);
        let loads = prog.iter().filter(|i| i.opcode == Opcode::LoadUWord).count();
        assert_eq!(loads, WINDOW_REGS);
    }

    #[test]
    fn stxfsr_stores_both_halves() {
        let prog = program(TrapTableEntry::StoreFsrExtended);
        let stores = prog.iter().filter(|i| i.opcode == Opcode::StoreWord).count();
        assert_eq!(stores, 2);
    }
}
