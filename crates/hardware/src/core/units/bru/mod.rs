//! Branch unit: direction/target prediction and control-transfer
//! classification (spec §3 "Branch Predictor State", §4.4 "Branch
//! Resolution").

pub mod predictor;
pub mod ras;

use crate::isa::{CondCode, Opcode, StaticInstruction};
pub use predictor::{DirectionPredictor, PredictorMode};
pub use ras::Ras;

/// How a control-transfer instruction's target/direction should be treated
/// (mirrors `StartCtlXfer`'s classification in the original machine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CtlXferKind {
    /// Not a control transfer.
    None,
    /// Unconditional `BA`/`CALL` — always taken, target known at decode.
    Unconditional,
    /// Conditional branch — direction predicted, target known at decode.
    Conditional,
    /// `JMPL`/indirect jump — target depends on a register operand.
    Indirect,
    /// `RETURN`/`RETL`-style return — predicted via the RAS.
    Return,
}

/// Classifies a decoded instruction's control-transfer behavior.
#[must_use]
pub fn classify(code: &StaticInstruction) -> CtlXferKind {
    match code.opcode {
        Opcode::BranchAlways | Opcode::Call => CtlXferKind::Unconditional,
        Opcode::BranchCond(CondCode::Never) => CtlXferKind::None,
        Opcode::BranchCond(_) => CtlXferKind::Conditional,
        Opcode::Return => CtlXferKind::Return,
        Opcode::JmplIndirect => CtlXferKind::Indirect,
        _ => CtlXferKind::None,
    }
}

/// The branch unit's per-processor predictor state: a direction table, a
/// return-address stack, and target classification.
#[derive(Debug)]
pub struct BranchUnit {
    direction: DirectionPredictor,
    ras: Ras,
}

impl BranchUnit {
    /// Creates a branch unit with a `2^log2_entries`-row direction table in
    /// `mode` and a RAS of the given depth.
    #[must_use]
    pub fn new(log2_entries: u32, mode: PredictorMode, ras_depth: usize) -> Self {
        Self {
            direction: DirectionPredictor::new(log2_entries, mode),
            ras: Ras::new(ras_depth),
        }
    }

    /// Predicts the outcome of a control transfer at `pc`, with `fallthrough`
    /// and `target` as the two candidate next-PCs. `bias_taken` is the
    /// static direction hint (e.g. backward-branch-taken heuristic) used
    /// under the agree predictor.
    #[must_use]
    pub fn predict(
        &self,
        kind: CtlXferKind,
        pc: u32,
        fallthrough: u32,
        target: u32,
        bias_taken: bool,
    ) -> (bool, u32) {
        match kind {
            CtlXferKind::None => (false, fallthrough),
            CtlXferKind::Unconditional => (true, target),
            CtlXferKind::Conditional => {
                let taken = self.direction.predict(pc, bias_taken);
                (taken, if taken { target } else { fallthrough })
            }
            CtlXferKind::Indirect => (true, target),
            CtlXferKind::Return => {
                let predicted = self.ras.top().map_or(target, |a| a as u32);
                (true, predicted)
            }
        }
    }

    /// Pushes a call's return address onto the RAS.
    pub fn call_pushed(&mut self, return_addr: u32) {
        self.ras.push(u64::from(return_addr));
    }

    /// Pops the RAS on a resolved return.
    pub fn return_resolved(&mut self) -> Option<u32> {
        self.ras.pop().map(|a| a as u32)
    }

    /// Updates the direction table with a conditional branch's resolved
    /// outcome.
    pub fn update(&mut self, pc: u32, bias_taken: bool, actual_taken: bool) {
        self.direction.update(pc, bias_taken, actual_taken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode;

    #[test]
    fn classify_identifies_conditional_branch() {
        let code = StaticInstruction::simple(Opcode::BranchCond(CondCode::Equal), None, None, None);
        assert_eq!(classify(&code), CtlXferKind::Conditional);
    }

    #[test]
    fn return_prediction_uses_ras_top() {
        let mut bu = BranchUnit::new(4, PredictorMode::Bimodal, 8);
        bu.call_pushed(0x1000);
        let (taken, target) = bu.predict(CtlXferKind::Return, 0x2000, 0x2004, 0, false);
        assert!(taken);
        assert_eq!(target, 0x1000);
    }
}
