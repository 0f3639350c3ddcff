//! Simulation statistics: per-processor counters sampled every cycle and
//! reported at the end of a run (spec §7 "Observability").

use std::collections::HashMap;

use serde::Serialize;

use crate::core::pipeline::rename::EfficiencyLoss;

/// Per-processor statistics accumulated over a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessorStats {
    /// Cycles simulated.
    pub cycles: u64,
    /// Instructions fetched.
    pub fetched: u64,
    /// Instructions graduated (retired).
    pub graduated: u64,
    /// Correct branch predictions.
    pub bpb_good_predicts: u64,
    /// Incorrect branch predictions (misprediction recoveries).
    pub bpb_bad_predicts: u64,
    /// Speculative loads marked `limbo`.
    pub limbos: u64,
    /// Limbo loads that disambiguation cleared without a redo.
    pub unlimbos: u64,
    /// Loads killed and reissued by disambiguation.
    pub redos: u64,
    /// Instances killed outright (not reissued — e.g. on a flush).
    pub kills: u64,
    /// Precise-exception drains serviced.
    pub exceptions: u64,
    /// Register-window overflow traps taken.
    pub window_overflows: u64,
    /// Register-window underflow traps taken.
    pub window_underflows: u64,
    /// Cycles lost to each efficiency-loss bucket at rename (spec §4.1).
    pub efficiency_loss_cycles: HashMap<String, u64>,
}

impl ProcessorStats {
    /// Creates a zeroed stats block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one cycle in which rename stalled for `kind`.
    pub fn record_efficiency_loss(&mut self, kind: EfficiencyLoss) {
        *self
            .efficiency_loss_cycles
            .entry(format!("{kind:?}"))
            .or_insert(0) += 1;
    }

    /// Fraction of fetched instructions that graduated (vs. being flushed
    /// on a misprediction or exception) — a rough utility/efficiency ratio.
    #[must_use]
    pub fn graduate_fetch_ratio(&self) -> f64 {
        if self.fetched == 0 {
            0.0
        } else {
            self.graduated as f64 / self.fetched as f64
        }
    }

    /// Branch prediction accuracy over resolved conditional branches.
    #[must_use]
    pub fn predictor_accuracy(&self) -> f64 {
        let total = self.bpb_good_predicts + self.bpb_bad_predicts;
        if total == 0 {
            0.0
        } else {
            self.bpb_good_predicts as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graduate_fetch_ratio_handles_empty_run() {
        let stats = ProcessorStats::new();
        assert_eq!(stats.graduate_fetch_ratio(), 0.0);
    }

    #[test]
    fn predictor_accuracy_computes_fraction() {
        let mut stats = ProcessorStats::new();
        stats.bpb_good_predicts = 3;
        stats.bpb_bad_predicts = 1;
        assert!((stats.predictor_accuracy() - 0.75).abs() < f64::EPSILON);
    }
}
