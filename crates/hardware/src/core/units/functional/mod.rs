//! Functional-unit configuration: how many of each kind exist, their
//! per-instance latency, and their repeat (throughput) rate (spec §6
//! "per-unit-kind counts/latencies").

use serde::{Deserialize, Serialize};

use crate::core::pipeline::scheduler::UnitKind;

/// Configuration for one pool of functional units of a single kind.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UnitPoolConfig {
    /// Number of physical units of this kind.
    pub count: u32,
    /// Cycles from issue to result availability.
    pub latency: u32,
    /// Minimum cycles between successive issues to the same unit instance.
    pub repeat_rate: u32,
    /// If true, this pool never stalls issue on unit availability (an
    /// idealized "fast" mode used for sensitivity studies).
    pub fast_mode: bool,
}

impl UnitPoolConfig {
    /// A conservative default: one unit, one-cycle latency and repeat rate.
    #[must_use]
    pub const fn single_cycle(count: u32) -> Self {
        Self {
            count,
            latency: 1,
            repeat_rate: 1,
            fast_mode: false,
        }
    }
}

/// Per-kind functional-unit configuration for a processor core.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FunctionalUnitsConfig {
    /// Integer ALU pool.
    pub alu: UnitPoolConfig,
    /// FP unit pool.
    pub fpu: UnitPoolConfig,
    /// Address-generation pool.
    pub addr: UnitPoolConfig,
    /// Branch unit pool.
    pub bru: UnitPoolConfig,
    /// Memory-unit issue ports.
    pub mem: UnitPoolConfig,
}

impl FunctionalUnitsConfig {
    /// Returns the pool config for `kind`.
    #[must_use]
    pub const fn pool(&self, kind: UnitKind) -> &UnitPoolConfig {
        match kind {
            UnitKind::Alu => &self.alu,
            UnitKind::Fpu => &self.fpu,
            UnitKind::Addr => &self.addr,
            UnitKind::Bru => &self.bru,
            UnitKind::Mem => &self.mem,
        }
    }
}

impl Default for FunctionalUnitsConfig {
    fn default() -> Self {
        Self {
            alu: UnitPoolConfig::single_cycle(4),
            fpu: UnitPoolConfig {
                count: 2,
                latency: 4,
                repeat_rate: 1,
                fast_mode: false,
            },
            addr: UnitPoolConfig::single_cycle(2),
            bru: UnitPoolConfig::single_cycle(1),
            mem: UnitPoolConfig {
                count: 2,
                latency: 2,
                repeat_rate: 1,
                fast_mode: false,
            },
        }
    }
}

/// Tracks how many of each unit-kind's physical units are currently busy,
/// so issue can refuse to dispatch beyond `count`.
#[derive(Debug, Default)]
pub struct UnitOccupancy {
    busy: std::collections::HashMap<UnitKind, u32>,
}

impl UnitOccupancy {
    /// Creates an occupancy tracker with every kind idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if at least one unit of `kind` is free, per `config`.
    #[must_use]
    pub fn has_free(&self, kind: UnitKind, config: &FunctionalUnitsConfig) -> bool {
        config.pool(kind).fast_mode || self.busy.get(&kind).copied().unwrap_or(0) < config.pool(kind).count
    }

    /// Marks one unit of `kind` busy.
    pub fn occupy(&mut self, kind: UnitKind) {
        *self.busy.entry(kind).or_insert(0) += 1;
    }

    /// Frees one unit of `kind`.
    pub fn free(&mut self, kind: UnitKind) {
        if let Some(n) = self.busy.get_mut(&kind) {
            *n = n.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_blocks_issue_past_count() {
        let config = FunctionalUnitsConfig {
            bru: UnitPoolConfig::single_cycle(1),
            ..FunctionalUnitsConfig::default()
        };
        let mut occ = UnitOccupancy::new();
        assert!(occ.has_free(UnitKind::Bru, &config));
        occ.occupy(UnitKind::Bru);
        assert!(!occ.has_free(UnitKind::Bru, &config));
        occ.free(UnitKind::Bru);
        assert!(occ.has_free(UnitKind::Bru, &config));
    }

    #[test]
    fn fast_mode_always_free() {
        let config = FunctionalUnitsConfig {
            alu: UnitPoolConfig {
                count: 1,
                latency: 1,
                repeat_rate: 1,
                fast_mode: true,
            },
            ..FunctionalUnitsConfig::default()
        };
        let mut occ = UnitOccupancy::new();
        occ.occupy(UnitKind::Alu);
        occ.occupy(UnitKind::Alu);
        assert!(occ.has_free(UnitKind::Alu, &config));
    }
}
