//! Configuration system for the simulator.
//!
//! Mirrors the shape used elsewhere in this codebase: a `defaults` module of
//! named constants, hierarchical config structs deserialized from JSON, and
//! enums selecting between model variants. Supplied via a config file passed
//! to the CLI, or `SimConfig::default()` otherwise.

use serde::{Deserialize, Serialize};

use crate::core::pipeline::mem_unit::disambig::AmbiguousStorePolicy;
use crate::core::pipeline::mem_unit::MemOrderModel;
use crate::core::units::bru::PredictorMode;
use crate::core::units::functional::FunctionalUnitsConfig;

/// Default configuration constants.
mod defaults {
    /// Maximum in-flight instances per processor (active-list depth).
    pub const MAX_ACTIVE_INSTANCES: usize = 64;

    /// `MAX_SPEC`: shadow-mapper stack depth (in-flight predicted branches).
    pub const MAX_SPEC: usize = 16;

    /// Number of physical integer registers (architectural + renaming pool).
    pub const NO_OF_PHYSICAL_INT_REGISTERS: u32 = 128;

    /// Number of physical FP registers.
    pub const NO_OF_PHYSICAL_FP_REGISTERS: u32 = 64;

    /// RC-mode load-queue / store-queue depth, or the unified queue depth
    /// under SC/PC.
    pub const MEM_QUEUE_DEPTH: usize = 32;

    /// Per-unit-kind ready-queue depth.
    pub const READY_QUEUE_DEPTH: usize = 32;

    /// `NO_OF_EXCEPT_FLUSHES_PER_CYCLE`: active-list pairs the precise-
    /// exception drain removes per cycle.
    pub const EXCEPT_FLUSHES_PER_CYCLE: usize = 4;

    /// Instructions fetched per cycle.
    pub const FETCH_WIDTH: usize = 4;

    /// Direction-predictor table size, as a power of two.
    pub const PREDICTOR_LOG2_ENTRIES: u32 = 12;

    /// Return-address-stack depth.
    pub const RAS_DEPTH: usize = 8;

    /// Cycles a forwarded or completed load must wait before it may retire
    /// (models write-back-to-retire latency; spec §4.1 "lookahead").
    pub const RETIREMENT_LOOKAHEAD: u64 = 0;
}

/// Which memory-consistency model the memory unit enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsistencyModel {
    /// Release consistency — separate load/store queues.
    #[default]
    Rc,
    /// Sequential consistency — unified queue, in-order issue.
    Sc,
    /// Processor consistency — unified queue, stores ordered, loads may
    /// bypass.
    Pc,
}

impl From<ConsistencyModel> for MemOrderModel {
    fn from(m: ConsistencyModel) -> Self {
        match m {
            ConsistencyModel::Rc => Self::Rc,
            ConsistencyModel::Sc => Self::Sc,
            ConsistencyModel::Pc => Self::Pc,
        }
    }
}

/// Policy for loads that issue past an address-unresolved older store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AmbiguousStorePolicyConfig {
    /// See [`AmbiguousStorePolicy::SpecStall`].
    SpecStall,
    /// See [`AmbiguousStorePolicy::SpecLimbo`].
    #[default]
    SpecLimbo,
    /// See [`AmbiguousStorePolicy::SpecExcept`].
    SpecExcept,
}

impl From<AmbiguousStorePolicyConfig> for AmbiguousStorePolicy {
    fn from(p: AmbiguousStorePolicyConfig) -> Self {
        match p {
            AmbiguousStorePolicyConfig::SpecStall => Self::SpecStall,
            AmbiguousStorePolicyConfig::SpecLimbo => Self::SpecLimbo,
            AmbiguousStorePolicyConfig::SpecExcept => Self::SpecExcept,
        }
    }
}

/// Direction-predictor algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PredictorModeConfig {
    /// See [`PredictorMode::Bimodal`].
    #[default]
    Bimodal,
    /// See [`PredictorMode::Agree`].
    Agree,
}

impl From<PredictorModeConfig> for PredictorMode {
    fn from(m: PredictorModeConfig) -> Self {
        match m {
            PredictorModeConfig::Bimodal => Self::Bimodal,
            PredictorModeConfig::Agree => Self::Agree,
        }
    }
}

/// Fetch/rename-stage configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Instructions fetched per cycle.
    pub width: usize,
    /// Active-list depth (bounds in-flight instances).
    pub max_active_instances: usize,
    /// Shadow-mapper stack depth (`MAX_SPEC`).
    pub max_spec: usize,
    /// Physical integer register count.
    pub physical_int_regs: u32,
    /// Physical FP register count.
    pub physical_fp_regs: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            width: defaults::FETCH_WIDTH,
            max_active_instances: defaults::MAX_ACTIVE_INSTANCES,
            max_spec: defaults::MAX_SPEC,
            physical_int_regs: defaults::NO_OF_PHYSICAL_INT_REGISTERS,
            physical_fp_regs: defaults::NO_OF_PHYSICAL_FP_REGISTERS,
        }
    }
}

/// Memory-unit configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MemUnitConfig {
    /// Consistency model enforced by the memory unit.
    pub model: ConsistencyModel,
    /// Policy applied to loads issued past an ambiguous store.
    pub ambiguous_store_policy: AmbiguousStorePolicyConfig,
    /// Load/store (or unified) queue depth.
    pub queue_depth: usize,
}

impl Default for MemUnitConfig {
    fn default() -> Self {
        Self {
            model: ConsistencyModel::default(),
            ambiguous_store_policy: AmbiguousStorePolicyConfig::default(),
            queue_depth: defaults::MEM_QUEUE_DEPTH,
        }
    }
}

/// Branch-predictor configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Direction-table algorithm.
    pub mode: PredictorModeConfig,
    /// Direction table size, log2.
    pub log2_entries: u32,
    /// Return-address-stack depth.
    pub ras_depth: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            mode: PredictorModeConfig::default(),
            log2_entries: defaults::PREDICTOR_LOG2_ENTRIES,
            ras_depth: defaults::RAS_DEPTH,
        }
    }
}

/// Trap/exception pacing configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// `NO_OF_EXCEPT_FLUSHES_PER_CYCLE`.
    pub except_flushes_per_cycle: usize,
    /// Cycles a completed instance must wait before retiring.
    pub retirement_lookahead: u64,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            except_flushes_per_cycle: defaults::EXCEPT_FLUSHES_PER_CYCLE,
            retirement_lookahead: defaults::RETIREMENT_LOOKAHEAD,
        }
    }
}

/// Root simulator configuration.
///
/// # Examples
///
/// ```
/// use rsim_core::config::SimConfig;
///
/// let config = SimConfig::default();
/// assert_eq!(config.fetch.width, 4);
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fetch/rename-stage settings.
    pub fetch: FetchConfig,
    /// Memory-unit settings.
    pub mem_unit: MemUnitConfig,
    /// Branch-predictor settings.
    pub predictor: PredictorConfig,
    /// Functional-unit pools.
    pub units: FunctionalUnitsConfig,
    /// Trap/exception pacing settings.
    pub trap: TrapConfig,
    /// Per-unit-kind ready-queue depth.
    pub ready_queue_depth: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            mem_unit: MemUnitConfig::default(),
            predictor: PredictorConfig::default(),
            units: FunctionalUnitsConfig::default(),
            trap: TrapConfig::default(),
            ready_queue_depth: defaults::READY_QUEUE_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = SimConfig::default();
        let json = serde_json::to_string(&config).expect("serializes");
        let back: SimConfig = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.fetch.width, config.fetch.width);
    }

    #[test]
    fn deserializes_partial_overrides() {
        let json = r#"{"fetch": {"width": 2}}"#;
        let config: SimConfig = serde_json::from_str(json).expect("deserializes");
        assert_eq!(config.fetch.width, 2);
        assert_eq!(config.fetch.max_active_instances, 64);
    }
}
